//! Value types shared by the shard store, the token index and the query engine.

use serde::Serialize;
use std::sync::Arc;

/// One documented location for a symbol: a page-relative link plus the
/// fully qualified name that tells same-named symbols apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    /// Page path plus anchor, e.g. `../classsolver_1_1Agent.html#a22dd63f6`
    pub url: Arc<str>,
    /// Enclosing scope or full signature, e.g. `solver::Agent`
    pub qualified_name: Arc<str>,
    /// Link points at an external page
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub external: bool,
}

impl Occurrence {
    pub fn new(url: impl Into<Arc<str>>, qualified_name: impl Into<Arc<str>>) -> Self {
        Self {
            url: url.into(),
            qualified_name: qualified_name.into(),
            external: false,
        }
    }

    /// Mark the occurrence as linking outside the documentation set.
    pub fn external(mut self, external: bool) -> Self {
        self.external = external;
        self
    }
}

/// A single entry in a shard: the lookup token, the symbol's display name and
/// every place it is documented.
///
/// Records are immutable once a shard is loaded and are shared by reference
/// count between the shard, the token index and any result that mentions them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    token: Arc<str>,
    display_name: Arc<str>,
    occurrences: Vec<Occurrence>,
}

impl Record {
    /// Build a record whose token is derived from the display name.
    pub fn new(display_name: impl Into<Arc<str>>, occurrences: Vec<Occurrence>) -> Self {
        let display_name = display_name.into();
        let token = Arc::from(display_name.to_lowercase());
        Self {
            token,
            display_name,
            occurrences,
        }
    }

    /// Build a record with an explicit token, as stored in shard files.
    pub fn with_token(
        token: impl Into<Arc<str>>,
        display_name: impl Into<Arc<str>>,
        occurrences: Vec<Occurrence>,
    ) -> Self {
        Self {
            token: token.into(),
            display_name: display_name.into(),
            occurrences,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn occurrences(&self) -> &[Occurrence] {
        &self.occurrences
    }

    pub(crate) fn token_arc(&self) -> &Arc<str> {
        &self.token
    }

    pub(crate) fn display_name_arc(&self) -> &Arc<str> {
        &self.display_name
    }
}

/// The user-facing unit of a search response: one display name with all of
/// its documented locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedResult {
    /// Shortest token that contributed to this group, used for ranking
    #[serde(skip)]
    pub token: Arc<str>,
    pub display_name: Arc<str>,
    pub occurrences: Vec<Occurrence>,
}

/// Ranked, truncated output of one query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResultSet {
    groups: Vec<GroupedResult>,
}

impl ResultSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_groups(groups: Vec<GroupedResult>) -> Self {
        Self { groups }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[GroupedResult] {
        &self.groups
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GroupedResult> {
        self.groups.iter()
    }

    /// Display names in rank order.
    pub fn display_names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| &*g.display_name).collect()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a GroupedResult;
    type IntoIter = std::slice::Iter<'a, GroupedResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

impl IntoIterator for ResultSet {
    type Item = GroupedResult;
    type IntoIter = std::vec::IntoIter<GroupedResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}
