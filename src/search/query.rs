//! Query normalization and the prefix search pipeline.

use super::group::group;
use super::index::TokenIndex;
use super::scoring::RankingPolicy;
use crate::types::ResultSet;

/// Lowercase and trim raw input. Returns `None` when nothing is left.
pub fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// One user input event: normalized text plus the sequence number used to
/// recognize stale results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub seq: u64,
    pub text: String,
}

impl Query {
    /// Create a query from raw input, or `None` if it normalizes to nothing.
    pub fn new(seq: u64, raw: &str) -> Option<Self> {
        normalize(raw).map(|text| Self { seq, text })
    }
}

/// Answer `raw` against `index`: normalize, prefix lookup, group, rank and
/// truncate to `max_results`.
///
/// Never fails and never blocks. Empty input or `max_results == 0` yields an
/// empty result set.
pub fn search(index: &TokenIndex, raw: &str, max_results: usize, ranking: RankingPolicy) -> ResultSet {
    match normalize(raw) {
        Some(text) => search_normalized(index, &text, max_results, ranking),
        None => ResultSet::empty(),
    }
}

/// Same as [`search`] for input that is already normalized.
pub(crate) fn search_normalized(
    index: &TokenIndex,
    text: &str,
    max_results: usize,
    ranking: RankingPolicy,
) -> ResultSet {
    if max_results == 0 {
        return ResultSet::empty();
    }
    let mut groups = group(index.prefix_range(text));
    ranking.rank(&mut groups);
    groups.truncate(max_results);
    ResultSet::from_groups(groups)
}
