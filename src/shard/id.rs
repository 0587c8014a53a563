//! Shard identifiers and file naming.

use crate::error::ShardIdError;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

/// Matches `functions_0`, `all_1a`, `classes_f` (category, hex index).
static SHARD_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<category>[A-Za-z][A-Za-z0-9]*)_(?P<index>[0-9a-fA-F]+)$")
        .unwrap_or_else(|e| unreachable!("shard name pattern is valid: {e}"))
});

/// File extensions a shard may be stored under, in lookup order.
pub(crate) const SHARD_EXTENSIONS: &[&str] = &["js", "json"];

/// Identifies one shard: the symbol category it belongs to and its position
/// within that category.
///
/// Rendered as `{category}_{index:x}`, which is also the shard's file stem.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShardId {
    category: String,
    index: u32,
}

impl ShardId {
    pub fn new(category: impl Into<String>, index: u32) -> Self {
        Self {
            category: category.into(),
            index,
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Parse a shard id from a file path, accepting only known shard extensions.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if !SHARD_EXTENSIONS.contains(&ext) {
            return None;
        }
        path.file_stem()?.to_str()?.parse().ok()
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{:x}", self.category, self.index)
    }
}

impl FromStr for ShardId {
    type Err = ShardIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = SHARD_NAME
            .captures(s.trim())
            .ok_or_else(|| ShardIdError::Malformed(s.to_string()))?;
        let index = u32::from_str_radix(&caps["index"], 16)
            .map_err(|_| ShardIdError::IndexOverflow(s.to_string()))?;
        Ok(Self::new(&caps["category"], index))
    }
}

impl Serialize for ShardId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ShardId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
