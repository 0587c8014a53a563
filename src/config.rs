//! Search configuration.

use crate::error::Result;
use crate::search::RankingPolicy;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default cap on grouped results per query.
pub const DEFAULT_MAX_RESULTS: usize = 50;

/// Default number of memoized result sets.
pub const DEFAULT_RESULT_CACHE_SIZE: usize = 64;

/// Tunables for an index and its query controller.
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Maximum grouped results per query; 0 disables results entirely
    pub max_results: usize,
    /// Inputs shorter than this (after normalization) are treated as empty
    pub min_query_len: usize,
    /// Emit an empty result set when the input becomes empty
    pub emit_empty_on_idle: bool,
    pub ranking: RankingPolicy,
    /// Shard categories to load; empty loads every category in the manifest
    pub categories: Vec<String>,
    /// Number of recent result sets to memoize; 0 disables memoization
    pub result_cache_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            min_query_len: 1,
            emit_empty_on_idle: true,
            ranking: RankingPolicy::default(),
            categories: Vec::new(),
            result_cache_size: DEFAULT_RESULT_CACHE_SIZE,
        }
    }
}

impl SearchConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse search configuration")
    }

    /// Read a TOML config file.
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Whether normalized `text` is long enough to be searched.
    pub fn accepts(&self, text: &str) -> bool {
        !text.is_empty() && text.chars().count() >= self.min_query_len
    }
}
