//! Shard manifest: which shards exist and which first character each covers.

use super::ShardId;
use crate::error::Result;
use anyhow::Context;
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Describes the shards of one index version.
///
/// Each section maps a category to a string of first characters: character *i*
/// of the string is the leading character of every token in shard
/// `{category}_{i:x}`. This lets the store fetch only the shards a query can
/// match.
///
/// Manifests built by [`ShardManifest::discover`] know which shards exist but
/// not which characters they cover, so every discovered shard is considered
/// relevant to every query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardManifest {
    /// Opaque index version label
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    sections: BTreeMap<String, String>,
    #[serde(skip)]
    unindexed: Vec<ShardId>,
}

impl ShardManifest {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            ..Self::default()
        }
    }

    /// Add a section: `first_chars[i]` is covered by shard `{category}_{i:x}`.
    pub fn with_section(mut self, category: impl Into<String>, first_chars: impl Into<String>) -> Self {
        self.sections.insert(category.into(), first_chars.into());
        self
    }

    /// Add a shard whose character coverage is unknown.
    pub fn with_unindexed(mut self, id: ShardId) -> Self {
        if !self.unindexed.contains(&id) {
            self.unindexed.push(id);
            self.unindexed.sort();
        }
        self
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse shard manifest")
    }

    /// Load a JSON manifest from disk.
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read shard manifest at {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    /// Build a manifest from the shard files found directly inside `dir`.
    pub async fn discover(dir: &Path) -> Result<Self> {
        let dir = dir.to_path_buf();
        if !tokio::fs::metadata(&dir)
            .await
            .with_context(|| format!("Failed to read shard directory {}", dir.display()))?
            .is_dir()
        {
            anyhow::bail!("Shard path {} is not a directory", dir.display());
        }

        tokio::task::spawn_blocking(move || {
            let mut manifest = Self::default();
            for entry in WalkBuilder::new(&dir)
                .max_depth(Some(1))
                .standard_filters(false)
                .build()
                .filter_map(std::result::Result::ok)
            {
                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }
                if let Some(id) = ShardId::from_path(entry.path()) {
                    manifest.unindexed.push(id);
                }
            }
            manifest.unindexed.sort();
            manifest.unindexed.dedup();
            tracing::debug!(
                dir = %dir.display(),
                shards = manifest.unindexed.len(),
                "Discovered shard files"
            );
            manifest
        })
        .await
        .context("Shard discovery task panicked")
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Every shard in the manifest, restricted to `categories` when non-empty.
    pub fn shard_ids(&self, categories: &[String]) -> Vec<ShardId> {
        let mut ids: Vec<ShardId> = self
            .sections
            .iter()
            .filter(|(category, _)| accepts(categories, category))
            .flat_map(|(category, chars)| {
                (0..chars.chars().count()).map(move |i| ShardId::new(category.as_str(), index(i)))
            })
            .chain(self.unindexed_in(categories))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Shards that may hold tokens starting with the first character of `query`.
    pub fn shards_for(&self, query: &str, categories: &[String]) -> Vec<ShardId> {
        let Some(first) = query.chars().next() else {
            return Vec::new();
        };

        let mut ids: Vec<ShardId> = self
            .sections
            .iter()
            .filter(|(category, _)| accepts(categories, category))
            .flat_map(|(category, chars)| {
                chars
                    .chars()
                    .enumerate()
                    .filter(move |(_, c)| *c == first)
                    .map(move |(i, _)| ShardId::new(category.as_str(), index(i)))
            })
            .chain(self.unindexed_in(categories))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    fn unindexed_in<'a>(&'a self, categories: &'a [String]) -> impl Iterator<Item = ShardId> + 'a {
        self.unindexed
            .iter()
            .filter(move |id| accepts(categories, id.category()))
            .cloned()
    }
}

fn accepts(categories: &[String], category: &str) -> bool {
    categories.is_empty() || categories.iter().any(|c| c == category)
}

/// Section positions are bounded by the number of distinct characters.
#[allow(clippy::cast_possible_truncation)]
const fn index(position: usize) -> u32 {
    position as u32
}
