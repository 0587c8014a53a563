//! Shard loading: identifiers, asset decoding, sources and the shard store.

mod format;
mod id;
mod manifest;
mod source;
mod store;

pub use id::ShardId;
pub use manifest::ShardManifest;
pub use source::{DirectorySource, MemorySource, ShardSource};
pub use store::ShardStore;

pub(crate) use store::merge_shards;

use crate::types::Record;
use std::sync::Arc;

/// One immutable partition of the search index.
///
/// Records are sorted by token with no repeats; [`ShardStore`] never hands out
/// a shard that violates this.
#[derive(Debug)]
pub struct Shard {
    id: ShardId,
    records: Vec<Arc<Record>>,
    /// xxh3 of the raw asset bytes
    fingerprint: u64,
}

impl Shard {
    /// Parse and validate a shard from asset text.
    pub fn parse(id: ShardId, text: &str) -> Result<Self, crate::error::ShardLoadError> {
        format::parse_shard(&id, text)
    }

    pub const fn id(&self) -> &ShardId {
        &self.id
    }

    pub fn records(&self) -> &[Arc<Record>] {
        &self.records
    }

    pub const fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
