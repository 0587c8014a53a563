//! Sorted token index supporting prefix range queries.

use crate::types::Record;
use std::sync::Arc;

/// All records of the loaded shards, sorted by token.
///
/// Because every token starting with a prefix sorts contiguously, a prefix
/// query is two binary searches and yields a slice. The index is immutable
/// once built and is replaced wholesale when the shard set changes.
#[derive(Debug, Clone, Default)]
pub struct TokenIndex {
    records: Vec<Arc<Record>>,
}

impl TokenIndex {
    /// Build from records already in token order (as produced by
    /// [`ShardStore::all_records`](crate::shard::ShardStore::all_records)).
    pub fn from_sorted(records: Vec<Arc<Record>>) -> Self {
        debug_assert!(
            records.windows(2).all(|w| w[0].token() <= w[1].token()),
            "token index input must be sorted"
        );
        Self { records }
    }

    /// Build from records in any order. The sort is stable, so equal tokens
    /// keep their input order.
    pub fn from_unsorted(mut records: Vec<Arc<Record>>) -> Self {
        records.sort_by(|a, b| a.token().cmp(b.token()));
        Self { records }
    }

    /// Records whose token starts with `prefix`, in token order.
    ///
    /// An empty prefix matches nothing.
    pub fn prefix_range(&self, prefix: &str) -> &[Arc<Record>] {
        if prefix.is_empty() {
            return &[];
        }
        let start = self.records.partition_point(|r| r.token() < prefix);
        let len = self.records[start..].partition_point(|r| r.token().starts_with(prefix));
        &self.records[start..start + len]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Arc<Record>] {
        &self.records
    }
}
