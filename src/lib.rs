//! Incremental prefix search over sharded documentation symbol indexes.
//!
//! A documentation generator splits its symbol table into shards (one per
//! category and leading character). This crate loads those shards on demand,
//! merges them into a sorted token index and answers partial-keystroke
//! queries with grouped, ranked results.

pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod search;
pub mod shard;
pub mod tracing;
pub mod types;

pub use config::SearchConfig;
pub use context::{IndexSnapshot, IndexStats, IndexVersion, SearchIndex};
pub use controller::{Emission, QueryController, QueryState};
pub use error::{ShardIdError, ShardLoadError};
pub use search::{Query, RankingPolicy, TokenIndex};
pub use shard::{DirectorySource, MemorySource, Shard, ShardId, ShardManifest, ShardSource, ShardStore};
pub use types::{GroupedResult, Occurrence, Record, ResultSet};
