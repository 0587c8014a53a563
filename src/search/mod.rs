//! Prefix search over loaded shards.
//!
//! This module provides the token index, the occurrence grouper, ranking
//! policies and the query pipeline that ties them together.

// Module declarations
pub(crate) mod group;
pub(crate) mod index;
pub(crate) mod query;
pub(crate) mod scoring;

// Public re-exports (used via lib.rs)
pub use group::group;
pub use index::TokenIndex;
pub use query::{Query, normalize, search};
pub use scoring::RankingPolicy;

// Internal re-exports
pub(crate) use query::search_normalized;
