//! Error handling types and utilities.

use crate::shard::ShardId;
use std::path::PathBuf;
use thiserror::Error;

/// A specialized Result type for configuration and discovery operations.
///
/// This is an alias for `anyhow::Result` with context added via `.context()` and
/// `.with_context()` at the call sites that touch the filesystem.
pub type Result<T> = anyhow::Result<T>;

/// Error returned when a shard cannot be fetched or fails structural validation.
///
/// A shard that produces any of these is rejected wholesale; records from it are
/// never partially accepted. The type is `Clone` so a single failure can be
/// handed to every caller awaiting the same in-flight load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShardLoadError {
    #[error("shard '{shard}' not found at {}", path.display())]
    NotFound { shard: ShardId, path: PathBuf },

    #[error("failed to read shard '{shard}': {message}")]
    Io { shard: ShardId, message: String },

    #[error("shard '{shard}' is not a valid search table: {message}")]
    Syntax { shard: ShardId, message: String },

    /// A record does not have the expected tuple arity or element types.
    #[error("shard '{shard}' record {position} has the wrong shape: {message}")]
    Shape {
        shard: ShardId,
        position: usize,
        message: String,
    },

    #[error("shard '{shard}' record {position} has an empty token")]
    EmptyToken { shard: ShardId, position: usize },

    #[error("shard '{shard}' record {position} token '{token}' is not lowercase")]
    UppercaseToken {
        shard: ShardId,
        position: usize,
        token: String,
    },

    #[error(
        "shard '{shard}' record {position} token '{token}' sorts before preceding token '{previous}'"
    )]
    Unsorted {
        shard: ShardId,
        position: usize,
        previous: String,
        token: String,
    },

    #[error("shard '{shard}' record {position} repeats token '{token}'")]
    DuplicateToken {
        shard: ShardId,
        position: usize,
        token: String,
    },

    #[error("shard '{shard}' record {position} token '{token}' has no occurrences")]
    NoOccurrences {
        shard: ShardId,
        position: usize,
        token: String,
    },
}

impl ShardLoadError {
    /// The shard this error was raised for.
    pub fn shard(&self) -> &ShardId {
        match self {
            Self::NotFound { shard, .. }
            | Self::Io { shard, .. }
            | Self::Syntax { shard, .. }
            | Self::Shape { shard, .. }
            | Self::EmptyToken { shard, .. }
            | Self::UppercaseToken { shard, .. }
            | Self::Unsorted { shard, .. }
            | Self::DuplicateToken { shard, .. }
            | Self::NoOccurrences { shard, .. } => shard,
        }
    }
}

/// Error type for shard file name parsing failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShardIdError {
    /// Name is not of the form `<category>_<hex index>`
    #[error("'{0}' is not a shard name (expected <category>_<hex index>)")]
    Malformed(String),
    /// Hex index does not fit in a u32
    #[error("shard index in '{0}' is out of range")]
    IndexOverflow(String),
}
