//! Where shard assets come from.

use super::ShardId;
use super::id::SHARD_EXTENSIONS;
use crate::error::ShardLoadError;
use ahash::AHashMap;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::path::PathBuf;
use std::sync::Arc;

/// Fetches the raw text of a shard asset.
///
/// Implementations only fetch; decoding and validation happen in the store so
/// every source gets the same invariants.
pub trait ShardSource: Send + Sync + 'static {
    fn fetch(&self, id: &ShardId) -> BoxFuture<'static, Result<String, ShardLoadError>>;
}

/// Reads shards from `<root>/<id>.js` or `<root>/<id>.json`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ShardSource for DirectorySource {
    fn fetch(&self, id: &ShardId) -> BoxFuture<'static, Result<String, ShardLoadError>> {
        let candidates: Vec<PathBuf> = SHARD_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{id}.{ext}")))
            .collect();
        let id = id.clone();

        async move {
            for path in &candidates {
                match tokio::fs::read_to_string(path).await {
                    Ok(text) => {
                        tracing::trace!(shard = %id, path = %path.display(), "Read shard asset");
                        return Ok(text);
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(ShardLoadError::Io {
                            shard: id,
                            message: format!("{}: {}", path.display(), e),
                        });
                    }
                }
            }
            Err(ShardLoadError::NotFound {
                path: candidates.into_iter().next().unwrap_or_default(),
                shard: id,
            })
        }
        .boxed()
    }
}

/// Shards held in memory, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    shards: AHashMap<ShardId, Arc<str>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shard(mut self, id: ShardId, text: impl Into<Arc<str>>) -> Self {
        self.insert(id, text);
        self
    }

    pub fn insert(&mut self, id: ShardId, text: impl Into<Arc<str>>) {
        self.shards.insert(id, text.into());
    }

    pub fn ids(&self) -> impl Iterator<Item = &ShardId> {
        self.shards.keys()
    }
}

impl ShardSource for MemorySource {
    fn fetch(&self, id: &ShardId) -> BoxFuture<'static, Result<String, ShardLoadError>> {
        let result = self
            .shards
            .get(id)
            .map(|text| text.to_string())
            .ok_or_else(|| ShardLoadError::NotFound {
                shard: id.clone(),
                path: PathBuf::from(id.to_string()),
            });
        futures::future::ready(result).boxed()
    }
}
