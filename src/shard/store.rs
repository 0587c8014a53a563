//! Lazily populated, read-only cache of validated shards.
//!
//! Loads are deduplicated through shared in-flight futures so that several
//! queries waiting on the same shard trigger a single fetch. Once a shard is
//! loaded it stays for the lifetime of the store; a shard that fails is
//! remembered so a broken asset is not refetched on every keystroke.

use super::format::parse_shard;
use super::{Shard, ShardId, ShardManifest, ShardSource};
use crate::error::ShardLoadError;
use crate::types::Record;
use ahash::AHashMap;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Type alias for shared shard load futures.
type SharedShardFuture = Shared<BoxFuture<'static, Result<Arc<Shard>, ShardLoadError>>>;

/// What a caller found once it held the in-flight map.
enum LoadSlot {
    Settled(Result<Arc<Shard>, ShardLoadError>),
    Waiting(SharedShardFuture),
}

/// Owns every loaded shard of one index version.
pub struct ShardStore {
    source: Arc<dyn ShardSource>,
    manifest: ShardManifest,
    /// Categories to load; empty means all
    categories: Vec<String>,
    loaded: RwLock<BTreeMap<ShardId, Arc<Shard>>>,
    failed: RwLock<BTreeMap<ShardId, ShardLoadError>>,
    in_flight: Mutex<AHashMap<ShardId, SharedShardFuture>>,
}

impl std::fmt::Debug for ShardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardStore")
            .field("manifest_version", &self.manifest.version())
            .field("categories", &self.categories)
            .field("loaded_count", &self.read_loaded().len())
            .field("failed_count", &self.read_failed().len())
            .finish_non_exhaustive()
    }
}

impl ShardStore {
    pub fn new(source: Arc<dyn ShardSource>, manifest: ShardManifest) -> Self {
        Self {
            source,
            manifest,
            categories: Vec::new(),
            loaded: RwLock::new(BTreeMap::new()),
            failed: RwLock::new(BTreeMap::new()),
            in_flight: Mutex::new(AHashMap::new()),
        }
    }

    /// Restrict the store to the given categories (empty means all).
    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    pub const fn manifest(&self) -> &ShardManifest {
        &self.manifest
    }

    /// Shards that must be loaded to answer a query starting like `query`.
    pub fn shards_for(&self, query: &str) -> Vec<ShardId> {
        self.manifest.shards_for(query, &self.categories)
    }

    /// Every shard this store can load.
    pub fn shard_ids(&self) -> Vec<ShardId> {
        self.manifest.shard_ids(&self.categories)
    }

    pub fn is_loaded(&self, id: &ShardId) -> bool {
        self.read_loaded().contains_key(id)
    }

    /// Whether answering `query` would require fetching a shard that has
    /// neither loaded nor failed yet.
    pub fn needs_fetch(&self, query: &str) -> bool {
        let ids = self.shards_for(query);
        let loaded = self.read_loaded();
        let failed = self.read_failed();
        ids.iter()
            .any(|id| !loaded.contains_key(id) && !failed.contains_key(id))
    }

    /// Load one shard, sharing any fetch already in progress.
    pub async fn load(&self, id: &ShardId) -> Result<Arc<Shard>, ShardLoadError> {
        if let Some(result) = self.settled(id) {
            return result;
        }

        let future = match self.join_or_start(id) {
            LoadSlot::Settled(result) => return result,
            LoadSlot::Waiting(future) => future,
        };

        let result = future.await;

        // Publish before clearing the in-flight entry so a concurrent caller
        // always sees one of the two.
        match &result {
            Ok(shard) => {
                let mut loaded = self.loaded.write().unwrap_or_else(PoisonError::into_inner);
                if !loaded.contains_key(id) {
                    tracing::info!(
                        shard = %id,
                        records = shard.len(),
                        fingerprint = shard.fingerprint(),
                        "Loaded shard"
                    );
                    loaded.insert(id.clone(), Arc::clone(shard));
                }
            }
            Err(err) => {
                let mut failed = self.failed.write().unwrap_or_else(PoisonError::into_inner);
                if !failed.contains_key(id) {
                    tracing::warn!(shard = %id, error = %err, "Rejected shard");
                    failed.insert(id.clone(), err.clone());
                }
            }
        }
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);

        result
    }

    /// Load several shards concurrently.
    ///
    /// Failures do not stop the other loads; they are returned so the caller
    /// can report them while continuing to serve from what did load.
    pub async fn ensure(&self, ids: &[ShardId]) -> Vec<ShardLoadError> {
        join_all(ids.iter().map(|id| self.load(id)))
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect()
    }

    /// Loaded shards in id order.
    pub fn loaded_shards(&self) -> Vec<Arc<Shard>> {
        self.read_loaded().values().cloned().collect()
    }

    pub fn failures(&self) -> Vec<ShardLoadError> {
        self.read_failed().values().cloned().collect()
    }

    /// Forget remembered failures so the shards are fetched again on demand.
    pub fn clear_failures(&self) {
        let mut failed = self.failed.write().unwrap_or_else(PoisonError::into_inner);
        if !failed.is_empty() {
            tracing::info!(count = failed.len(), "Clearing shard failures");
            failed.clear();
        }
    }

    /// All records of all loaded shards, merged in token order.
    ///
    /// Each shard is already sorted, so this is a k-way merge. Records with the
    /// same token in different shards come out in shard id order.
    pub fn all_records(&self) -> Vec<Arc<Record>> {
        merge_shards(&self.loaded_shards())
    }

    /// The cached outcome for `id`, if its load already finished.
    fn settled(&self, id: &ShardId) -> Option<Result<Arc<Shard>, ShardLoadError>> {
        if let Some(shard) = self.read_loaded().get(id) {
            return Some(Ok(Arc::clone(shard)));
        }
        self.read_failed().get(id).map(|err| Err(err.clone()))
    }

    /// Join the in-flight load of `id` or start one.
    ///
    /// A load publishes its outcome before leaving the in-flight map, so
    /// checking again under the lock catches one that finished after the
    /// caller's first look.
    fn join_or_start(&self, id: &ShardId) -> LoadSlot {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(future) = in_flight.get(id) {
            tracing::debug!(shard = %id, "Awaiting in-flight shard load");
            return LoadSlot::Waiting(future.clone());
        }
        if let Some(result) = self.settled(id) {
            return LoadSlot::Settled(result);
        }
        let future = self.fetch_and_parse(id.clone()).shared();
        in_flight.insert(id.clone(), future.clone());
        LoadSlot::Waiting(future)
    }

    fn fetch_and_parse(&self, id: ShardId) -> BoxFuture<'static, Result<Arc<Shard>, ShardLoadError>> {
        let source = Arc::clone(&self.source);
        async move {
            let text = source.fetch(&id).await?;
            let parse_id = id.clone();
            // Parsing is CPU bound; keep it off the async workers.
            tokio::task::spawn_blocking(move || parse_shard(&parse_id, &text))
                .await
                .map_err(|e| ShardLoadError::Io {
                    shard: id.clone(),
                    message: format!("shard parsing task failed: {e}"),
                })?
                .map(Arc::new)
        }
        .boxed()
    }

    fn read_loaded(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<ShardId, Arc<Shard>>> {
        self.loaded.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_failed(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<ShardId, ShardLoadError>> {
        self.failed.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// K-way merge of individually sorted shards.
pub(crate) fn merge_shards(shards: &[Arc<Shard>]) -> Vec<Arc<Record>> {
    let total = shards.iter().map(|s| s.len()).sum();
    let mut merged = Vec::with_capacity(total);

    let mut heap: BinaryHeap<Reverse<(&str, usize, usize)>> = shards
        .iter()
        .enumerate()
        .filter_map(|(shard, s)| s.records().first().map(|r| Reverse((r.token(), shard, 0))))
        .collect();

    while let Some(Reverse((_, shard, pos))) = heap.pop() {
        let records = shards[shard].records();
        merged.push(Arc::clone(&records[pos]));
        if let Some(next) = records.get(pos + 1) {
            heap.push(Reverse((next.token(), shard, pos + 1)));
        }
    }

    merged
}
