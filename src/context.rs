//! Index context: the shard store plus the currently published token index.
//!
//! A [`SearchIndex`] is an explicitly owned value rather than process-wide
//! state, so several independent indexes (one per documentation version, say)
//! can live side by side and tests stay isolated.

use crate::config::SearchConfig;
use crate::error::{Result, ShardLoadError};
use crate::search::{TokenIndex, normalize, search_normalized};
use crate::shard::{DirectorySource, ShardId, ShardManifest, ShardSource, ShardStore};
use crate::types::ResultSet;
use lru::LruCache;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use xxhash_rust::xxh3::Xxh3;

/// File name of the manifest inside a shard directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Identifies the exact set of shard contents a snapshot was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexVersion(u64);

impl IndexVersion {
    fn compute(manifest: &ShardManifest, shards: &[(ShardId, u64)]) -> Self {
        let mut hasher = Xxh3::new();
        hasher.update(manifest.version().unwrap_or_default().as_bytes());
        for (id, fingerprint) in shards {
            hasher.update(id.to_string().as_bytes());
            hasher.update(&fingerprint.to_le_bytes());
        }
        Self(hasher.digest())
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for IndexVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// An immutable token index together with the shards it covers.
#[derive(Debug)]
pub struct IndexSnapshot {
    version: IndexVersion,
    index: TokenIndex,
    shards: Vec<(ShardId, u64)>,
}

impl IndexSnapshot {
    pub const fn version(&self) -> IndexVersion {
        self.version
    }

    pub const fn index(&self) -> &TokenIndex {
        &self.index
    }

    pub fn shard_ids(&self) -> impl Iterator<Item = &ShardId> {
        self.shards.iter().map(|(id, _)| id)
    }
}

/// Point-in-time counters for an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub version: IndexVersion,
    pub loaded_shards: usize,
    pub failed_shards: usize,
    pub records: usize,
}

/// Memoization key: results depend on the index version, the normalized
/// text and the cap.
type ResultKey = (IndexVersion, String, usize);

/// Owns a shard store and publishes token index snapshots built from it.
pub struct SearchIndex {
    store: ShardStore,
    config: SearchConfig,
    snapshot: RwLock<Arc<IndexSnapshot>>,
    /// Serializes rebuilds so two loads finishing together build once
    rebuild: tokio::sync::Mutex<()>,
    results: Option<Mutex<LruCache<ResultKey, ResultSet>>>,
}

impl fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchIndex")
            .field("store", &self.store)
            .field("version", &self.version())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SearchIndex {
    pub fn new(source: Arc<dyn ShardSource>, manifest: ShardManifest, config: SearchConfig) -> Self {
        let store = ShardStore::new(source, manifest).with_categories(config.categories.clone());
        let empty = IndexSnapshot {
            version: IndexVersion::compute(store.manifest(), &[]),
            index: TokenIndex::default(),
            shards: Vec::new(),
        };
        let results = NonZeroUsize::new(config.result_cache_size).map(|n| Mutex::new(LruCache::new(n)));
        Self {
            store,
            config,
            snapshot: RwLock::new(Arc::new(empty)),
            rebuild: tokio::sync::Mutex::new(()),
            results,
        }
    }

    /// Open a shard directory, using its `manifest.json` when present and
    /// discovering shard files otherwise.
    pub async fn open_dir(dir: &Path, config: SearchConfig) -> Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest = if tokio::fs::try_exists(&manifest_path).await.unwrap_or(false) {
            ShardManifest::load(&manifest_path).await?
        } else {
            ShardManifest::discover(dir).await?
        };
        tracing::info!(
            dir = %dir.display(),
            version = manifest.version().unwrap_or("unversioned"),
            "Opened shard directory"
        );
        Ok(Self::new(Arc::new(DirectorySource::new(dir)), manifest, config))
    }

    pub const fn store(&self) -> &ShardStore {
        &self.store
    }

    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The currently published snapshot. Holding it keeps that version alive
    /// even if a rebuild publishes a newer one.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn version(&self) -> IndexVersion {
        self.snapshot().version
    }

    /// Whether answering normalized `text` requires loading more shards.
    pub fn needs_load(&self, text: &str) -> bool {
        self.store.needs_fetch(text)
    }

    /// Load the shards relevant to normalized `text` and publish a new
    /// snapshot if the shard set changed. Returns the shards that failed.
    pub async fn ensure_loaded(&self, text: &str) -> Vec<ShardLoadError> {
        let ids = self.store.shards_for(text);
        let errors = self.store.ensure(&ids).await;
        self.refresh().await;
        errors
    }

    /// Load every shard in the manifest.
    pub async fn preload_all(&self) -> Vec<ShardLoadError> {
        let errors = self.store.ensure(&self.store.shard_ids()).await;
        self.refresh().await;
        errors
    }

    /// Rebuild the token index from the loaded shards if they changed since
    /// the last snapshot. Returns whether a new snapshot was published.
    pub async fn refresh(&self) -> bool {
        let _guard = self.rebuild.lock().await;

        let shards = self.store.loaded_shards();
        let fingerprints: Vec<(ShardId, u64)> = shards
            .iter()
            .map(|s| (s.id().clone(), s.fingerprint()))
            .collect();
        if self.snapshot().shards == fingerprints {
            return false;
        }

        let start = std::time::Instant::now();
        let index = TokenIndex::from_sorted(crate::shard::merge_shards(&shards));
        let snapshot = IndexSnapshot {
            version: IndexVersion::compute(self.store.manifest(), &fingerprints),
            index,
            shards: fingerprints,
        };
        tracing::info!(
            version = %snapshot.version,
            shards = snapshot.shards.len(),
            records = snapshot.index.len(),
            elapsed = ?start.elapsed(),
            "Published token index"
        );

        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
        true
    }

    /// Search with the configured result cap.
    pub fn search(&self, raw: &str) -> ResultSet {
        self.search_limited(raw, self.config.max_results)
    }

    /// Search the published snapshot. Never blocks on I/O; shards that are not
    /// loaded simply contribute nothing.
    pub fn search_limited(&self, raw: &str, max_results: usize) -> ResultSet {
        let Some(text) = normalize(raw) else {
            return ResultSet::empty();
        };
        let snapshot = self.snapshot();
        let ranking = self.config.ranking;

        let Some(results) = &self.results else {
            return search_normalized(&snapshot.index, &text, max_results, ranking);
        };

        let key = (snapshot.version, text, max_results);
        if let Some(hit) = results.lock().unwrap_or_else(PoisonError::into_inner).get(&key) {
            tracing::trace!(query = %key.1, "Result cache hit");
            return hit.clone();
        }

        let computed = search_normalized(&snapshot.index, &key.1, max_results, ranking);
        results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key, computed.clone());
        computed
    }

    pub fn stats(&self) -> IndexStats {
        let snapshot = self.snapshot();
        IndexStats {
            version: snapshot.version,
            loaded_shards: snapshot.shards.len(),
            failed_shards: self.store.failures().len(),
            records: snapshot.index.len(),
        }
    }
}
