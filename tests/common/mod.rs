//! Shared test fixtures and utilities for integration tests.
//!
//! # Available Fixtures
//!
//! - `fixture_index`: an index over the checked-in generator shard
//!   (`tests/fixtures/search/functions_0.js`), nothing loaded yet
//! - `ShardDir`: a temporary shard directory for tests that write their own assets
//! - `GatedSource`: an in-memory source whose shards can be held back until
//!   released, for exercising slow loads and stale results

#![allow(dead_code)] // Helpers used across different integration test crates

use futures::FutureExt;
use futures::future::BoxFuture;
use rstest::fixture;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use symbol_search::{
    DirectorySource, MemorySource, SearchConfig, SearchIndex, ShardId, ShardLoadError,
    ShardManifest, ShardSource,
};
use tempfile::TempDir;
use tokio::sync::Notify;

/// Directory holding the checked-in shard fixtures.
pub fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/search")
}

/// Index over the generator's `functions_0` shard, which covers tokens
/// starting with `a`.
#[fixture]
pub fn fixture_index() -> Arc<SearchIndex> {
    symbol_search::tracing::init();
    let manifest = ShardManifest::new("fixture").with_section("functions", "a");
    Arc::new(SearchIndex::new(
        Arc::new(DirectorySource::new(fixture_dir())),
        manifest,
        SearchConfig::default(),
    ))
}

/// A temporary shard directory that is removed when dropped.
pub struct ShardDir {
    _temp: TempDir,
    root: PathBuf,
}

impl ShardDir {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let root = temp.path().to_path_buf();
        Self { _temp: temp, root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Write a shard asset named after `id` with the given extension.
    pub fn write_shard(&self, id: &ShardId, ext: &str, content: &str) {
        let path = self.root.join(format!("{id}.{ext}"));
        std::fs::write(&path, content)
            .unwrap_or_else(|e| panic!("Failed to write {}: {}", path.display(), e));
    }

    pub fn write_manifest(&self, content: &str) {
        std::fs::write(self.root.join("manifest.json"), content).expect("Failed to write manifest");
    }
}

/// In-memory source whose shards can be gated.
///
/// A fetch for a gated shard waits until [`GatedSource::release`] is called
/// for it (before or after the fetch starts).
pub struct GatedSource {
    inner: MemorySource,
    gates: Mutex<HashMap<ShardId, Arc<Notify>>>,
}

impl GatedSource {
    pub fn new(inner: MemorySource) -> Self {
        Self {
            inner,
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Hold back fetches of `id` until released.
    pub fn gate(&self, id: &ShardId) {
        self.gates
            .lock()
            .unwrap()
            .insert(id.clone(), Arc::new(Notify::new()));
    }

    pub fn release(&self, id: &ShardId) {
        if let Some(gate) = self.gates.lock().unwrap().get(id) {
            gate.notify_one();
        }
    }
}

impl ShardSource for GatedSource {
    fn fetch(&self, id: &ShardId) -> BoxFuture<'static, Result<String, ShardLoadError>> {
        let gate = self.gates.lock().unwrap().get(id).cloned();
        let fetch = self.inner.fetch(id);
        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            fetch.await
        }
        .boxed()
    }
}

pub const FUNCTIONS_A: &str = r#"[
    ["add", "add", [["a.html#1", "abt::LinkedHashSet::add()"], ["b.html#2", "abt::RandomAccessSet::add()"]]],
    ["addalias", "addAlias", ["c.html#3", "options::BaseOption"]],
    ["agent", "Agent", ["d.html#4", "solver::Agent"]]
]"#;

pub const FUNCTIONS_B: &str = r#"[
    ["beliefnode", "BeliefNode", [["e.html#5", "solver::BeliefNode::BeliefNode()"], ["e.html#6", "solver::BeliefNode::BeliefNode(long id)"]]],
    ["belieftree", "BeliefTree", ["f.html#7", "solver::BeliefTree"]]
]"#;

/// Two-shard manifest: `functions_0` covers `a`, `functions_1` covers `b`.
pub fn two_shard_manifest() -> ShardManifest {
    ShardManifest::new("v1").with_section("functions", "ab")
}

pub fn two_shard_source() -> MemorySource {
    MemorySource::new()
        .with_shard(ShardId::new("functions", 0), FUNCTIONS_A)
        .with_shard(ShardId::new("functions", 1), FUNCTIONS_B)
}
