//! Incremental query controller.
//!
//! Sequences queries as the user types. Each input gets the next sequence
//! number; if its shards are loaded the result is computed on the spot,
//! otherwise the load runs as a background task and the query is pending.
//! A result is delivered only if its sequence number is still the latest
//! issued when it completes, so a slow load for an early keystroke can never
//! overwrite the results of a later one.

use crate::context::SearchIndex;
use crate::search::Query;
use crate::types::ResultSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};

/// Where the controller is in the query lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState {
    /// Input is empty (or below the minimum length)
    Idle,
    /// Waiting for shards needed by query `seq`
    Pending(u64),
    /// Query `seq` produced these results
    Completed(u64, ResultSet),
}

impl QueryState {
    pub const fn seq(&self) -> Option<u64> {
        match self {
            Self::Idle => None,
            Self::Pending(seq) | Self::Completed(seq, _) => Some(*seq),
        }
    }
}

/// A result set delivered to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    pub seq: u64,
    /// Normalized query text; empty for an idle emission
    pub query: String,
    pub results: ResultSet,
}

struct Inner {
    index: Arc<SearchIndex>,
    latest: u64,
    state: QueryState,
}

/// Drives a [`SearchIndex`] from a stream of input changes.
///
/// Emissions arrive on the receiver returned by [`QueryController::new`] in
/// non-decreasing sequence order; stale results are dropped, not delivered.
pub struct QueryController {
    inner: Arc<Mutex<Inner>>,
    emissions: mpsc::UnboundedSender<Emission>,
    tasks: Mutex<JoinSet<()>>,
    handle: Handle,
}

impl std::fmt::Debug for QueryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("QueryController")
            .field("latest", &inner.latest)
            .field("state", &inner.state)
            .finish_non_exhaustive()
    }
}

impl QueryController {
    /// Create a controller on the current tokio runtime.
    ///
    /// Must be called from within a runtime; use [`QueryController::with_handle`]
    /// otherwise.
    pub fn new(index: Arc<SearchIndex>) -> (Self, mpsc::UnboundedReceiver<Emission>) {
        Self::with_handle(index, Handle::current())
    }

    /// Create a controller that spawns its loads on `handle`.
    pub fn with_handle(
        index: Arc<SearchIndex>,
        handle: Handle,
    ) -> (Self, mpsc::UnboundedReceiver<Emission>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self {
            inner: Arc::new(Mutex::new(Inner {
                index,
                latest: 0,
                state: QueryState::Idle,
            })),
            emissions: tx,
            tasks: Mutex::new(JoinSet::new()),
            handle,
        };
        (controller, rx)
    }

    /// Handle one input change and return the state it moved to.
    pub fn submit(&self, raw: &str) -> QueryState {
        let mut inner = self.lock();
        inner.latest += 1;
        let seq = inner.latest;
        let index = Arc::clone(&inner.index);

        let Some(query) = Query::new(seq, raw).filter(|q| index.config().accepts(&q.text)) else {
            inner.state = QueryState::Idle;
            if index.config().emit_empty_on_idle {
                send(&self.emissions, seq, String::new(), ResultSet::empty());
            }
            return QueryState::Idle;
        };

        if index.needs_load(&query.text) {
            inner.state = QueryState::Pending(seq);
            drop(inner);
            tracing::debug!(seq, query = %query.text, "Query pending on shard load");
            self.spawn_load(query, index);
            return QueryState::Pending(seq);
        }

        let results = index.search(&query.text);
        inner.state = QueryState::Completed(seq, results.clone());
        send(&self.emissions, seq, query.text, results.clone());
        QueryState::Completed(seq, results)
    }

    /// Replace the index wholesale (e.g. a new documentation version).
    ///
    /// Results still in flight against the old index become stale.
    pub fn set_index(&self, index: Arc<SearchIndex>) {
        let mut inner = self.lock();
        inner.latest += 1;
        inner.index = index;
        inner.state = QueryState::Idle;
        tracing::info!(seq = inner.latest, "Swapped search index");
    }

    pub fn index(&self) -> Arc<SearchIndex> {
        Arc::clone(&self.lock().index)
    }

    pub fn state(&self) -> QueryState {
        self.lock().state.clone()
    }

    /// Sequence number of the most recently issued query.
    pub fn latest_seq(&self) -> u64 {
        self.lock().latest
    }

    /// Wait for every outstanding load task to finish.
    pub async fn drain(&self) {
        let mut tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        while let Some(joined) = tasks.join_next().await {
            log_task_result(joined);
        }
    }

    fn spawn_load(&self, query: Query, index: Arc<SearchIndex>) {
        let inner = Arc::clone(&self.inner);
        let emissions = self.emissions.clone();

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        // Reap finished tasks so the set does not grow with every keystroke.
        reap_finished(&mut tasks);
        tasks.spawn_on(
            async move {
                let Query { seq, text } = query;
                let errors = index.ensure_loaded(&text).await;
                if !errors.is_empty() {
                    tracing::warn!(
                        seq,
                        query = %text,
                        failed = errors.len(),
                        "Serving query from partially loaded index"
                    );
                }
                let results = index.search(&text);
                complete(&inner, &emissions, &index, seq, text, results);
            },
            &self.handle,
        );
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Deliver the result of an asynchronous query unless a newer one was issued
/// or the index was swapped in the meantime.
fn complete(
    inner: &Mutex<Inner>,
    emissions: &mpsc::UnboundedSender<Emission>,
    index: &Arc<SearchIndex>,
    seq: u64,
    text: String,
    results: ResultSet,
) {
    let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
    if seq != inner.latest || !Arc::ptr_eq(&inner.index, index) {
        tracing::debug!(seq, latest = inner.latest, query = %text, "Discarding stale result");
        return;
    }
    inner.state = QueryState::Completed(seq, results.clone());
    send(emissions, seq, text, results);
}

/// Collect tasks that already finished. Returns how many of them failed.
fn reap_finished(tasks: &mut JoinSet<()>) -> usize {
    let mut failed = 0;
    while let Some(joined) = tasks.try_join_next() {
        if !log_task_result(joined) {
            failed += 1;
        }
    }
    failed
}

fn log_task_result(joined: Result<(), JoinError>) -> bool {
    match joined {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Query load task failed");
            false
        }
    }
}

/// Emit while the caller holds the state lock, so delivery order follows
/// sequence order.
fn send(emissions: &mpsc::UnboundedSender<Emission>, seq: u64, query: String, results: ResultSet) {
    if emissions.send(Emission { seq, query, results }).is_err() {
        tracing::trace!(seq, "Emission receiver dropped");
    }
}
