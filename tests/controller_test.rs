mod common;

use assert2::{check, let_assert};
use common::{GatedSource, two_shard_manifest, two_shard_source};
use std::sync::Arc;
use symbol_search::{
    Emission, MemorySource, QueryController, QueryState, SearchConfig, SearchIndex, ShardId,
    ShardManifest, ShardSource,
};
use tokio::sync::mpsc::UnboundedReceiver;

fn gated_index() -> (Arc<GatedSource>, Arc<SearchIndex>) {
    symbol_search::tracing::init();
    let source = Arc::new(GatedSource::new(two_shard_source()));
    let index = SearchIndex::new(
        Arc::clone(&source) as Arc<dyn ShardSource>,
        two_shard_manifest(),
        SearchConfig::default(),
    );
    (source, Arc::new(index))
}

fn collect(rx: &mut UnboundedReceiver<Emission>) -> Vec<Emission> {
    let mut emissions = Vec::new();
    while let Ok(emission) = rx.try_recv() {
        emissions.push(emission);
    }
    emissions
}

/// Test: a slow load for an earlier keystroke never replaces the results of a
/// later keystroke that completed first.
#[tokio::test]
async fn controller_discards_superseded_result() {
    let (source, index) = gated_index();
    let slow = ShardId::new("functions", 0);
    source.gate(&slow);
    check!(index.ensure_loaded("b").await.is_empty());

    let (controller, mut rx) = QueryController::new(index);
    check!(controller.submit("ad") == QueryState::Pending(1));

    let_assert!(QueryState::Completed(2, results) = controller.submit("be"));
    check!(results.display_names() == ["BeliefNode", "BeliefTree"]);

    source.release(&slow);
    controller.drain().await;

    let emissions = collect(&mut rx);
    let_assert!([only] = emissions.as_slice());
    check!(only.seq == 2);
    check!(only.query == "be");
    let_assert!(QueryState::Completed(2, _) = controller.state());
}

/// Test: a pending query that is still the latest is delivered once its
/// shard arrives.
#[tokio::test]
async fn controller_pending_query_completes() {
    let (source, index) = gated_index();
    let slow = ShardId::new("functions", 0);
    source.gate(&slow);

    let (controller, mut rx) = QueryController::new(Arc::clone(&index));
    check!(controller.submit("Ad") == QueryState::Pending(1));
    check!(rx.try_recv().is_err());

    source.release(&slow);
    controller.drain().await;

    let emissions = collect(&mut rx);
    let_assert!([emission] = emissions.as_slice());
    check!(emission.seq == 1);
    check!(emission.query == "ad");
    check!(emission.results.display_names() == ["add", "addAlias"]);
    check!(index.store().is_loaded(&slow));
}

/// Test: emissions arrive in non-decreasing sequence order and the final one
/// answers the last keystroke.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn controller_emissions_follow_sequence_order() {
    symbol_search::tracing::init();
    let index = Arc::new(SearchIndex::new(
        Arc::new(two_shard_source()),
        two_shard_manifest(),
        SearchConfig::default(),
    ));
    let (controller, mut rx) = QueryController::new(index);

    for input in ["a", "ad", "add", "", "b", "be", "bel", "belief"] {
        controller.submit(input);
    }
    controller.drain().await;

    let emissions = collect(&mut rx);
    check!(emissions.windows(2).all(|w| w[0].seq <= w[1].seq));
    let_assert!(Some(last) = emissions.last());
    check!(last.seq == 8);
    check!(last.results.display_names() == ["BeliefNode", "BeliefTree"]);
    check!(controller.latest_seq() == 8);
}

/// Test: swapping the index makes in-flight results against the old one stale.
#[tokio::test]
async fn controller_set_index_discards_in_flight_result() {
    let (source, old) = gated_index();
    let slow = ShardId::new("functions", 0);
    source.gate(&slow);

    let (controller, mut rx) = QueryController::new(old);
    check!(controller.submit("ad") == QueryState::Pending(1));

    let fresh = Arc::new(SearchIndex::new(
        Arc::new(MemorySource::new().with_shard(
            ShardId::new("functions", 0),
            r#"[["adapter", "Adapter", ["x.html#1", "io::Adapter"]]]"#,
        )),
        ShardManifest::new("v2").with_section("functions", "a"),
        SearchConfig::default(),
    ));
    controller.set_index(Arc::clone(&fresh));
    check!(controller.state() == QueryState::Idle);

    source.release(&slow);
    controller.drain().await;
    check!(rx.try_recv().is_err());

    check!(controller.submit("ad") == QueryState::Pending(3));
    controller.drain().await;
    let emissions = collect(&mut rx);
    let_assert!([emission] = emissions.as_slice());
    check!(emission.seq == 3);
    check!(emission.results.display_names() == ["Adapter"]);
    check!(Arc::ptr_eq(&controller.index(), &fresh));
}

/// Test: a shard that fails to load leaves the query answered from whatever
/// did load.
#[tokio::test]
async fn controller_serves_partial_results_when_shard_missing() {
    let manifest = ShardManifest::new("v1")
        .with_section("functions", "a")
        .with_section("all", "a");
    let index = Arc::new(SearchIndex::new(
        Arc::new(two_shard_source()),
        manifest,
        SearchConfig::default(),
    ));
    let (controller, mut rx) = QueryController::new(Arc::clone(&index));

    check!(controller.submit("ad") == QueryState::Pending(1));
    controller.drain().await;

    let emissions = collect(&mut rx);
    let_assert!([emission] = emissions.as_slice());
    check!(emission.results.display_names() == ["add", "addAlias"]);
    check!(index.stats().failed_shards == 1);

    // The failure is remembered, so the next keystroke completes immediately.
    let_assert!(QueryState::Completed(2, results) = controller.submit("add"));
    check!(results.display_names() == ["add", "addAlias"]);
}
