//! Behavioural properties of the graph engine.
//!
//! These tests drive the builder and query engine together over in-memory
//! catalogues: closure uniqueness on arbitrary graphs, idempotent event
//! application, epoch monotonicity, cycle witnesses, dangling references,
//! depth truncation and rename.

use std::collections::HashSet;
use std::sync::Arc;

use assetgraph::catalogue::{CatalogueEvent, InMemoryCatalogue};
use assetgraph::domain::{ReferenceEdge, ReferenceKind, ReferenceKinds};
use assetgraph::query::{self, CycleLookup, TraversalRule, VisitBudget};
use assetgraph::store::GraphStore;
use assetgraph::{AssetGraph, EngineConfig};
use proptest::prelude::*;
use rstest::rstest;

mod common;
use common::{catalogue_with, id, scanned_builder, snapshot};

use ReferenceKind::{Hard, Soft};

// ============================================================================
// Closure uniqueness and termination
// ============================================================================

fn arb_graph() -> impl Strategy<Value = (usize, Vec<(usize, usize, bool)>)> {
    (1usize..12).prop_flat_map(|n| {
        (
            Just(n),
            prop::collection::vec((0..n, 0..n, any::<bool>()), 0..40),
        )
    })
}

fn store_from(edges: &[(usize, usize, bool)]) -> GraphStore {
    let edges = edges.iter().map(|(source, target, hard)| {
        let kind = if *hard { Hard } else { Soft };
        ReferenceEdge::new(id(&format!("N{source}")), id(&format!("N{target}")), kind)
    });
    GraphStore::from_parts(Vec::new(), edges)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn closure_holds_each_asset_once((n, edges) in arb_graph(), depth in prop::option::of(0u32..6)) {
        let store = store_from(&edges);
        let roots: Vec<_> = (0..n).step_by(3).map(|i| id(&format!("N{i}"))).collect();
        let mut rule = TraversalRule::dependencies().kinds(ReferenceKinds::ALL);
        if let Some(depth) = depth {
            rule = rule.max_depth(depth);
        }

        let result = query::traverse(&store, &roots, &rule, &mut VisitBudget::new(10_000)).unwrap();

        let unique: HashSet<_> = result.assets.iter().collect();
        prop_assert_eq!(unique.len(), result.assets.len());
        prop_assert!(!result.budget_exhausted);
        prop_assert_eq!(result.depths.len(), result.assets.len());
        if let Some(depth) = depth {
            prop_assert!(result.depths.values().all(|d| *d <= depth));
        }
    }

    #[test]
    fn exhausted_budget_still_terminates_without_duplicates((n, edges) in arb_graph(), limit in 1usize..6) {
        let store = store_from(&edges);
        let roots: Vec<_> = (0..n).map(|i| id(&format!("N{i}"))).collect();
        let rule = TraversalRule::dependents().kinds(ReferenceKinds::ALL);

        let result = query::traverse(&store, &roots, &rule, &mut VisitBudget::new(limit)).unwrap();

        let unique: HashSet<_> = result.assets.iter().collect();
        prop_assert_eq!(unique.len(), result.assets.len());
        prop_assert!(result.assets.len() <= limit);
        if result.budget_exhausted {
            prop_assert!(result.truncated);
        }
    }

    #[test]
    fn applying_an_event_twice_changes_nothing_the_second_time(
        (n, edges) in arb_graph(),
        pick in any::<prop::sample::Index>(),
        op in 0u8..3,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let names: Vec<String> = (0..n).map(|i| format!("N{i}")).collect();
            let triples: Vec<(&str, &str, ReferenceKind)> = edges
                .iter()
                .map(|(s, t, hard)| (names[*s].as_str(), names[*t].as_str(), if *hard { Hard } else { Soft }))
                .collect();
            let extra: Vec<&str> = names.iter().map(String::as_str).collect();
            let catalogue = catalogue_with(&triples, &extra);
            let builder = scanned_builder(&catalogue).await;

            let target = id(&names[pick.index(n)]);
            let event = match op {
                0 => {
                    catalogue.put_asset(target.clone(), "Material", vec![(id("Fresh"), Hard)]);
                    CatalogueEvent::Resaved(target)
                }
                1 => {
                    catalogue.remove_asset(&target);
                    CatalogueEvent::Removed(target)
                }
                _ => {
                    let renamed = id("Renamed");
                    catalogue.rename_asset(&target, renamed.clone());
                    CatalogueEvent::Renamed { old: target, new: renamed }
                }
            };

            builder.apply_event(event.clone()).await;
            let (first, first_epoch) = {
                let store = builder.read().await;
                (snapshot(&store), store.epoch())
            };

            let changed = builder.apply_event(event).await;
            let store = builder.read().await;
            prop_assert!(!changed);
            prop_assert_eq!(snapshot(&store), first);
            prop_assert_eq!(store.epoch(), first_epoch);
            Ok(())
        })?;
    }
}

// ============================================================================
// Epoch and cache
// ============================================================================

#[tokio::test]
async fn every_mutation_advances_the_epoch_and_invalidates_cached_results() {
    let catalogue = catalogue_with(&[("A", "B", Hard)], &[]);
    let graph = AssetGraph::start(catalogue.clone(), EngineConfig::default()).unwrap();
    graph.full_scan().await.unwrap();

    let rule = TraversalRule::dependencies();
    let before = graph.query(&[id("A")], &rule).await.unwrap();
    let epoch_before = graph.read().await.epoch();
    assert_eq!(before.epoch, epoch_before);
    assert_eq!(before.assets, vec![id("A"), id("B")]);

    catalogue.put_asset(id("A"), "Texture", vec![(id("B"), Hard), (id("C"), Soft)]);
    graph.flush().await.unwrap();

    let epoch_after = graph.read().await.epoch();
    assert!(epoch_after > epoch_before);

    let after = graph.query(&[id("A")], &rule).await.unwrap();
    assert_eq!(after.epoch, epoch_after);
    assert!(after.contains(&id("C")));

    let stats = graph.stats().await.unwrap();
    assert_eq!(stats.cache.hits, 0);
    assert_eq!(stats.cache.misses, 2);

    graph.shutdown().await.unwrap();
}

#[tokio::test]
async fn no_op_resave_keeps_the_epoch_and_the_cache_entry() {
    let catalogue = catalogue_with(&[("A", "B", Hard)], &[]);
    let graph = AssetGraph::start(catalogue.clone(), EngineConfig::default()).unwrap();
    graph.full_scan().await.unwrap();

    let rule = TraversalRule::dependencies();
    let first = graph.query(&[id("A")], &rule).await.unwrap();

    catalogue.put_asset(id("A"), "Texture", vec![(id("B"), Hard)]);
    graph.flush().await.unwrap();

    let second = graph.query(&[id("A")], &rule).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(graph.stats().await.unwrap().cache.hits, 1);

    graph.shutdown().await.unwrap();
}

// ============================================================================
// Cycles
// ============================================================================

#[rstest]
#[case::root_on_cycle("A")]
#[case::cycle_downstream("Entry")]
#[tokio::test]
async fn three_cycle_is_reported_with_exactly_its_members(#[case] root: &str) {
    let catalogue = catalogue_with(
        &[
            ("Entry", "A", Hard),
            ("A", "B", Hard),
            ("B", "C", Soft),
            ("C", "A", Hard),
        ],
        &[],
    );
    let builder = scanned_builder(&catalogue).await;
    let store = builder.read().await;

    let lookup = query::find_cycle(
        &store,
        &id(root),
        ReferenceKinds::default(),
        &mut VisitBudget::new(100),
    );

    let CycleLookup::Found(witness) = lookup else {
        panic!("expected a cycle, got {lookup:?}");
    };
    let members: HashSet<_> = witness.assets().iter().cloned().collect();
    assert_eq!(members, HashSet::from([id("A"), id("B"), id("C")]));
    assert_eq!(witness.edges().len(), 3);
}

#[tokio::test]
async fn acyclic_chain_reports_no_cycle() {
    let catalogue = catalogue_with(&[("A", "B", Hard), ("B", "C", Hard)], &[]);
    let builder = scanned_builder(&catalogue).await;
    let store = builder.read().await;

    let lookup = query::find_cycle(
        &store,
        &id("A"),
        ReferenceKinds::ALL,
        &mut VisitBudget::new(100),
    );
    assert_eq!(lookup, CycleLookup::Acyclic);
    let scan = query::all_cycles(&store, ReferenceKinds::ALL, &mut VisitBudget::new(100));
    assert_eq!(scan.groups(), Some(&[][..]));
}

// ============================================================================
// Dangling references
// ============================================================================

#[tokio::test]
async fn removed_target_stays_as_missing_node_with_its_dependents() {
    let catalogue = catalogue_with(&[("A", "B", Hard)], &[]);
    let builder = scanned_builder(&catalogue).await;

    catalogue.remove_asset(&id("B"));
    assert!(builder.apply_event(CatalogueEvent::Removed(id("B"))).await);

    let store = builder.read().await;
    let node = store.node(&id("B")).expect("dangling target kept");
    assert!(!node.exists);
    assert!(store.contains_edge(&id("A"), &id("B"), Hard));

    let dependents = query::traverse(
        &store,
        &[id("B")],
        &TraversalRule::dependents(),
        &mut VisitBudget::new(100),
    )
    .unwrap();
    assert!(dependents.contains(&id("A")));

    let dependencies = query::traverse(
        &store,
        &[id("A")],
        &TraversalRule::dependencies(),
        &mut VisitBudget::new(100),
    )
    .unwrap();
    assert_eq!(dependencies.missing, vec![id("B")]);
}

// ============================================================================
// Depth truncation
// ============================================================================

#[rstest]
#[case::limited(Some(2), &["A", "B", "C"], true)]
#[case::exact_fit(Some(3), &["A", "B", "C", "D"], false)]
#[case::unlimited(None, &["A", "B", "C", "D"], false)]
#[tokio::test]
async fn depth_limit_truncates_chain(
    #[case] depth: Option<u32>,
    #[case] expected: &[&str],
    #[case] truncated: bool,
) {
    let catalogue = catalogue_with(
        &[("A", "B", Hard), ("B", "C", Hard), ("C", "D", Hard)],
        &[],
    );
    let builder = scanned_builder(&catalogue).await;
    let store = builder.read().await;

    let mut rule = TraversalRule::dependencies();
    if let Some(depth) = depth {
        rule = rule.max_depth(depth);
    }
    let result = query::traverse(&store, &[id("A")], &rule, &mut VisitBudget::new(100)).unwrap();

    let expected: Vec<_> = expected.iter().map(|name| id(name)).collect();
    assert_eq!(result.assets, expected);
    assert_eq!(result.truncated, truncated);
}

// ============================================================================
// Rename
// ============================================================================

#[tokio::test]
async fn rename_moves_every_edge_to_the_new_identity() {
    let catalogue = catalogue_with(
        &[("A", "B", Hard), ("B", "C", Soft), ("D", "B", Soft)],
        &[],
    );
    let graph = AssetGraph::start(catalogue.clone(), EngineConfig::default()).unwrap();
    graph.full_scan().await.unwrap();

    let rule = TraversalRule::dependencies();
    let before = graph.query(&[id("A")], &rule).await.unwrap();
    assert_eq!(before.assets, vec![id("A"), id("B"), id("C")]);

    assert!(catalogue.rename_asset(&id("B"), id("B2")));
    graph.flush().await.unwrap();

    let after = graph.query(&[id("A")], &rule).await.unwrap();
    assert_eq!(after.assets, vec![id("A"), id("B2"), id("C")]);

    let store = graph.read().await;
    assert!(!store.contains_node(&id("B")));
    assert!(store.contains_edge(&id("A"), &id("B2"), Hard));
    assert!(store.contains_edge(&id("B2"), &id("C"), Soft));
    assert!(store.contains_edge(&id("D"), &id("B2"), Soft));
    drop(store);

    graph.shutdown().await.unwrap();
}

#[tokio::test]
async fn rename_of_unscanned_asset_behaves_like_an_add() {
    let catalogue = Arc::new(InMemoryCatalogue::new());
    let builder = scanned_builder(&catalogue).await;

    catalogue.seed_asset(id("New"), "Texture", true, vec![(id("Leaf"), Hard)]);
    let changed = builder
        .apply_event(CatalogueEvent::Renamed {
            old: id("Old"),
            new: id("New"),
        })
        .await;

    assert!(changed);
    let store = builder.read().await;
    assert!(store.contains_edge(&id("New"), &id("Leaf"), Hard));
    assert!(!store.contains_node(&id("Old")));
}
