//! Integration tests for the running engine.
//!
//! These tests start an [`AssetGraph`] over an in-memory catalogue or a JSONL
//! manifest and observe how catalogue changes flow through the builder worker
//! into query results.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use assetgraph::catalogue::{InMemoryCatalogue, ManifestWarning, load_manifest};
use assetgraph::domain::{ReferenceKind, ReferenceKinds};
use assetgraph::query::{CancelToken, HealthStatus, PathLookup, TraversalRule};
use assetgraph::{AssetGraph, EngineConfig, Error};
use rstest::{fixture, rstest};
use tempfile::{NamedTempFile, TempDir};

mod common;
use common::{catalogue_with, id, scanned_builder};

use ReferenceKind::{Hard, Soft};

// ============================================================================
// Test Fixtures
// ============================================================================

/// A level whose material chain ends in a soft reference to a texture.
#[fixture]
fn level_catalogue() -> Arc<InMemoryCatalogue> {
    catalogue_with(
        &[
            ("Level", "Mesh", Hard),
            ("Mesh", "Material", Hard),
            ("Material", "Texture", Soft),
            ("Level", "Music", Soft),
        ],
        &["Unused"],
    )
}

async fn started(catalogue: &Arc<InMemoryCatalogue>, config: EngineConfig) -> AssetGraph {
    let graph = AssetGraph::start(catalogue.clone(), config).expect("engine starts");
    graph.full_scan().await.expect("initial scan");
    graph
}

// ============================================================================
// Change propagation
// ============================================================================

#[rstest]
#[tokio::test]
async fn burst_of_events_for_one_asset_settles_on_the_last(level_catalogue: Arc<InMemoryCatalogue>) {
    let graph = started(&level_catalogue, EngineConfig::default()).await;

    level_catalogue.put_asset(id("Mesh"), "StaticMesh", vec![(id("Extra"), Hard)]);
    level_catalogue.put_asset(id("Mesh"), "StaticMesh", vec![]);
    level_catalogue.put_asset(
        id("Mesh"),
        "StaticMesh",
        vec![(id("Material"), Hard), (id("Texture"), Hard)],
    );
    graph.flush().await.unwrap();

    let store = graph.read().await;
    assert!(store.contains_edge(&id("Mesh"), &id("Texture"), Hard));
    assert!(store.contains_edge(&id("Mesh"), &id("Material"), Hard));
    assert!(!store.contains_node(&id("Extra")));
    assert_eq!(store.node(&id("Mesh")).unwrap().asset_type.as_deref(), Some("StaticMesh"));
    drop(store);

    graph.shutdown().await.unwrap();
}

#[rstest]
#[tokio::test]
async fn removal_then_readd_restores_the_asset(level_catalogue: Arc<InMemoryCatalogue>) {
    let graph = started(&level_catalogue, EngineConfig::default()).await;

    level_catalogue.remove_asset(&id("Material"));
    graph.flush().await.unwrap();
    let node = graph.node(&id("Material")).await.expect("still referenced by Mesh");
    assert!(!node.exists);

    level_catalogue.put_asset(id("Material"), "Material", vec![(id("Texture"), Soft)]);
    graph.flush().await.unwrap();

    let node = graph.node(&id("Material")).await.unwrap();
    assert!(node.exists);
    let deps = graph
        .query(&[id("Level")], &TraversalRule::dependencies())
        .await
        .unwrap();
    assert!(deps.contains(&id("Texture")));
    assert!(deps.missing.is_empty());

    graph.shutdown().await.unwrap();
}

#[rstest]
#[tokio::test]
async fn unreferenced_removed_asset_disappears(level_catalogue: Arc<InMemoryCatalogue>) {
    let graph = started(&level_catalogue, EngineConfig::default()).await;

    level_catalogue.remove_asset(&id("Unused"));
    graph.flush().await.unwrap();

    assert!(graph.node(&id("Unused")).await.is_none());
    graph.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_leaves_stale_node_until_retry_succeeds() {
    let catalogue = catalogue_with(&[("A", "B", Hard)], &[]);
    let config = EngineConfig {
        retry_interval_ms: 200,
        ..EngineConfig::default()
    };
    let graph = started(&catalogue, config).await;

    catalogue.fail_next(&id("A"), 1);
    catalogue.put_asset(id("A"), "Texture", vec![(id("C"), Hard)]);
    graph.flush().await.unwrap();

    // Last known edges survive while the asset is stale.
    let node = graph.node(&id("A")).await.unwrap();
    assert!(node.stale);
    let health = graph.assess_health(&id("A"), ReferenceKinds::ALL).await.unwrap();
    assert_eq!(health.stale, vec![id("A")]);
    assert!(graph.read().await.contains_edge(&id("A"), &id("B"), Hard));

    tokio::time::sleep(Duration::from_millis(300)).await;
    graph.flush().await.unwrap();

    let store = graph.read().await;
    assert!(!store.node(&id("A")).unwrap().stale);
    assert!(store.contains_edge(&id("A"), &id("C"), Hard));
    assert!(!store.contains_edge(&id("A"), &id("B"), Hard));
    drop(store);

    graph.shutdown().await.unwrap();
}

#[tokio::test]
async fn full_scan_removes_assets_the_catalogue_no_longer_lists() {
    let before = catalogue_with(&[("A", "B", Hard)], &["Lonely"]);
    let builder = scanned_builder(&before).await;
    assert!(builder.read().await.contains_node(&id("Lonely")));

    // The catalogue loses an asset without telling anyone.
    assert!(before.forget_asset(&id("Lonely")));
    let report = builder.full_scan().await.unwrap();

    assert_eq!(report.listed, 2);
    assert_eq!(report.removed, 1);
    assert_eq!(report.unchanged, 2);
    let store = builder.read().await;
    assert!(!store.contains_node(&id("Lonely")));
    assert!(store.contains_edge(&id("A"), &id("B"), Hard));
}

// ============================================================================
// Queries through the engine
// ============================================================================

#[rstest]
#[case::hard_only(ReferenceKinds::HARD, HealthStatus::Valid)]
#[case::hard_and_soft(ReferenceKinds::default(), HealthStatus::ValidWithSoftReferenceIssue)]
#[tokio::test]
async fn health_depends_on_followed_kinds(
    level_catalogue: Arc<InMemoryCatalogue>,
    #[case] kinds: ReferenceKinds,
    #[case] expected: HealthStatus,
) {
    let graph = started(&level_catalogue, EngineConfig::default()).await;
    level_catalogue.remove_asset(&id("Texture"));
    graph.flush().await.unwrap();

    let health = graph.assess_health(&id("Level"), kinds).await.unwrap();
    assert_eq!(health.status, expected);

    graph.shutdown().await.unwrap();
}

#[rstest]
#[tokio::test]
async fn missing_hard_dependency_makes_the_root_invalid(level_catalogue: Arc<InMemoryCatalogue>) {
    let graph = started(&level_catalogue, EngineConfig::default()).await;
    level_catalogue.remove_asset(&id("Material"));
    graph.flush().await.unwrap();

    let health = graph
        .assess_health(&id("Level"), ReferenceKinds::default())
        .await
        .unwrap();
    assert_eq!(health.status, HealthStatus::Invalid);
    assert_eq!(health.missing_hard, vec![id("Material")]);

    let gone = graph
        .assess_health(&id("Material"), ReferenceKinds::default())
        .await
        .unwrap();
    assert_eq!(gone.status, HealthStatus::Missing);

    graph.shutdown().await.unwrap();
}

#[rstest]
#[tokio::test]
async fn shortest_path_follows_only_requested_kinds(level_catalogue: Arc<InMemoryCatalogue>) {
    let graph = started(&level_catalogue, EngineConfig::default()).await;

    let lookup = graph
        .shortest_path(&id("Level"), &id("Texture"), ReferenceKinds::default())
        .await;
    let path = lookup.path().expect("path through the material");
    assert_eq!(path.hops(), 3);
    assert_eq!(
        path.assets(),
        &[id("Level"), id("Mesh"), id("Material"), id("Texture")]
    );

    let hard_only = graph
        .shortest_path(&id("Level"), &id("Texture"), ReferenceKinds::HARD)
        .await;
    assert_eq!(hard_only, PathLookup::NoPath);

    graph.shutdown().await.unwrap();
}

#[rstest]
#[tokio::test]
async fn cancelled_query_reports_partial_result(level_catalogue: Arc<InMemoryCatalogue>) {
    let graph = started(&level_catalogue, EngineConfig::default()).await;

    let token = CancelToken::new();
    token.cancel();
    let result = graph
        .query_cancellable(&[id("Level")], &TraversalRule::dependencies(), token)
        .await
        .unwrap();
    assert!(result.cancelled);
    assert!(result.len() <= 1);

    graph.shutdown().await.unwrap();
}

#[test]
fn negative_depth_is_an_invalid_request() {
    let result = TraversalRule::dependencies().signed_depth(-1);
    assert!(matches!(result, Err(Error::InvalidRequest(_))));
}

#[tokio::test]
async fn engine_wide_visit_budget_bounds_queries() {
    let edges: Vec<(String, String)> = (0..50)
        .map(|i| (format!("N{i}"), format!("N{}", i + 1)))
        .collect();
    let triples: Vec<(&str, &str, ReferenceKind)> = edges
        .iter()
        .map(|(s, t)| (s.as_str(), t.as_str(), Hard))
        .collect();
    let catalogue = catalogue_with(&triples, &[]);
    let config = EngineConfig {
        visit_budget: 10,
        ..EngineConfig::default()
    };
    let graph = started(&catalogue, config).await;

    let result = graph
        .query(&[id("N0")], &TraversalRule::dependencies())
        .await
        .unwrap();
    assert_eq!(result.len(), 10);
    assert!(result.budget_exhausted);
    assert!(result.truncated);

    graph.shutdown().await.unwrap();
}

// ============================================================================
// Manifest and configuration files
// ============================================================================

#[tokio::test]
async fn manifest_backed_engine_answers_queries_despite_bad_lines() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{"package":"/Game/Level","name":"Level","type":"World","references":[{{"package":"/Game/Mesh","name":"Mesh"}}]}}"#
    )
    .unwrap();
    writeln!(file, "not json").unwrap();
    writeln!(
        file,
        r#"{{"package":"/Game/Mesh","name":"Mesh","type":"StaticMesh","references":[{{"package":"/Script/Engine","name":"Cube","kind":"soft"}}]}}"#
    )
    .unwrap();
    writeln!(
        file,
        r#"{{"package":"/Game/Mesh","name":"Mesh","type":"StaticMesh"}}"#
    )
    .unwrap();
    file.flush().unwrap();

    let (catalogue, warnings) = load_manifest(file.path()).await.unwrap();
    assert_eq!(warnings.len(), 2);
    assert!(matches!(warnings[0], ManifestWarning::MalformedJson { line_number: 2, .. }));
    assert!(matches!(warnings[1], ManifestWarning::DuplicateAsset { line_number: 4, .. }));

    let graph = AssetGraph::start(Arc::new(catalogue), EngineConfig::default()).unwrap();
    let report = graph.full_scan().await.unwrap();
    assert_eq!(report.listed, 2);

    let level = id("Level");
    let all = graph
        .query(&[level.clone()], &TraversalRule::dependencies())
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let no_native = graph
        .query(&[level], &TraversalRule::dependencies().exclude_native(true))
        .await
        .unwrap();
    assert_eq!(no_native.assets, vec![id("Level"), id("Mesh")]);

    graph.shutdown().await.unwrap();
}

#[tokio::test]
async fn config_file_round_trips_and_disables_cache() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("assetgraph.yaml");
    let config = EngineConfig {
        cache_capacity: 0,
        default_max_depth: Some(4),
        ..EngineConfig::default()
    };
    config.save(&path).await.unwrap();

    let loaded = EngineConfig::load(&path).await.unwrap();
    assert_eq!(loaded, config);

    let catalogue = catalogue_with(&[("A", "B", Hard)], &[]);
    let graph = started(&catalogue, loaded).await;
    let rule = TraversalRule::dependencies();
    graph.query(&[id("A")], &rule).await.unwrap();
    graph.query(&[id("A")], &rule).await.unwrap();

    let stats = graph.stats().await.unwrap();
    assert_eq!(stats.cache.hits, 0);
    assert_eq!(stats.cache.entries, 0);

    graph.shutdown().await.unwrap();
}

#[tokio::test]
async fn invalid_config_file_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("assetgraph.yaml");
    tokio::fs::write(&path, "visit-budget: 0\n").await.unwrap();

    let result = EngineConfig::load(&path).await;
    assert!(matches!(result, Err(Error::Config(_))));
}
