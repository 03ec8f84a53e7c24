//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use assetgraph::builder::IncrementalBuilder;
use assetgraph::catalogue::InMemoryCatalogue;
use assetgraph::domain::{AssetId, ReferenceKind};
use assetgraph::store::GraphStore;

/// Asset `/Game/<name>.<name>`.
pub fn id(name: &str) -> AssetId {
    AssetId::new(format!("/Game/{name}"), name)
}

/// Seed a catalogue with `Texture` assets wired by `(source, target, kind)`.
///
/// Every name appearing anywhere in `edges` or `extra` exists in the catalogue.
pub fn catalogue_with(
    edges: &[(&str, &str, ReferenceKind)],
    extra: &[&str],
) -> Arc<InMemoryCatalogue> {
    let catalogue = Arc::new(InMemoryCatalogue::new());
    let mut names: Vec<&str> = edges
        .iter()
        .flat_map(|(source, target, _)| [*source, *target])
        .chain(extra.iter().copied())
        .collect();
    names.sort_unstable();
    names.dedup();

    for name in names {
        let references = edges
            .iter()
            .filter(|(source, _, _)| *source == name)
            .map(|(_, target, kind)| (id(target), *kind))
            .collect();
        catalogue.seed_asset(id(name), "Texture", true, references);
    }
    catalogue
}

/// A builder over a fresh store, fully scanned from `catalogue`.
pub async fn scanned_builder(catalogue: &Arc<InMemoryCatalogue>) -> IncrementalBuilder {
    let builder = IncrementalBuilder::new(catalogue.clone());
    builder
        .full_scan()
        .await
        .expect("full scan of in-memory catalogue");
    builder
}

/// Observable contents of a store: node state and the edge set, ignoring
/// per-node generations.
pub fn snapshot(store: &GraphStore) -> (Vec<(AssetId, Option<String>, bool, bool)>, Vec<String>) {
    let nodes = store
        .asset_ids()
        .into_iter()
        .filter_map(|id| store.node(&id).cloned())
        .map(|node| (node.id, node.asset_type, node.exists, node.stale))
        .collect();
    let edges = store.edges().iter().map(ToString::to_string).collect();
    (nodes, edges)
}
