//! Incremental builder: catalogue changes in, minimal graph deltas out.
//!
//! The builder is the only component that mutates the [`GraphStore`]. For
//! every change it fetches from the catalogue first, without holding any lock,
//! then applies the resulting delta under a single write-lock acquisition, so
//! queries observe each change atomically.
//!
//! | Change | Effect on the graph |
//! |--------|---------------------|
//! | Refresh (added / re-saved) | Update metadata, add and remove only the edges that differ |
//! | Remove | Drop outgoing edges; keep the node as missing while anything still references it |
//! | Rename | Move the node and all its edges to the new identity, then refresh it |
//!
//! A catalogue failure never reaches a query. The node is marked stale and
//! keeps its last known edges until [`IncrementalBuilder::retry_stale`] (run
//! by the worker on a timer) succeeds.

mod queue;
mod worker;

pub use queue::{Change, ChangeQueue};
pub use worker::{BuilderHandle, spawn};

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};

use crate::catalogue::{Catalogue, CatalogueEvent};
use crate::domain::{AssetDescription, AssetId, ReferenceKind};
use crate::error::{CatalogueError, Result};
use crate::store::{GraphStore, SharedStore};

/// What a single refresh did to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The graph already matched the catalogue
    Unchanged,
    /// Metadata or edges were updated
    Updated,
    /// The fetch failed; the node was marked stale
    Stale,
    /// The catalogue no longer knows the asset; it was removed
    Gone,
}

/// Summary of a full catalogue scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScanReport {
    /// Assets listed by the catalogue
    pub listed: usize,
    /// Assets whose node or edges changed
    pub updated: usize,
    /// Assets already up to date
    pub unchanged: usize,
    /// Assets that could not be fetched and are now stale
    pub stale: usize,
    /// Graph assets no longer in the catalogue
    pub removed: usize,
    /// Graph epoch after the scan
    pub epoch: u64,
}

struct Fetched {
    description: AssetDescription,
    references: BTreeSet<(AssetId, ReferenceKind)>,
}

enum Fetch {
    Ok(Fetched),
    Gone,
    Failed(CatalogueError),
}

/// Reference targets the graph had never seen, as the catalogue knows them.
#[derive(Default)]
struct TargetDescriptions {
    described: HashMap<AssetId, AssetDescription>,
    /// Targets whose describe failed; they become stale placeholders.
    failed: Vec<AssetId>,
}

/// Applies catalogue changes to the graph store it owns.
///
/// The catalogue is injected at construction; nothing here reaches for global
/// state. The store is created by the builder and never handed out for
/// writing, so the builder is its only writer.
pub struct IncrementalBuilder {
    catalogue: Arc<dyn Catalogue>,
    store: SharedStore,
}

impl IncrementalBuilder {
    /// Create a builder over an empty graph.
    pub fn new(catalogue: Arc<dyn Catalogue>) -> Self {
        Self {
            catalogue,
            store: Arc::new(RwLock::new(GraphStore::new())),
        }
    }

    /// Read access to the graph this builder maintains.
    pub async fn read(&self) -> RwLockReadGuard<'_, GraphStore> {
        self.store.read().await
    }

    /// Shared handle for readers inside the crate (the query engine).
    pub(crate) fn shared(&self) -> SharedStore {
        Arc::clone(&self.store)
    }

    /// The catalogue this builder reads from.
    #[must_use]
    pub fn catalogue(&self) -> &Arc<dyn Catalogue> {
        &self.catalogue
    }

    /// Apply one catalogue event directly, bypassing the change queue.
    pub async fn apply_event(&self, event: CatalogueEvent) -> bool {
        let change = match event {
            CatalogueEvent::Added(id) | CatalogueEvent::Resaved(id) => Change::Refresh(id),
            CatalogueEvent::Removed(id) => Change::Remove(id),
            CatalogueEvent::Renamed { old, new } => Change::Rename { old, new },
        };
        self.apply(change).await
    }

    /// Apply one queued change. Returns `true` if the graph changed.
    pub async fn apply(&self, change: Change) -> bool {
        tracing::debug!(?change, "Applying change");
        match change {
            Change::Refresh(id) => matches!(
                self.refresh(&id).await,
                RefreshOutcome::Updated | RefreshOutcome::Gone
            ),
            Change::Remove(id) => self.remove(&id).await,
            Change::Rename { old, new } => self.rename(&old, &new).await,
        }
    }

    /// Re-fetch an asset and bring its node and outgoing edges in line with the
    /// catalogue, touching only the edges that differ.
    pub async fn refresh(&self, id: &AssetId) -> RefreshOutcome {
        let fetched = match self.fetch(id).await {
            Fetch::Ok(fetched) => fetched,
            Fetch::Gone => {
                return if self.remove(id).await {
                    RefreshOutcome::Gone
                } else {
                    RefreshOutcome::Unchanged
                };
            }
            Fetch::Failed(e) => {
                tracing::warn!(asset = %id, error = %e, "Catalogue fetch failed, marking stale");
                self.store.write().await.set_stale(id, true);
                return RefreshOutcome::Stale;
            }
        };

        let unknown_targets: Vec<AssetId> = {
            let store = self.store.read().await;
            fetched
                .references
                .iter()
                .map(|(target, _)| target)
                .filter(|target| *target != id && !store.contains_node(target))
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        };
        let target_descriptions = self.describe_targets(&unknown_targets).await;

        let mut store = self.store.write().await;
        let mut changed = store.upsert_node(
            id,
            Some(fetched.description.asset_type),
            fetched.description.exists,
        );

        for (target, description) in target_descriptions.described {
            // Another change may have created the node meanwhile; it wins.
            if !store.contains_node(&target) {
                changed |= store.upsert_node(
                    &target,
                    Some(description.asset_type),
                    description.exists,
                );
            }
        }
        for target in &target_descriptions.failed {
            if !store.contains_node(target) {
                changed |= store.set_stale(target, true);
            }
        }

        let current = store.outgoing_references(id);
        let mut dropped_targets = HashSet::new();
        for (target, kind) in current.difference(&fetched.references) {
            changed |= store.remove_edge(id, target, *kind);
            dropped_targets.insert(target.clone());
        }
        for (target, kind) in fetched.references.difference(&current) {
            changed |= store.upsert_edge(id, target, *kind);
        }
        for target in &dropped_targets {
            changed |= prune_orphan(&mut store, target);
        }

        if changed {
            tracing::debug!(asset = %id, epoch = store.epoch(), "Asset refreshed");
            RefreshOutcome::Updated
        } else {
            RefreshOutcome::Unchanged
        }
    }

    /// Apply a removal.
    ///
    /// The asset's own references go away with it. Its node stays behind as a
    /// missing placeholder while other assets still reference it, so dangling
    /// references remain visible; otherwise it is deleted.
    pub async fn remove(&self, id: &AssetId) -> bool {
        let mut store = self.store.write().await;
        let Some(node) = store.node(id) else {
            return false;
        };
        let asset_type = node.asset_type.clone();

        let mut changed = false;
        let outgoing = store.outgoing_references(id);
        for (target, kind) in &outgoing {
            changed |= store.remove_edge(id, target, *kind);
        }
        for (target, _) in &outgoing {
            if target != id {
                changed |= prune_orphan(&mut store, target);
            }
        }

        if store.in_degree(id) > 0 {
            changed |= store.upsert_node(id, asset_type, false);
        } else {
            changed |= store.remove_node(id);
        }

        tracing::debug!(asset = %id, changed, "Asset removed");
        changed
    }

    /// Apply an atomic rename.
    ///
    /// Edges touching `old` are moved to `new` in one step, so every query sees
    /// either the old or the new identity with all its edges. When `new` is
    /// already a real asset in the graph, the move is treated as remove + add.
    pub async fn rename(&self, old: &AssetId, new: &AssetId) -> bool {
        let moved = {
            let mut store = self.store.write().await;
            let new_is_real = store.node(new).is_some_and(|node| node.exists);
            if store.contains_node(old) && !new_is_real {
                store.rename_node(old, new)
            } else {
                false
            }
        };

        if moved {
            tracing::debug!(old = %old, new = %new, "Asset renamed");
            self.refresh(new).await;
            return true;
        }

        let removed = self.remove(old).await;
        let refreshed = self.refresh(new).await;
        removed || matches!(refreshed, RefreshOutcome::Updated | RefreshOutcome::Gone)
    }

    /// Retry every stale node. Returns how many recovered.
    pub async fn retry_stale(&self) -> usize {
        let stale = self.store.read().await.stale_assets();
        if stale.is_empty() {
            return 0;
        }

        let mut recovered = 0;
        for id in &stale {
            if self.refresh(id).await != RefreshOutcome::Stale {
                recovered += 1;
            }
        }
        tracing::info!(stale = stale.len(), recovered, "Retried stale assets");
        recovered
    }

    /// Refresh every asset the catalogue lists and remove graph assets it no
    /// longer lists.
    ///
    /// # Errors
    ///
    /// Returns `Error::Catalogue` if the catalogue cannot list its assets.
    /// Failures for individual assets only mark them stale.
    pub async fn full_scan(&self) -> Result<ScanReport> {
        let listed = self.catalogue.list_assets().await?;
        let mut report = ScanReport {
            listed: listed.len(),
            ..ScanReport::default()
        };

        for id in &listed {
            match self.refresh(id).await {
                RefreshOutcome::Updated => report.updated += 1,
                RefreshOutcome::Unchanged => report.unchanged += 1,
                RefreshOutcome::Stale => report.stale += 1,
                RefreshOutcome::Gone => report.removed += 1,
            }
        }

        let listed: HashSet<&AssetId> = listed.iter().collect();
        let vanished: Vec<AssetId> = {
            let store = self.store.read().await;
            store
                .asset_ids()
                .into_iter()
                .filter(|id| !listed.contains(id))
                .filter(|id| store.node(id).is_some_and(|node| node.exists))
                .collect()
        };
        for id in &vanished {
            if self.remove(id).await {
                report.removed += 1;
            }
        }

        report.epoch = self.store.read().await.epoch();
        tracing::info!(
            listed = report.listed,
            updated = report.updated,
            stale = report.stale,
            removed = report.removed,
            epoch = report.epoch,
            "Full scan complete"
        );
        Ok(report)
    }

    async fn fetch(&self, id: &AssetId) -> Fetch {
        let description = match self.catalogue.describe_asset(id).await {
            Ok(description) => description,
            Err(CatalogueError::UnknownAsset(_)) => return Fetch::Gone,
            Err(e) => return Fetch::Failed(e),
        };
        match self.catalogue.list_direct_references(id).await {
            Ok(references) => Fetch::Ok(Fetched {
                description,
                references: references.into_iter().collect(),
            }),
            Err(CatalogueError::UnknownAsset(_)) => Fetch::Gone,
            Err(e) => Fetch::Failed(e),
        }
    }

    /// Describe reference targets the graph has never seen. Targets unknown to
    /// the catalogue become missing placeholders; targets whose describe fails
    /// become stale placeholders, retried like any other stale node.
    async fn describe_targets(&self, targets: &[AssetId]) -> TargetDescriptions {
        let mut descriptions = TargetDescriptions::default();
        for target in targets {
            match self.catalogue.describe_asset(target).await {
                Ok(description) => {
                    descriptions.described.insert(target.clone(), description);
                }
                Err(CatalogueError::UnknownAsset(_)) => {}
                Err(e) => {
                    tracing::warn!(asset = %target, error = %e, "Target describe failed, marking stale");
                    descriptions.failed.push(target.clone());
                }
            }
        }
        descriptions
    }
}

/// Delete a placeholder nothing points at any more.
fn prune_orphan(store: &mut GraphStore, id: &AssetId) -> bool {
    let orphan = store.node(id).is_some_and(|node| !node.exists)
        && store.in_degree(id) == 0
        && store.out_degree(id) == 0;
    orphan && store.remove_node(id)
}
