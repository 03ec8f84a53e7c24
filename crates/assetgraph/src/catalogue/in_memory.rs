//! Mutable in-memory catalogue.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{Catalogue, CatalogueEvent, EventSink};
use crate::domain::{AssetDescription, AssetId, ReferenceKind};
use crate::error::CatalogueError;

#[derive(Debug, Clone)]
struct AssetRecord {
    asset_type: String,
    exists: bool,
    references: Vec<(AssetId, ReferenceKind)>,
}

#[derive(Debug, Default)]
struct Inner {
    assets: BTreeMap<AssetId, AssetRecord>,
    failures: HashMap<AssetId, usize>,
    subscribers: Vec<EventSink>,
}

/// Catalogue held entirely in memory.
///
/// Every mutation notifies subscribers the way a live asset registry would:
/// `put_asset` emits `Added` or `Resaved`, `remove_asset` emits `Removed`,
/// `rename_asset` emits an atomic `Renamed`. `fail_next` scripts transient
/// fetch failures for an asset.
#[derive(Debug, Default)]
pub struct InMemoryCatalogue {
    inner: Mutex<Inner>,
}

impl InMemoryCatalogue {
    /// Create an empty catalogue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace an asset and notify subscribers.
    pub fn put_asset(
        &self,
        id: AssetId,
        asset_type: impl Into<String>,
        references: Vec<(AssetId, ReferenceKind)>,
    ) {
        let mut inner = self.lock();
        let existed = inner.assets.contains_key(&id);
        inner.assets.insert(
            id.clone(),
            AssetRecord {
                asset_type: asset_type.into(),
                exists: true,
                references,
            },
        );

        let event = if existed {
            CatalogueEvent::Resaved(id)
        } else {
            CatalogueEvent::Added(id)
        };
        notify(&mut inner, &event);
    }

    /// Insert an asset without notifying anyone (initial population).
    pub fn seed_asset(
        &self,
        id: AssetId,
        asset_type: impl Into<String>,
        exists: bool,
        references: Vec<(AssetId, ReferenceKind)>,
    ) {
        self.lock().assets.insert(
            id,
            AssetRecord {
                asset_type: asset_type.into(),
                exists,
                references,
            },
        );
    }

    /// Delete an asset and notify subscribers.
    ///
    /// Returns `false` if the asset was unknown.
    pub fn remove_asset(&self, id: &AssetId) -> bool {
        let mut inner = self.lock();
        if inner.assets.remove(id).is_none() {
            return false;
        }
        notify(&mut inner, &CatalogueEvent::Removed(id.clone()));
        true
    }

    /// Remove an asset without notifying subscribers, as if the change was
    /// missed. Only a full scan will notice.
    pub fn forget_asset(&self, id: &AssetId) -> bool {
        self.lock().assets.remove(id).is_some()
    }

    /// Move an asset to a new identity, fixing up every reference to it, and
    /// notify subscribers with a single atomic `Renamed` event.
    ///
    /// Returns `false` if `old` was unknown.
    pub fn rename_asset(&self, old: &AssetId, new: AssetId) -> bool {
        let mut inner = self.lock();
        let Some(record) = inner.assets.remove(old) else {
            return false;
        };
        inner.assets.insert(new.clone(), record);

        for record in inner.assets.values_mut() {
            for (target, _) in &mut record.references {
                if target == old {
                    *target = new.clone();
                }
            }
        }

        notify(
            &mut inner,
            &CatalogueEvent::Renamed {
                old: old.clone(),
                new,
            },
        );
        true
    }

    /// Make the next `count` fetches for `id` fail as unavailable.
    pub fn fail_next(&self, id: &AssetId, count: usize) {
        self.lock().failures.insert(id.clone(), count);
    }

    /// Number of assets in the catalogue.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().assets.len()
    }

    /// Returns `true` if the catalogue holds no assets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().assets.is_empty()
    }

    fn check_failure(&self, id: &AssetId) -> Result<(), CatalogueError> {
        let mut inner = self.lock();
        if let Some(remaining) = inner.failures.get_mut(id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(CatalogueError::unavailable(id.clone(), "scripted failure"));
            }
            inner.failures.remove(id);
        }
        Ok(())
    }
}

fn notify(inner: &mut Inner, event: &CatalogueEvent) {
    inner
        .subscribers
        .retain(|sink| sink.send(event.clone()));
}

#[async_trait]
impl Catalogue for InMemoryCatalogue {
    async fn list_assets(&self) -> Result<Vec<AssetId>, CatalogueError> {
        Ok(self.lock().assets.keys().cloned().collect())
    }

    async fn list_direct_references(
        &self,
        id: &AssetId,
    ) -> Result<Vec<(AssetId, ReferenceKind)>, CatalogueError> {
        self.check_failure(id)?;
        self.lock()
            .assets
            .get(id)
            .map(|record| record.references.clone())
            .ok_or_else(|| CatalogueError::UnknownAsset(id.clone()))
    }

    async fn describe_asset(&self, id: &AssetId) -> Result<AssetDescription, CatalogueError> {
        self.check_failure(id)?;
        self.lock()
            .assets
            .get(id)
            .map(|record| AssetDescription {
                asset_type: record.asset_type.clone(),
                exists: record.exists,
            })
            .ok_or_else(|| CatalogueError::UnknownAsset(id.clone()))
    }

    fn subscribe(&self, sink: EventSink) {
        self.lock().subscribers.push(sink);
    }
}
