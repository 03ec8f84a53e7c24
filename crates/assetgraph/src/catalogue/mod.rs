//! Catalogue adapter boundary.
//!
//! The engine never owns asset data. It reads it through a [`Catalogue`]:
//! raw reference lists, asset metadata, and change notifications. Two
//! implementations ship with the crate:
//!
//! - [`InMemoryCatalogue`]: mutable, used by tests and as the backing store of
//!   the manifest loader
//! - [`manifest::load_manifest`]: JSONL manifest on disk, loaded into an
//!   `InMemoryCatalogue`
//!
//! Host applications implement the trait over their own asset registry and
//! inject it into [`crate::builder::IncrementalBuilder`].

mod in_memory;
pub mod manifest;

pub use in_memory::InMemoryCatalogue;
pub use manifest::{ManifestWarning, load_manifest};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{AssetDescription, AssetId, ReferenceKind};
use crate::error::CatalogueError;

/// Change notification delivered by a catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogueEvent {
    /// A new asset appeared
    Added(AssetId),
    /// An asset was deleted
    Removed(AssetId),
    /// An existing asset was saved again; its references may have changed
    Resaved(AssetId),
    /// An asset moved to a new identity, delivered atomically
    Renamed {
        /// Identity before the move
        old: AssetId,
        /// Identity after the move
        new: AssetId,
    },
}

impl CatalogueEvent {
    /// The asset the event is about (the new identity for renames).
    #[must_use]
    pub fn asset(&self) -> &AssetId {
        match self {
            Self::Added(id) | Self::Removed(id) | Self::Resaved(id) => id,
            Self::Renamed { new, .. } => new,
        }
    }
}

/// Receiving end handed to [`Catalogue::subscribe`].
///
/// Cloning is cheap; all clones feed the same builder queue.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<CatalogueEvent>,
}

impl EventSink {
    /// Create a sink and the receiver the builder worker drains.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CatalogueEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Deliver an event.
    ///
    /// Returns `false` if the builder has shut down.
    pub fn send(&self, event: CatalogueEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Returns `true` if the builder has shut down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Read-only view of an external asset registry.
///
/// Implementations must be `Send + Sync`; the builder worker calls them from
/// a tokio task.
#[async_trait]
pub trait Catalogue: Send + Sync {
    /// Every asset currently known to the catalogue.
    async fn list_assets(&self) -> Result<Vec<AssetId>, CatalogueError>;

    /// The asset's direct references as `(target, kind)` pairs.
    async fn list_direct_references(
        &self,
        id: &AssetId,
    ) -> Result<Vec<(AssetId, ReferenceKind)>, CatalogueError>;

    /// Type tag and on-disk state of the asset.
    async fn describe_asset(&self, id: &AssetId) -> Result<AssetDescription, CatalogueError>;

    /// Register a sink that receives every subsequent change event.
    fn subscribe(&self, sink: EventSink);
}
