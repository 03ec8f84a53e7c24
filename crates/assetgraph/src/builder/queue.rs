//! FIFO of pending graph changes with per-asset coalescing.

use std::collections::{HashMap, VecDeque};

use crate::catalogue::CatalogueEvent;
use crate::domain::AssetId;

/// A unit of builder work derived from one or more catalogue events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Re-fetch the asset and diff its references
    Refresh(AssetId),
    /// The asset is gone
    Remove(AssetId),
    /// The asset moved; edges follow it
    Rename {
        /// Identity before the move
        old: AssetId,
        /// Identity after the move
        new: AssetId,
    },
}

/// Pending changes in arrival order.
///
/// Added, Resaved and Removed events for an asset that already has a queued
/// slot update that slot in place (the latest event decides whether it is a
/// refresh or a removal), so a burst of saves costs one re-fetch. Renames are
/// barriers: they are never merged, and events arriving after a rename get
/// fresh slots behind it.
#[derive(Debug, Default)]
pub struct ChangeQueue {
    slots: VecDeque<Change>,
    /// Sequence number of `slots[0]`
    head: u64,
    /// Asset -> sequence number of its open (mergeable) slot
    open: HashMap<AssetId, u64>,
    coalesced: u64,
}

impl ChangeQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an event, merging it into an open slot when possible.
    pub fn push(&mut self, event: CatalogueEvent) {
        let (id, change) = match event {
            CatalogueEvent::Added(id) | CatalogueEvent::Resaved(id) => {
                (id.clone(), Change::Refresh(id))
            }
            CatalogueEvent::Removed(id) => (id.clone(), Change::Remove(id)),
            CatalogueEvent::Renamed { old, new } => {
                self.open.remove(&old);
                self.open.remove(&new);
                self.slots.push_back(Change::Rename { old, new });
                return;
            }
        };

        if let Some(&seq) = self.open.get(&id) {
            if let Some(slot) = usize::try_from(seq - self.head)
                .ok()
                .and_then(|i| self.slots.get_mut(i))
            {
                *slot = change;
                self.coalesced += 1;
                return;
            }
        }

        let seq = self.head + self.slots.len() as u64;
        self.open.insert(id, seq);
        self.slots.push_back(change);
    }

    /// Take the oldest pending change.
    pub fn pop(&mut self) -> Option<Change> {
        let change = self.slots.pop_front()?;
        let seq = self.head;
        self.head += 1;

        if let Change::Refresh(id) | Change::Remove(id) = &change {
            if self.open.get(id) == Some(&seq) {
                self.open.remove(id);
            }
        }
        Some(change)
    }

    /// Number of pending changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Events absorbed into an existing slot since creation.
    #[must_use]
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }
}
