//! In-memory graph store using petgraph.
//!
//! The store owns every [`AssetNode`] and every reference edge. It keeps:
//! - `petgraph::StableDiGraph` for forward and reverse adjacency (node
//!   indices stay valid across removals, so edges survive renames untouched)
//! - `HashMap<AssetId, NodeIndex>` for O(1) node lookup
//! - `HashMap<(NodeIndex, NodeIndex, ReferenceKind), EdgeIndex>` for O(1) edge
//!   existence checks
//!
//! ## Edge Direction
//!
//! Edges point from the referencing asset to the referenced asset. Parallel
//! edges between the same pair are allowed as long as their kinds differ.
//!
//! ## Epochs and Generations
//!
//! Every call that changes observable state increments the store epoch exactly
//! once, and bumps the generation of each node it touched. Calls that change
//! nothing (re-applying identical data, removing something absent) leave both
//! untouched.
//!
//! ## Placeholders
//!
//! An edge may only exist between two nodes. Adding an edge to an unknown
//! target creates a placeholder node (`exists == false`, no type) so that
//! dangling references stay visible.

use petgraph::Direction as PetDirection;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{AssetId, AssetNode, ReferenceEdge, ReferenceKind, ReferenceKinds};

/// Which way to follow reference edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Follow edges forward: what does this asset reference?
    #[default]
    Dependencies,
    /// Follow edges backward: what references this asset?
    Dependents,
}

impl Direction {
    fn as_petgraph(self) -> PetDirection {
        match self {
            Self::Dependencies => PetDirection::Outgoing,
            Self::Dependents => PetDirection::Incoming,
        }
    }
}

type EdgeKey = (NodeIndex, NodeIndex, ReferenceKind);

/// The store as shared between the builder worker (sole writer) and queries.
///
/// Never handed out: callers outside the crate only ever see read guards.
pub(crate) type SharedStore = Arc<RwLock<GraphStore>>;

/// Counts describing the current graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StoreStats {
    /// Number of asset nodes
    pub nodes: usize,
    /// Number of reference edges
    pub edges: usize,
    /// Nodes whose asset is missing on disk
    pub missing: usize,
    /// Nodes whose last catalogue fetch failed
    pub stale: usize,
    /// Current graph epoch
    pub epoch: u64,
}

/// The asset dependency graph (not thread-safe).
///
/// Shared between the builder and the query engine as
/// `Arc<RwLock<GraphStore>>`; see [`crate::engine`]. Only the builder mutates
/// a live store. [`GraphStore::from_parts`] builds a detached one, e.g. for
/// running queries over a fixed graph.
#[derive(Debug, Default)]
pub struct GraphStore {
    graph: StableDiGraph<AssetNode, ReferenceKind>,
    node_map: HashMap<AssetId, NodeIndex>,
    edge_map: HashMap<EdgeKey, EdgeIndex>,
    epoch: u64,
}

impl GraphStore {
    /// Create an empty store at epoch 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a detached store from described assets and reference edges.
    ///
    /// Listed assets exist with the given type. Edge endpoints that are not
    /// listed become missing placeholders.
    pub fn from_parts<A, E>(assets: A, edges: E) -> Self
    where
        A: IntoIterator<Item = (AssetId, String)>,
        E: IntoIterator<Item = ReferenceEdge>,
    {
        let mut store = Self::new();
        for (id, asset_type) in assets {
            store.upsert_node(&id, Some(asset_type), true);
        }
        for edge in edges {
            store.upsert_edge(&edge.source, &edge.target, edge.kind);
        }
        store
    }

    /// Current graph epoch. Strictly increases with every mutation.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns `true` if the asset has a node (present or placeholder).
    #[must_use]
    pub fn contains_node(&self, id: &AssetId) -> bool {
        self.node_map.contains_key(id)
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, id: &AssetId) -> Option<&AssetNode> {
        self.node_map.get(id).map(|&idx| &self.graph[idx])
    }

    /// Returns `true` if the exact edge exists.
    #[must_use]
    pub fn contains_edge(&self, source: &AssetId, target: &AssetId, kind: ReferenceKind) -> bool {
        match (self.node_map.get(source), self.node_map.get(target)) {
            (Some(&s), Some(&t)) => self.edge_map.contains_key(&(s, t, kind)),
            _ => false,
        }
    }

    /// All asset ids in ascending order.
    #[must_use]
    pub fn asset_ids(&self) -> Vec<AssetId> {
        let mut ids: Vec<AssetId> = self.node_map.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// All edges in ascending order.
    #[must_use]
    pub fn edges(&self) -> Vec<ReferenceEdge> {
        let mut edges: Vec<ReferenceEdge> = self
            .graph
            .edge_references()
            .map(|edge| self.to_reference_edge(edge.source(), edge.target(), *edge.weight()))
            .collect();
        edges.sort();
        edges
    }

    /// Assets whose last catalogue fetch failed, ascending.
    #[must_use]
    pub fn stale_assets(&self) -> Vec<AssetId> {
        let mut ids: Vec<AssetId> = self
            .graph
            .node_weights()
            .filter(|node| node.stale)
            .map(|node| node.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Summary counts.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let (missing, stale) = self.graph.node_weights().fold((0, 0), |(m, s), node| {
            (m + usize::from(node.is_missing()), s + usize::from(node.stale))
        });
        StoreStats {
            nodes: self.node_count(),
            edges: self.edge_count(),
            missing,
            stale,
            epoch: self.epoch,
        }
    }

    /// Number of edges pointing at the asset (0 if unknown).
    #[must_use]
    pub fn in_degree(&self, id: &AssetId) -> usize {
        self.degree(id, PetDirection::Incoming)
    }

    /// Number of edges leaving the asset (0 if unknown).
    #[must_use]
    pub fn out_degree(&self, id: &AssetId) -> usize {
        self.degree(id, PetDirection::Outgoing)
    }

    fn degree(&self, id: &AssetId, direction: PetDirection) -> usize {
        self.node_map
            .get(id)
            .map_or(0, |&idx| self.graph.edges_directed(idx, direction).count())
    }

    /// Neighbouring asset ids in ascending order, one entry per asset even when
    /// several kinds connect the pair.
    #[must_use]
    pub fn neighbors(
        &self,
        id: &AssetId,
        direction: Direction,
        kinds: ReferenceKinds,
    ) -> Vec<AssetId> {
        let mut ids: Vec<AssetId> = self
            .neighbor_edges(id, direction, kinds)
            .into_iter()
            .map(|edge| match direction {
                Direction::Dependencies => edge.target,
                Direction::Dependents => edge.source,
            })
            .collect();
        ids.dedup();
        ids
    }

    /// Edges incident to the asset in the given direction, filtered by kind and
    /// sorted by the far endpoint, then kind.
    #[must_use]
    pub fn neighbor_edges(
        &self,
        id: &AssetId,
        direction: Direction,
        kinds: ReferenceKinds,
    ) -> Vec<ReferenceEdge> {
        let Some(&idx) = self.node_map.get(id) else {
            return Vec::new();
        };

        let mut edges: Vec<ReferenceEdge> = self
            .graph
            .edges_directed(idx, direction.as_petgraph())
            .filter(|edge| kinds.contains(*edge.weight()))
            .map(|edge| self.to_reference_edge(edge.source(), edge.target(), *edge.weight()))
            .collect();

        match direction {
            Direction::Dependencies => {
                edges.sort_by(|a, b| a.target.cmp(&b.target).then(a.kind.cmp(&b.kind)));
            }
            Direction::Dependents => {
                edges.sort_by(|a, b| a.source.cmp(&b.source).then(a.kind.cmp(&b.kind)));
            }
        }
        edges
    }

    /// The asset's current outgoing references as `(target, kind)` pairs.
    #[must_use]
    pub fn outgoing_references(&self, id: &AssetId) -> BTreeSet<(AssetId, ReferenceKind)> {
        self.neighbor_edges(id, Direction::Dependencies, ReferenceKinds::ALL)
            .into_iter()
            .map(|edge| (edge.target, edge.kind))
            .collect()
    }

    // ========== Mutations ==========

    /// Insert or update a node's metadata.
    ///
    /// Returns `true` if anything changed. A successful fetch also clears the
    /// stale flag.
    pub(crate) fn upsert_node(
        &mut self,
        id: &AssetId,
        asset_type: Option<String>,
        exists: bool,
    ) -> bool {
        if let Some(&idx) = self.node_map.get(id) {
            let node = &mut self.graph[idx];
            if node.asset_type == asset_type && node.exists == exists && !node.stale {
                return false;
            }
            node.asset_type = asset_type;
            node.exists = exists;
            node.stale = false;
            node.generation += 1;
        } else {
            let idx = self.insert_placeholder(id);
            let node = &mut self.graph[idx];
            node.asset_type = asset_type;
            node.exists = exists;
        }
        self.epoch += 1;
        true
    }

    /// Set or clear the stale flag, creating a placeholder for unknown assets
    /// being marked stale.
    ///
    /// Returns `true` if anything changed.
    pub(crate) fn set_stale(&mut self, id: &AssetId, stale: bool) -> bool {
        let idx = match self.node_map.get(id) {
            Some(&idx) => idx,
            None if stale => self.insert_placeholder(id),
            None => return false,
        };

        let node = &mut self.graph[idx];
        if node.stale == stale {
            return false;
        }
        node.stale = stale;
        node.generation += 1;
        self.epoch += 1;
        true
    }

    /// Insert an edge, creating placeholder endpoints as needed.
    ///
    /// Returns `true` if the edge was not already present.
    pub(crate) fn upsert_edge(
        &mut self,
        source: &AssetId,
        target: &AssetId,
        kind: ReferenceKind,
    ) -> bool {
        if self.contains_edge(source, target, kind) {
            return false;
        }

        let s = self.ensure_node(source);
        let t = self.ensure_node(target);
        let edge = self.graph.add_edge(s, t, kind);
        self.edge_map.insert((s, t, kind), edge);
        self.bump(s);
        self.bump(t);
        self.epoch += 1;
        true
    }

    /// Remove one edge. Removing an absent edge is a no-op.
    ///
    /// Returns `true` if an edge was removed.
    pub(crate) fn remove_edge(&mut self, source: &AssetId, target: &AssetId, kind: ReferenceKind) -> bool {
        let (Some(&s), Some(&t)) = (self.node_map.get(source), self.node_map.get(target)) else {
            return false;
        };
        let Some(edge) = self.edge_map.remove(&(s, t, kind)) else {
            return false;
        };

        self.graph.remove_edge(edge);
        self.bump(s);
        self.bump(t);
        self.epoch += 1;
        true
    }

    /// Remove a node and every edge touching it. Removing an absent node is a
    /// no-op.
    ///
    /// Returns `true` if the node existed.
    pub(crate) fn remove_node(&mut self, id: &AssetId) -> bool {
        let Some(idx) = self.node_map.remove(id) else {
            return false;
        };

        let incident: Vec<(NodeIndex, NodeIndex, ReferenceKind)> = self
            .graph
            .edges_directed(idx, PetDirection::Outgoing)
            .chain(self.graph.edges_directed(idx, PetDirection::Incoming))
            .map(|edge| (edge.source(), edge.target(), *edge.weight()))
            .collect();

        for key in &incident {
            self.edge_map.remove(key);
            let other = if key.0 == idx { key.1 } else { key.0 };
            if other != idx {
                self.bump(other);
            }
        }

        self.graph.remove_node(idx);
        self.epoch += 1;
        true
    }

    /// Give an asset a new identity while keeping every edge attached.
    ///
    /// When `new` already has a node (typically a placeholder created by
    /// references to the new path), the two are merged: all of `old`'s edges
    /// move onto `new`, `new` takes `old`'s metadata, and `old` disappears.
    ///
    /// Returns `true` if anything changed.
    pub(crate) fn rename_node(&mut self, old: &AssetId, new: &AssetId) -> bool {
        if old == new {
            return false;
        }
        let Some(old_idx) = self.node_map.remove(old) else {
            return false;
        };

        match self.node_map.get(new).copied() {
            None => {
                let node = &mut self.graph[old_idx];
                node.id = new.clone();
                node.generation += 1;
                self.node_map.insert(new.clone(), old_idx);
            }
            Some(new_idx) => self.merge_into(old_idx, new_idx),
        }

        self.epoch += 1;
        true
    }

    fn merge_into(&mut self, old_idx: NodeIndex, new_idx: NodeIndex) {
        let moved: Vec<(NodeIndex, NodeIndex, ReferenceKind)> = self
            .graph
            .edges_directed(old_idx, PetDirection::Outgoing)
            .chain(self.graph.edges_directed(old_idx, PetDirection::Incoming))
            .map(|edge| (edge.source(), edge.target(), *edge.weight()))
            .collect();

        for key in &moved {
            self.edge_map.remove(key);
        }

        let remap = |idx: NodeIndex| if idx == old_idx { new_idx } else { idx };
        for (s, t, kind) in moved {
            let (s, t) = (remap(s), remap(t));
            if !self.edge_map.contains_key(&(s, t, kind)) {
                let edge = self.graph.add_edge(s, t, kind);
                self.edge_map.insert((s, t, kind), edge);
                self.bump(if s == new_idx { t } else { s });
            }
        }

        if let Some(old_node) = self.graph.remove_node(old_idx) {
            let node = &mut self.graph[new_idx];
            node.asset_type = old_node.asset_type;
            node.exists = old_node.exists;
            node.stale = old_node.stale;
            node.generation = node.generation.max(old_node.generation) + 1;
        }
    }

    // ========== Helpers ==========

    fn ensure_node(&mut self, id: &AssetId) -> NodeIndex {
        match self.node_map.get(id) {
            Some(&idx) => idx,
            None => self.insert_placeholder(id),
        }
    }

    fn insert_placeholder(&mut self, id: &AssetId) -> NodeIndex {
        let mut node = AssetNode::placeholder(id.clone());
        node.generation = 1;
        let idx = self.graph.add_node(node);
        self.node_map.insert(id.clone(), idx);
        idx
    }

    fn bump(&mut self, idx: NodeIndex) {
        if let Some(node) = self.graph.node_weight_mut(idx) {
            node.generation += 1;
        }
    }

    fn to_reference_edge(&self, s: NodeIndex, t: NodeIndex, kind: ReferenceKind) -> ReferenceEdge {
        ReferenceEdge::new(self.graph[s].id.clone(), self.graph[t].id.clone(), kind)
    }
}
