//! Shortest reference path between two assets.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;

use super::{Charge, VisitBudget};
use crate::domain::{AssetId, ReferenceEdge, ReferenceKinds};
use crate::store::{Direction, GraphStore};

/// A path through the reference graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetPath {
    /// Assets from source to target.
    assets: Vec<AssetId>,
    /// The reference followed at each step.
    edges: Vec<ReferenceEdge>,
}

impl AssetPath {
    /// Create a new path, validating invariants.
    ///
    /// Returns `None` if:
    /// - `assets` is empty
    /// - `edges.len()` does not equal `assets.len() - 1`
    /// - an edge does not connect consecutive assets
    #[must_use]
    pub fn new(assets: Vec<AssetId>, edges: Vec<ReferenceEdge>) -> Option<Self> {
        if assets.is_empty() {
            return None;
        }
        if edges.len() != assets.len().saturating_sub(1) {
            return None;
        }
        let connected = edges
            .iter()
            .zip(assets.windows(2))
            .all(|(edge, pair)| edge.source == pair[0] && edge.target == pair[1]);
        connected.then_some(Self { assets, edges })
    }

    /// Create a trivial path with a single asset.
    #[must_use]
    pub fn single(asset: AssetId) -> Self {
        Self {
            assets: vec![asset],
            edges: vec![],
        }
    }

    /// Get the assets in this path.
    #[must_use]
    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    /// Get the edges between assets.
    #[must_use]
    pub fn edges(&self) -> &[ReferenceEdge] {
        &self.edges
    }

    /// Number of hops.
    #[must_use]
    pub fn hops(&self) -> usize {
        self.edges.len()
    }
}

impl fmt::Display for AssetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut assets = self.assets.iter();
        if let Some(first) = assets.next() {
            write!(f, "{first}")?;
        }
        for (asset, edge) in assets.zip(&self.edges) {
            write!(f, " -[{}]-> {asset}", edge.kind)?;
        }
        Ok(())
    }
}

/// Outcome of [`shortest_path`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PathLookup {
    /// A shortest path
    Found(AssetPath),
    /// `to` is not reachable from `from`
    NoPath,
    /// One of the endpoints is not in the graph
    UnknownAsset(AssetId),
    /// The visit budget ran out or the search was cancelled before finishing
    Incomplete,
}

impl PathLookup {
    /// The path, if one was found.
    #[must_use]
    pub fn path(&self) -> Option<&AssetPath> {
        match self {
            Self::Found(path) => Some(path),
            _ => None,
        }
    }
}

/// Shortest dependency path from `from` to `to` following edges of `kinds`.
///
/// Breadth-first with neighbours in ascending order, so among equally short
/// paths the lexicographically smallest is returned. `from == to` yields the
/// single-asset path.
#[must_use]
pub fn shortest_path(
    store: &GraphStore,
    from: &AssetId,
    to: &AssetId,
    kinds: ReferenceKinds,
    budget: &mut VisitBudget,
) -> PathLookup {
    for endpoint in [from, to] {
        if !store.contains_node(endpoint) {
            return PathLookup::UnknownAsset(endpoint.clone());
        }
    }
    if from == to {
        return PathLookup::Found(AssetPath::single(from.clone()));
    }
    if budget.charge() != Charge::Granted {
        return PathLookup::Incomplete;
    }

    // Predecessor edge for every discovered asset; the source has none.
    let mut predecessor: HashMap<AssetId, Option<ReferenceEdge>> =
        HashMap::from([(from.clone(), None)]);
    let mut queue = VecDeque::from([from.clone()]);

    while let Some(current) = queue.pop_front() {
        for edge in store.neighbor_edges(&current, Direction::Dependencies, kinds) {
            if predecessor.contains_key(&edge.target) {
                continue;
            }
            if budget.charge() != Charge::Granted {
                return PathLookup::Incomplete;
            }
            let target = edge.target.clone();
            predecessor.insert(target.clone(), Some(edge));
            if &target == to {
                return PathLookup::Found(reconstruct(&predecessor, to));
            }
            queue.push_back(target);
        }
    }

    PathLookup::NoPath
}

fn reconstruct(predecessor: &HashMap<AssetId, Option<ReferenceEdge>>, to: &AssetId) -> AssetPath {
    let mut assets = vec![to.clone()];
    let mut edges = Vec::new();
    let mut current = to;
    while let Some(Some(edge)) = predecessor.get(current) {
        assets.push(edge.source.clone());
        edges.push(edge.clone());
        current = &edge.source;
    }
    assets.reverse();
    edges.reverse();
    AssetPath { assets, edges }
}
