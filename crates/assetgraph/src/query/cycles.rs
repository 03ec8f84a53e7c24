//! Cycle detection.
//!
//! Two questions are answered here:
//!
//! - [`find_cycle`]: is there a cycle reachable from this asset? Answered with
//!   a depth-first search that keeps the current path as an explicit stack, so
//!   deep reference chains cannot overflow the thread stack. The first back
//!   edge found yields a witness.
//! - [`all_cycles`]: which groups of assets reference each other circularly?
//!   Answered with Tarjan's strongly connected components over a copy of the
//!   whole graph. Every asset counts against the visit budget, so a budget
//!   smaller than the graph refuses the scan up front.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

use super::{Charge, VisitBudget};
use crate::domain::{AssetId, ReferenceEdge, ReferenceKinds};
use crate::store::{Direction, GraphStore};

/// A closed walk through the graph.
///
/// `edges[i]` leads from `assets[i]` to `assets[i + 1]`; the last edge leads
/// back to `assets[0]`, so there are as many edges as assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleWitness {
    assets: Vec<AssetId>,
    edges: Vec<ReferenceEdge>,
}

impl CycleWitness {
    /// Create a witness, validating that the edges close the walk.
    ///
    /// Returns `None` if the walk is empty, the edge count differs from the
    /// asset count, or an edge does not connect consecutive assets.
    #[must_use]
    pub fn new(assets: Vec<AssetId>, edges: Vec<ReferenceEdge>) -> Option<Self> {
        if assets.is_empty() || edges.len() != assets.len() {
            return None;
        }
        let closes = edges.iter().enumerate().all(|(i, edge)| {
            edge.source == assets[i] && edge.target == assets[(i + 1) % assets.len()]
        });
        closes.then_some(Self { assets, edges })
    }

    /// Assets on the cycle, starting where the search entered it.
    #[must_use]
    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    /// Edges walked, including the one closing the cycle.
    #[must_use]
    pub fn edges(&self) -> &[ReferenceEdge] {
        &self.edges
    }

    /// Number of distinct assets on the cycle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Always `false`; a witness has at least one asset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl fmt::Display for CycleWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for asset in &self.assets {
            write!(f, "{asset} -> ")?;
        }
        match self.assets.first() {
            Some(first) => write!(f, "{first}"),
            None => Ok(()),
        }
    }
}

/// Outcome of [`find_cycle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleLookup {
    /// A cycle is reachable from the root
    Found(CycleWitness),
    /// Every reachable asset was searched and no cycle exists
    Acyclic,
    /// The root is not in the graph
    UnknownAsset(AssetId),
    /// The visit budget ran out or the search was cancelled before finishing
    Incomplete,
}

impl CycleLookup {
    /// The witness, if a cycle was found.
    #[must_use]
    pub fn witness(&self) -> Option<&CycleWitness> {
        match self {
            Self::Found(witness) => Some(witness),
            _ => None,
        }
    }
}

/// A strongly connected group of assets (every member reaches every other).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleGroup {
    /// Members in ascending order
    pub assets: Vec<AssetId>,
}

/// Outcome of [`all_cycles`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleGroups {
    /// Every asset was examined
    Complete {
        /// Groups sorted by their first member
        groups: Vec<CycleGroup>,
    },
    /// The graph holds more assets than the budget allows, or the scan was
    /// cancelled
    Incomplete,
}

impl CycleGroups {
    /// The groups, if the scan completed.
    #[must_use]
    pub fn groups(&self) -> Option<&[CycleGroup]> {
        match self {
            Self::Complete { groups } => Some(groups),
            Self::Incomplete => None,
        }
    }
}

struct Frame {
    asset: AssetId,
    edges: Vec<ReferenceEdge>,
    next: usize,
}

fn forward_edges(store: &GraphStore, id: &AssetId, kinds: ReferenceKinds) -> Vec<ReferenceEdge> {
    let mut edges = store.neighbor_edges(id, Direction::Dependencies, kinds);
    // One edge per target is enough to walk a cycle; keep the lowest kind.
    edges.dedup_by(|later, earlier| later.target == earlier.target);
    edges
}

/// Search for a cycle reachable from `root` following dependency edges.
///
/// Neighbours are visited in ascending order, so the witness is
/// deterministic. For `A -> B -> C -> A` searched from `A` the witness is
/// `[A, B, C]`.
#[must_use]
pub fn find_cycle(
    store: &GraphStore,
    root: &AssetId,
    kinds: ReferenceKinds,
    budget: &mut VisitBudget,
) -> CycleLookup {
    if !store.contains_node(root) {
        return CycleLookup::UnknownAsset(root.clone());
    }
    if budget.charge() != Charge::Granted {
        return CycleLookup::Incomplete;
    }

    let mut visited: HashSet<AssetId> = HashSet::from([root.clone()]);
    let mut on_path: HashMap<AssetId, usize> = HashMap::from([(root.clone(), 0)]);
    let mut path_edges: Vec<ReferenceEdge> = Vec::new();
    let mut stack = vec![Frame {
        asset: root.clone(),
        edges: forward_edges(store, root, kinds),
        next: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        let Some(edge) = frame.edges.get(frame.next).cloned() else {
            on_path.remove(&frame.asset);
            stack.pop();
            path_edges.pop();
            continue;
        };
        frame.next += 1;

        if let Some(&start) = on_path.get(&edge.target) {
            let assets = stack[start..].iter().map(|f| f.asset.clone()).collect();
            let mut edges = path_edges[start..].to_vec();
            edges.push(edge);
            if let Some(witness) = CycleWitness::new(assets, edges) {
                tracing::debug!(root = %root, length = witness.len(), "Cycle found");
                return CycleLookup::Found(witness);
            }
            continue;
        }
        if visited.contains(&edge.target) {
            continue;
        }
        if budget.charge() != Charge::Granted {
            return CycleLookup::Incomplete;
        }

        let target = edge.target.clone();
        visited.insert(target.clone());
        on_path.insert(target.clone(), stack.len());
        path_edges.push(edge);
        stack.push(Frame {
            edges: forward_edges(store, &target, kinds),
            asset: target,
            next: 0,
        });
    }

    CycleLookup::Acyclic
}

/// Every group of mutually reachable assets in the graph, including assets
/// that reference themselves.
///
/// Groups are sorted internally and by their first member.
///
/// Cost is O(V + E) time and memory: the filtered graph is copied before the
/// components are computed. One visit is charged per asset before any copying
/// starts, and the scan is refused as [`CycleGroups::Incomplete`] if the
/// budget cannot cover them all.
#[must_use]
pub fn all_cycles(
    store: &GraphStore,
    kinds: ReferenceKinds,
    budget: &mut VisitBudget,
) -> CycleGroups {
    let ids = store.asset_ids();
    for _ in &ids {
        if budget.charge() != Charge::Granted {
            tracing::debug!(assets = ids.len(), "Cycle scan refused by visit budget");
            return CycleGroups::Incomplete;
        }
    }

    let mut graph: DiGraph<AssetId, ()> = DiGraph::with_capacity(ids.len(), store.edge_count());
    let index: HashMap<AssetId, NodeIndex> = ids
        .into_iter()
        .map(|id| (id.clone(), graph.add_node(id)))
        .collect();

    let mut self_loops: HashSet<NodeIndex> = HashSet::new();
    for edge in store.edges() {
        if !kinds.contains(edge.kind) {
            continue;
        }
        let (Some(&s), Some(&t)) = (index.get(&edge.source), index.get(&edge.target)) else {
            continue;
        };
        if s == t {
            self_loops.insert(s);
        }
        graph.update_edge(s, t, ());
    }

    let mut groups: Vec<CycleGroup> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| component.len() > 1 || self_loops.contains(&component[0]))
        .map(|component| {
            let mut assets: Vec<AssetId> =
                component.into_iter().map(|idx| graph[idx].clone()).collect();
            assets.sort();
            CycleGroup { assets }
        })
        .collect();
    groups.sort_by(|a, b| a.assets.cmp(&b.assets));

    tracing::debug!(groups = groups.len(), "Strongly connected components computed");
    CycleGroups::Complete { groups }
}
