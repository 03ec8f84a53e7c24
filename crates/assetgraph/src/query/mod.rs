//! Query engine over the graph store.
//!
//! All queries are read-only functions of a `&GraphStore`. They never block
//! and never run unbounded: every traversal is charged against a visit budget
//! even when the caller asks for unlimited depth.
//!
//! | Operation | Algorithm |
//! |-----------|-----------|
//! | Transitive closure / filtered subgraph | Level-order BFS, canonical neighbour order |
//! | Cycle witness from a root | Iterative DFS with an explicit recursion stack |
//! | All cycles | Tarjan's SCC algorithm (petgraph) |
//! | Shortest path | BFS with predecessor tracking |
//! | Dependency health | Two closures (hard-only and full) over missing nodes |

mod cycles;
mod health;
mod paths;
mod traversal;

pub use cycles::{CycleGroup, CycleGroups, CycleLookup, CycleWitness, all_cycles, find_cycle};
pub use health::{DependencyHealth, HealthStatus, assess_health};
pub use paths::{AssetPath, PathLookup, shortest_path};
pub use traversal::traverse;

use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::{AssetId, ReferenceEdge, ReferenceKinds};
use crate::error::{Error, Result};
use crate::store::{Direction, GraphStore};

/// Visit budget used when neither the rule nor the engine config sets one.
pub const DEFAULT_VISIT_BUDGET: usize = 100_000;

/// Asset-type filter applied to every discovered (non-root) asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeFilter {
    /// Every type passes
    #[default]
    Any,
    /// Only these types pass; untyped placeholders do not
    Allow(BTreeSet<String>),
    /// Every type except these passes; untyped placeholders do too
    Deny(BTreeSet<String>),
}

impl TypeFilter {
    /// Returns `true` if an asset with this type tag passes.
    #[must_use]
    pub fn admits(&self, asset_type: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::Allow(types) => asset_type.is_some_and(|t| types.contains(t)),
            Self::Deny(types) => asset_type.is_none_or(|t| !types.contains(t)),
        }
    }
}

/// Caller-supplied traversal configuration.
///
/// Built with chained setters:
///
/// ```
/// use assetgraph::query::TraversalRule;
/// use assetgraph::domain::ReferenceKinds;
///
/// let rule = TraversalRule::dependents()
///     .max_depth(3)
///     .kinds(ReferenceKinds::HARD)
///     .deny_types(["World"]);
/// assert!(rule.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct TraversalRule {
    /// Which way edges are followed
    pub direction: Direction,
    /// Reference kinds that may be followed
    pub kinds: ReferenceKinds,
    /// Depth limit; roots are depth 0 (`None` = unbounded)
    pub max_depth: Option<u32>,
    /// Asset-type allow/deny filter
    pub type_filter: TypeFilter,
    /// Most new assets a single node may contribute; the rest are collapsed
    pub max_breadth: Option<usize>,
    /// Skip engine-native (`/Script`) packages
    pub exclude_native: bool,
    /// Restrict discovered assets to these packages
    pub allowed_packages: Option<BTreeSet<String>>,
    /// Override the engine's visit budget for this query
    pub visit_budget: Option<usize>,
}

impl TraversalRule {
    /// Rule following dependencies with default settings.
    #[must_use]
    pub fn dependencies() -> Self {
        Self::default()
    }

    /// Rule following dependents with default settings.
    #[must_use]
    pub fn dependents() -> Self {
        Self {
            direction: Direction::Dependents,
            ..Self::default()
        }
    }

    /// Builder: set the traversal direction.
    #[must_use]
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Builder: set the depth limit.
    #[must_use]
    pub fn max_depth(mut self, depth: u32) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Builder: set the depth limit from an untrusted signed value.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRequest` for negative or oversized depths.
    pub fn signed_depth(mut self, depth: i64) -> Result<Self> {
        let depth = u32::try_from(depth).map_err(|_| {
            Error::InvalidRequest(format!("depth must be between 0 and {}, got {depth}", u32::MAX))
        })?;
        self.max_depth = Some(depth);
        Ok(self)
    }

    /// Builder: set the reference kinds to follow.
    #[must_use]
    pub fn kinds(mut self, kinds: ReferenceKinds) -> Self {
        self.kinds = kinds;
        self
    }

    /// Builder: only admit these asset types.
    #[must_use]
    pub fn allow_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.type_filter = TypeFilter::Allow(types.into_iter().map(Into::into).collect());
        self
    }

    /// Builder: admit every asset type except these.
    #[must_use]
    pub fn deny_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.type_filter = TypeFilter::Deny(types.into_iter().map(Into::into).collect());
        self
    }

    /// Builder: cap how many new assets each node may contribute.
    #[must_use]
    pub fn max_breadth(mut self, breadth: usize) -> Self {
        self.max_breadth = Some(breadth);
        self
    }

    /// Builder: skip engine-native packages.
    #[must_use]
    pub fn exclude_native(mut self, exclude: bool) -> Self {
        self.exclude_native = exclude;
        self
    }

    /// Builder: restrict discovered assets to a package allow-list.
    #[must_use]
    pub fn only_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_packages = Some(packages.into_iter().map(Into::into).collect());
        self
    }

    /// Builder: set the visit budget for this query.
    #[must_use]
    pub fn visit_budget(mut self, budget: usize) -> Self {
        self.visit_budget = Some(budget);
        self
    }

    /// Reject rules that can never be answered.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRequest` for a zero visit budget or zero breadth.
    pub fn validate(&self) -> Result<()> {
        if self.visit_budget == Some(0) {
            return Err(Error::InvalidRequest(
                "visit budget must be at least 1".to_string(),
            ));
        }
        if self.max_breadth == Some(0) {
            return Err(Error::InvalidRequest(
                "breadth limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns `true` if a discovered asset passes the rule's filters.
    #[must_use]
    pub fn admits(&self, store: &GraphStore, id: &AssetId) -> bool {
        if self.exclude_native && id.is_native() {
            return false;
        }
        if let Some(packages) = &self.allowed_packages {
            if !packages.contains(&id.package) {
                return false;
            }
        }
        let asset_type = store.node(id).and_then(|node| node.asset_type.as_deref());
        self.type_filter.admits(asset_type)
    }
}

/// Shared flag a caller flips to stop a running traversal early.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every traversal holding this token to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once `cancel` was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outcome of charging one visit against a [`VisitBudget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charge {
    /// The visit may proceed
    Granted,
    /// No visits left
    Exhausted,
    /// The caller cancelled the query
    Cancelled,
}

/// Node-visit allowance for one query.
#[derive(Debug, Clone)]
pub struct VisitBudget {
    remaining: usize,
    cancel: Option<CancelToken>,
}

impl VisitBudget {
    /// A budget of `limit` visits.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            remaining: limit,
            cancel: None,
        }
    }

    /// Attach a cancel token polled on every charge.
    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Spend one visit.
    pub fn charge(&mut self) -> Charge {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Charge::Cancelled;
        }
        if self.remaining == 0 {
            return Charge::Exhausted;
        }
        self.remaining -= 1;
        Charge::Granted
    }

    /// Visits left.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

/// Assets reachable from a root set under a [`TraversalRule`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct QueryResult {
    /// Reachable assets in discovery order, roots first; each appears once
    pub assets: Vec<AssetId>,
    /// Depth at which each asset was discovered
    #[serde(serialize_with = "depth_entries")]
    pub depths: BTreeMap<AssetId, u32>,
    /// Edges actually followed, in traversal order (source -> target as stored)
    pub edges: Vec<ReferenceEdge>,
    /// Discovered assets that are missing on disk (dangling references)
    pub missing: Vec<AssetId>,
    /// Requested roots with no node in the graph
    pub unknown_roots: Vec<AssetId>,
    /// Per-node count of neighbours hidden by the breadth limit
    #[serde(serialize_with = "collapsed_entries")]
    pub collapsed: BTreeMap<AssetId, usize>,
    /// Some asset was left out because of the depth limit or the budget
    pub truncated: bool,
    /// The visit budget ran out
    pub budget_exhausted: bool,
    /// The caller cancelled the traversal
    pub cancelled: bool,
    /// Graph epoch the result was computed at
    pub epoch: u64,
}

impl QueryResult {
    /// Number of reachable assets (roots included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Returns `true` if nothing was reached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Returns `true` if the asset was reached.
    #[must_use]
    pub fn contains(&self, id: &AssetId) -> bool {
        self.depths.contains_key(id)
    }

    /// Depth at which the asset was discovered.
    #[must_use]
    pub fn depth_of(&self, id: &AssetId) -> Option<u32> {
        self.depths.get(id).copied()
    }
}

// JSON object keys must be strings, so asset-keyed maps go out as entry lists.

fn depth_entries<S: Serializer>(
    depths: &BTreeMap<AssetId, u32>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct Entry<'a> {
        asset: &'a AssetId,
        depth: u32,
    }
    serializer.collect_seq(depths.iter().map(|(asset, &depth)| Entry { asset, depth }))
}

fn collapsed_entries<S: Serializer>(
    collapsed: &BTreeMap<AssetId, usize>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct Entry<'a> {
        asset: &'a AssetId,
        hidden: usize,
    }
    serializer.collect_seq(collapsed.iter().map(|(asset, &hidden)| Entry { asset, hidden }))
}
