//! The `AssetGraph` facade.
//!
//! Wires a catalogue, the shared graph store, the builder worker and the
//! result cache together, and exposes the query boundary. Queries take a read
//! guard on the store for their whole run, so each result describes one
//! consistent epoch; the builder worker is the only writer.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLockReadGuard;

use crate::builder::{self, BuilderHandle, IncrementalBuilder, ScanReport};
use crate::cache::{CacheStats, ResultCache, RuleSignature};
use crate::catalogue::{Catalogue, EventSink};
use crate::config::EngineConfig;
use crate::domain::{AssetId, AssetNode, ReferenceKinds};
use crate::error::Result;
use crate::query::{
    self, CancelToken, CycleGroups, CycleLookup, DependencyHealth, PathLookup, QueryResult,
    TraversalRule, VisitBudget,
};
use crate::store::{GraphStore, SharedStore, StoreStats};

/// Graph and cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    /// Store counts and epoch
    pub store: StoreStats,
    /// Cache counters
    pub cache: CacheStats,
}

/// A live asset dependency graph over one catalogue.
#[derive(Debug)]
pub struct AssetGraph {
    store: SharedStore,
    cache: ResultCache,
    config: EngineConfig,
    worker: BuilderHandle,
}

impl AssetGraph {
    /// Subscribe to the catalogue and start the builder worker.
    ///
    /// The graph starts empty; call [`full_scan`](Self::full_scan) to populate
    /// it from the catalogue's current contents.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, since the builder worker is
    /// spawned onto the current one.
    pub fn start(catalogue: Arc<dyn Catalogue>, config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let (sink, events) = EventSink::channel();
        catalogue.subscribe(sink);

        let builder = IncrementalBuilder::new(catalogue);
        let store = builder.shared();
        let worker = builder::spawn(builder, events, config.retry_interval());

        tracing::debug!(
            visit_budget = config.visit_budget,
            cache_capacity = config.cache_capacity,
            "Asset graph started"
        );

        Ok(Self {
            store,
            cache: ResultCache::new(config.cache_capacity),
            config,
            worker,
        })
    }

    /// The configuration in effect.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read access to the graph as of the current epoch.
    ///
    /// The builder worker is the only writer; holding the guard delays it.
    /// Mutators are not reachable through the guard:
    ///
    /// ```compile_fail
    /// # async fn example(graph: &assetgraph::AssetGraph, id: &assetgraph::domain::AssetId) {
    /// graph.read().await.remove_node(id);
    /// # }
    /// ```
    pub async fn read(&self) -> RwLockReadGuard<'_, GraphStore> {
        self.store.read().await
    }

    /// Populate or resynchronize the whole graph from the catalogue.
    ///
    /// # Errors
    ///
    /// Returns `Error::Catalogue` if the catalogue cannot list its assets, or
    /// `Error::Internal` if the worker has stopped.
    pub async fn full_scan(&self) -> Result<ScanReport> {
        self.worker.full_scan().await
    }

    /// Wait until every catalogue event delivered so far is applied.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the worker has stopped.
    pub async fn flush(&self) -> Result<()> {
        self.worker.flush().await
    }

    /// Stop the builder worker.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the worker task failed.
    pub async fn shutdown(self) -> Result<()> {
        self.worker.shutdown().await
    }

    /// A snapshot of one node.
    pub async fn node(&self, id: &AssetId) -> Option<AssetNode> {
        self.store.read().await.node(id).cloned()
    }

    /// Everything reachable from `roots` under `rule`, served from the cache
    /// when the graph has not changed since the same query last ran.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRequest` if the rule is invalid.
    pub async fn query(&self, roots: &[AssetId], rule: &TraversalRule) -> Result<Arc<QueryResult>> {
        rule.validate()?;
        let signature = RuleSignature::of(rule)?;

        let store = self.store.read().await;
        if let Some(hit) = self.cache.get(roots, rule, signature, store.epoch())? {
            tracing::trace!(epoch = hit.epoch, "Query served from cache");
            return Ok(hit);
        }

        let result = Arc::new(query::traverse(&store, roots, rule, &mut self.budget(rule))?);
        self.cache.put(roots, rule, signature, Arc::clone(&result))?;
        Ok(result)
    }

    /// Like [`query`](Self::query), but stoppable through `cancel` and never
    /// cached.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRequest` if the rule is invalid.
    pub async fn query_cancellable(
        &self,
        roots: &[AssetId],
        rule: &TraversalRule,
        cancel: CancelToken,
    ) -> Result<QueryResult> {
        let store = self.store.read().await;
        let mut budget = self.budget(rule).with_cancel(cancel);
        query::traverse(&store, roots, rule, &mut budget)
    }

    /// Search for a cycle reachable from `root`.
    pub async fn find_cycle(&self, root: &AssetId, kinds: ReferenceKinds) -> CycleLookup {
        let store = self.store.read().await;
        query::find_cycle(&store, root, kinds, &mut VisitBudget::new(self.config.visit_budget))
    }

    /// Shortest dependency path from `from` to `to`.
    pub async fn shortest_path(
        &self,
        from: &AssetId,
        to: &AssetId,
        kinds: ReferenceKinds,
    ) -> PathLookup {
        let store = self.store.read().await;
        query::shortest_path(
            &store,
            from,
            to,
            kinds,
            &mut VisitBudget::new(self.config.visit_budget),
        )
    }

    /// Every strongly connected group of assets.
    ///
    /// Copies the whole filtered graph, O(V + E), while holding the read lock.
    /// Refused as incomplete when the graph holds more assets than the
    /// configured visit budget. See [`query::all_cycles`].
    pub async fn all_cycles(&self, kinds: ReferenceKinds) -> CycleGroups {
        let store = self.store.read().await;
        query::all_cycles(&store, kinds, &mut VisitBudget::new(self.config.visit_budget))
    }

    /// Classify an asset by the missing assets in its dependency closure.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRequest` if the traversal cannot run.
    pub async fn assess_health(
        &self,
        asset: &AssetId,
        kinds: ReferenceKinds,
    ) -> Result<DependencyHealth> {
        let store = self.store.read().await;
        query::assess_health(&store, asset, kinds, self.config.visit_budget)
    }

    /// Current graph and cache counters.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the cache lock is poisoned.
    pub async fn stats(&self) -> Result<GraphStats> {
        let store = self.store.read().await.stats();
        Ok(GraphStats {
            store,
            cache: self.cache.stats()?,
        })
    }

    fn budget(&self, rule: &TraversalRule) -> VisitBudget {
        VisitBudget::new(rule.visit_budget.unwrap_or(self.config.visit_budget))
    }
}
