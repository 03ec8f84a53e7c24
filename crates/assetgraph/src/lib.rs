//! assetgraph - Incremental asset dependency graph.
//!
//! Maintains a directed graph of references between content assets, kept in
//! sync with an external asset catalogue through change notifications, and
//! answers bounded transitive-closure, cycle, path and health queries against
//! it.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use assetgraph::{AssetGraph, EngineConfig};
//! use assetgraph::catalogue::InMemoryCatalogue;
//! use assetgraph::domain::{AssetId, ReferenceKind};
//! use assetgraph::query::TraversalRule;
//!
//! # async fn example() -> assetgraph::Result<()> {
//! let catalogue = Arc::new(InMemoryCatalogue::new());
//! let crate_mesh = AssetId::new("/Game/Props/Crate", "Crate");
//! let wood = AssetId::new("/Game/Props/Wood", "Wood");
//! catalogue.seed_asset(crate_mesh.clone(), "StaticMesh", true, vec![(wood, ReferenceKind::Hard)]);
//!
//! let graph = AssetGraph::start(catalogue.clone(), EngineConfig::default())?;
//! graph.full_scan().await?;
//!
//! let deps = graph.query(&[crate_mesh], &TraversalRule::dependencies()).await?;
//! for asset in &deps.assets {
//!     println!("{asset}");
//! }
//! graph.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`catalogue`]: the adapter boundary the engine reads asset data through
//! - [`store`]: the graph itself (petgraph, forward and reverse adjacency)
//! - [`builder`]: turns catalogue events into minimal graph deltas
//! - [`query`]: bounded traversals over a store snapshot
//! - [`cache`]: epoch-invalidated memoization of traversal results
//! - [`engine`]: wires the pieces together behind [`AssetGraph`]

#![forbid(unsafe_code)]

pub mod builder;
pub mod cache;
pub mod catalogue;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod query;
pub mod store;

pub use config::EngineConfig;
pub use engine::{AssetGraph, GraphStats};
pub use error::{CatalogueError, Error, Result};
