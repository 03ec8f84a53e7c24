//! CLI command implementations.

mod display;

pub mod cycles;
pub mod deps;
pub mod health;
pub mod path;
pub mod stats;

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use assetgraph::catalogue::load_manifest;
use assetgraph::domain::{AssetId, ReferenceKind, ReferenceKinds};
use assetgraph::{AssetGraph, EngineConfig};
use colored::Colorize;

/// A loaded manifest with its graph built, ready to answer queries.
pub struct Session {
    pub graph: AssetGraph,
    pub json: bool,
}

impl Session {
    /// Load configuration and manifest, then run the initial full scan.
    pub async fn open(manifest: &Path, config: Option<&Path>, json: bool) -> anyhow::Result<Self> {
        let config = match config {
            Some(path) => EngineConfig::load(path)
                .await
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => EngineConfig::default(),
        };

        let (catalogue, warnings) = load_manifest(manifest)
            .await
            .with_context(|| format!("failed to load manifest {}", manifest.display()))?;
        for warning in &warnings {
            eprintln!("{}: {warning}", "warning".yellow().bold());
        }

        let graph = AssetGraph::start(Arc::new(catalogue), config)?;
        let report = graph.full_scan().await?;
        tracing::info!(
            assets = report.listed,
            stale = report.stale,
            epoch = report.epoch,
            "Graph built"
        );

        Ok(Self { graph, json })
    }

    /// Stop the builder worker.
    pub async fn close(self) -> anyhow::Result<()> {
        self.graph.shutdown().await?;
        Ok(())
    }
}

/// Parse an asset identifier given on the command line.
pub fn parse_asset(raw: &str) -> anyhow::Result<AssetId> {
    AssetId::from_str(raw).with_context(|| format!("invalid asset identifier '{raw}'"))
}

/// Kinds from repeated `--kind` flags, or the default set when none are given.
pub fn kinds_or_default(kinds: &[ReferenceKind]) -> ReferenceKinds {
    if kinds.is_empty() {
        ReferenceKinds::default()
    } else {
        ReferenceKinds::of(kinds.iter().copied())
    }
}

/// Print a value as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
