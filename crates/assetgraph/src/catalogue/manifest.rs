//! JSONL asset manifest loading.
//!
//! A manifest is one JSON object per line:
//!
//! ```text
//! {"package":"/Game/Props/Crate","name":"Crate","type":"StaticMesh","references":[{"package":"/Game/Props/Wood","name":"Wood","kind":"hard"}]}
//! ```
//!
//! `exists` defaults to `true`, `references` to empty and a reference `kind` to
//! `hard`. Loading is resilient: malformed lines and duplicate assets are
//! reported as [`ManifestWarning`]s and skipped, never aborting the load.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::InMemoryCatalogue;
use crate::domain::{AssetId, ReferenceKind};
use crate::error::Result;

#[derive(Debug, Deserialize)]
struct AssetLine {
    package: String,
    name: String,
    #[serde(rename = "type")]
    asset_type: String,
    #[serde(default = "default_exists")]
    exists: bool,
    #[serde(default)]
    references: Vec<ReferenceLine>,
}

#[derive(Debug, Deserialize)]
struct ReferenceLine {
    package: String,
    name: String,
    #[serde(default = "default_kind")]
    kind: ReferenceKind,
}

fn default_exists() -> bool {
    true
}

fn default_kind() -> ReferenceKind {
    ReferenceKind::Hard
}

/// Non-fatal problem found while loading a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestWarning {
    /// Line could not be parsed as an asset record; it was skipped.
    MalformedJson {
        /// 1-based line number
        line_number: usize,
        /// Parser message
        error: String,
    },

    /// The asset was already defined earlier in the file; the first record wins.
    DuplicateAsset {
        /// 1-based line number of the duplicate
        line_number: usize,
        /// The repeated asset
        asset: AssetId,
    },
}

impl std::fmt::Display for ManifestWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedJson { line_number, error } => {
                write!(f, "line {line_number}: malformed record: {error}")
            }
            Self::DuplicateAsset { line_number, asset } => {
                write!(f, "line {line_number}: duplicate asset {asset}")
            }
        }
    }
}

/// Load a JSONL manifest into an [`InMemoryCatalogue`].
///
/// Assets are seeded without emitting change events; run a full scan on the
/// builder afterwards to populate the graph.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be opened or read. Bad lines only
/// produce warnings.
pub async fn load_manifest(path: &Path) -> Result<(InMemoryCatalogue, Vec<ManifestWarning>)> {
    let file = File::open(path).await?;
    let mut lines = BufReader::new(file).lines();

    let catalogue = InMemoryCatalogue::new();
    let mut warnings = Vec::new();
    let mut seen = HashSet::new();
    let mut line_number = 0;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: AssetLine = match serde_json::from_str(trimmed) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(line_number, error = %e, "Skipping malformed manifest line");
                warnings.push(ManifestWarning::MalformedJson {
                    line_number,
                    error: e.to_string(),
                });
                continue;
            }
        };

        let id = AssetId::new(record.package, record.name);
        if !seen.insert(id.clone()) {
            warnings.push(ManifestWarning::DuplicateAsset {
                line_number,
                asset: id,
            });
            continue;
        }

        let references = record
            .references
            .into_iter()
            .map(|r| (AssetId::new(r.package, r.name), r.kind))
            .collect();
        catalogue.seed_asset(id, record.asset_type, record.exists, references);
    }

    tracing::info!(
        path = %path.display(),
        assets = catalogue.len(),
        warnings = warnings.len(),
        "Loaded asset manifest"
    );

    Ok((catalogue, warnings))
}
