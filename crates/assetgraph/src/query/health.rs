//! Dependency health classification.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use super::{TraversalRule, VisitBudget, traverse};
use crate::domain::{AssetId, ReferenceKind, ReferenceKinds};
use crate::error::Result;
use crate::store::GraphStore;

/// Overall state of an asset's dependency closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// The asset is not in the graph
    Unknown,
    /// The asset itself is missing on disk
    Missing,
    /// Some dependency reachable through hard references only is missing
    Invalid,
    /// Everything it depends on exists
    Valid,
    /// Only dependencies behind a soft (or weaker) reference are missing
    ValidWithSoftReferenceIssue,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Missing => "missing",
            Self::Invalid => "invalid",
            Self::Valid => "valid",
            Self::ValidWithSoftReferenceIssue => "valid (soft reference issues)",
        };
        f.write_str(s)
    }
}

/// Health report for one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyHealth {
    /// The assessed asset
    pub asset: AssetId,
    /// Classification
    pub status: HealthStatus,
    /// Missing assets reachable through hard references alone
    pub missing_hard: Vec<AssetId>,
    /// Missing assets only reachable through some other kind
    pub missing_other: Vec<AssetId>,
    /// Reachable assets whose last catalogue fetch failed
    pub stale: Vec<AssetId>,
    /// A budget cut the closure short, so the report may be incomplete
    pub truncated: bool,
}

/// Classify `asset` by the missing assets in its dependency closure.
///
/// The closure follows `kinds`; a missing asset counts against hard validity
/// when it is reachable through hard references alone.
///
/// # Errors
///
/// Propagates `Error::InvalidRequest` from rule validation.
pub fn assess_health(
    store: &GraphStore,
    asset: &AssetId,
    kinds: ReferenceKinds,
    budget_limit: usize,
) -> Result<DependencyHealth> {
    let mut health = DependencyHealth {
        asset: asset.clone(),
        status: HealthStatus::Unknown,
        missing_hard: Vec::new(),
        missing_other: Vec::new(),
        stale: Vec::new(),
        truncated: false,
    };

    let Some(node) = store.node(asset) else {
        return Ok(health);
    };
    if node.is_missing() {
        health.status = HealthStatus::Missing;
        return Ok(health);
    }

    let roots = std::slice::from_ref(asset);
    let full = traverse(
        store,
        roots,
        &TraversalRule::dependencies().kinds(kinds),
        &mut VisitBudget::new(budget_limit),
    )?;

    let hard_missing: BTreeSet<AssetId> = if kinds.contains(ReferenceKind::Hard) {
        traverse(
            store,
            roots,
            &TraversalRule::dependencies().kinds(ReferenceKinds::HARD),
            &mut VisitBudget::new(budget_limit),
        )?
        .missing
        .into_iter()
        .collect()
    } else {
        BTreeSet::new()
    };

    for id in &full.missing {
        if hard_missing.contains(id) {
            health.missing_hard.push(id.clone());
        } else {
            health.missing_other.push(id.clone());
        }
    }
    health.stale = full
        .assets
        .iter()
        .filter(|id| store.node(id).is_some_and(|n| n.stale))
        .cloned()
        .collect();
    health.truncated = full.truncated;

    health.status = if !health.missing_hard.is_empty() {
        HealthStatus::Invalid
    } else if !health.missing_other.is_empty() {
        HealthStatus::ValidWithSoftReferenceIssue
    } else {
        HealthStatus::Valid
    };

    tracing::debug!(asset = %asset, status = %health.status, "Dependency health assessed");
    Ok(health)
}
