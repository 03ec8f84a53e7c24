//! Error types for assetgraph operations.
//!
//! Errors are split the same way the engine degrades:
//!
//! - **`Error`**: Top-level errors returned to callers (invalid requests,
//!   configuration and I/O failures, explicit catalogue calls)
//! - **`CatalogueError`**: Adapter failures. The builder absorbs these by
//!   marking the affected node stale; they never surface from a query.
//!
//! ## Error Philosophy
//!
//! Conditions a caller can reasonably expect are reported as data rather than
//! errors:
//! - A root that is not in the graph shows up in `QueryResult::unknown_roots`
//! - A depth or visit budget cut-off is a flag on the result
//! - A missing asset is a node with `exists == false`
//!
//! Only a structurally invalid request is rejected outright.

use thiserror::Error;

use crate::domain::AssetId;

/// Result type for assetgraph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for assetgraph operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The request can never be answered (negative depth, zero budget, ...)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A direct catalogue call failed
    #[error("catalogue error: {0}")]
    Catalogue(#[from] CatalogueError),

    /// Invalid configuration or arguments
    #[error("configuration error: {0}")]
    Config(String),

    /// File system operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML encoding or decoding failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Internal invariant broken (poisoned lock, worker gone)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Failure reported by a catalogue adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogueError {
    /// The catalogue could not be reached or could not read the asset.
    ///
    /// Treated as transient: the node is marked stale and retried.
    #[error("catalogue unavailable for {asset}: {reason}")]
    Unavailable {
        /// Asset whose data could not be fetched
        asset: AssetId,
        /// Human-readable cause
        reason: String,
    },

    /// The catalogue has no record of the asset.
    #[error("asset not in catalogue: {0}")]
    UnknownAsset(AssetId),
}

impl CatalogueError {
    /// Create an `Unavailable` error for an asset.
    #[must_use]
    pub fn unavailable(asset: AssetId, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            asset,
            reason: reason.into(),
        }
    }

    /// Returns `true` if retrying later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
