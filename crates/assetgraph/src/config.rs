//! Engine configuration.
//!
//! Loaded from an optional YAML file; every key has a default, so an empty
//! file (or no file) is a valid configuration.
//!
//! ```yaml
//! visit-budget: 100000
//! cache-capacity: 256
//! retry-interval-ms: 5000
//! default-max-depth: 8
//! exclude-native-packages: true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::error::{Error, Result};
use crate::query::DEFAULT_VISIT_BUDGET;

/// Default number of cached query results
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Default delay between stale-node retries, in milliseconds
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 5_000;

/// Tuning knobs for an [`AssetGraph`](crate::engine::AssetGraph).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EngineConfig {
    /// Most assets any single query may visit
    pub visit_budget: usize,

    /// Most query results kept in the cache (0 disables the cache)
    pub cache_capacity: usize,

    /// Delay between stale-node retries
    pub retry_interval_ms: u64,

    /// Depth limit applied by the CLI when none is given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_max_depth: Option<u32>,

    /// Skip engine-native packages in CLI queries unless asked otherwise
    pub exclude_native_packages: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            visit_budget: DEFAULT_VISIT_BUDGET,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            default_max_depth: None,
            exclude_native_packages: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read and `Error::Config` if it
    /// is not valid configuration.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Yaml` or `Error::Io` if encoding or writing fails.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Reject settings the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for a zero visit budget or retry interval.
    pub fn validate(&self) -> Result<()> {
        if self.visit_budget == 0 {
            return Err(Error::Config("visit-budget must be at least 1".to_string()));
        }
        if self.retry_interval_ms == 0 {
            return Err(Error::Config(
                "retry-interval-ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Stale-retry interval as a [`Duration`].
    #[must_use]
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}
