//! Settings shared by the failover and big-key tools.
//!
//! Everything has a default, so an empty YAML document is a valid
//! configuration:
//!
//! ```yaml
//! client:
//!   max_attempts: 5
//!   backoff:
//!     unit: 1s
//!     max_delay: 30s
//!   pool:
//!     max_size: 10
//!     wait_timeout: 5s
//!     health_check_interval: 30s
//! analyzer:
//!   pattern: "session:*"
//!   batch_size: 100
//!   max_keys: 1000
//!   min_size_mb: 0.1
//!   thresholds:
//!     critical_bytes: 1048576
//!     warning_bytes: 102400
//!     min_ttl: 5m
//! ```

use std::path::Path;

use keyward_core::{BackoffConfig, MaxAttempts, PoolConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analyzer::AnalysisConfig;

/// Root of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Resilient client settings.
    pub client: ClientConfig,
    /// Big-key analysis settings.
    pub analyzer: AnalysisConfig,
}

/// Retry and pooling settings for [`ResilientClient`](crate::ResilientClient).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Attempts per command, including the first.
    pub max_attempts: MaxAttempts,
    /// Delay schedule between attempts.
    pub backoff: BackoffConfig,
    /// Connection pool limits.
    pub pool: PoolConfig,
}

/// Error loading a [`Settings`] file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid YAML for [`Settings`].
    #[error("invalid config {path}: {source}")]
    Parse {
        /// Path that was parsed.
        path: String,
        /// Deserialization error.
        #[source]
        source: serde_saphyr::Error,
    },
}

impl Settings {
    /// Parses settings from a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_saphyr::Error> {
        serde_saphyr::from_str(yaml)
    }

    /// Reads settings from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        Self::from_yaml(&yaml).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }
}
