#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Big-key analysis pipeline.
///
/// [`Analyzer`](analyzer::Analyzer) walks the keyspace with the scanner,
/// inspects every key and keeps the ones above the size threshold.
pub mod analyzer;

/// Ranking, per-type aggregation and remediation advice.
pub mod classify;

/// Pooled client with retry on every command.
pub mod client;

/// YAML settings for both tools.
pub mod config;

/// JSON export of analysis results.
pub mod export;

/// Per-key size probe.
pub mod inspect;

/// Cursor-driven keyspace iteration.
pub mod scan;

/// Load simulation and connectivity monitoring.
pub mod workflow;

pub use analyzer::{AnalysisConfig, AnalysisReport, Analyzer};
pub use classify::{
    Advice, Recommender, Severity, Thresholds, TypeAggregate, aggregate, classify, general_advice,
};
pub use client::ResilientClient;
pub use config::{ClientConfig, ConfigError, Settings};
pub use export::{ExportError, ExportedKey, export_json, write_json};
pub use inspect::Inspector;
pub use scan::KeyScanner;
pub use workflow::{
    LoadConfig, LoadReport, MonitorConfig, MonitorReport, counter_key, monitor, simulate_load,
};

pub use keyward_core::{
    Expiry, KeyPattern, KeyRecord, KeyType, MaxAttempts, RetryError, StoreError, StoreResult,
};

#[cfg(feature = "redis")]
#[cfg_attr(docsrs, doc(cfg(feature = "redis")))]
pub use keyward_redis as redis;
