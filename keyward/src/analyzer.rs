//! Big-key analysis: scan, inspect, rank.

use std::time::Duration;

use indexmap::IndexMap;
use keyward_core::{
    Connection, KeyPattern, KeyRecord, KeyType, MEBIBYTE, Manager, StoreError, metrics,
};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::classify::{Advice, Recommender, Thresholds, TypeAggregate, aggregate, classify};
use crate::client::ResilientClient;
use crate::inspect::Inspector;
use crate::scan::KeyScanner;

const PROGRESS_EVERY: usize = 100;

/// What to scan and what counts as big.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Glob-style key pattern passed to `SCAN MATCH`.
    pub pattern: String,
    /// `COUNT` hint for each `SCAN` call.
    pub batch_size: usize,
    /// Maximum number of key names to visit.
    pub max_keys: usize,
    /// Keys of at least this many mebibytes are reported.
    pub min_size_mb: f64,
    /// Limits for per-key advice.
    pub thresholds: Thresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pattern: "*".to_owned(),
            batch_size: 100,
            max_keys: 1000,
            min_size_mb: 0.1,
            thresholds: Thresholds::default(),
        }
    }
}

/// Outcome of one analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Key names visited.
    pub scanned: usize,
    /// Keys that produced a record (big or not).
    pub inspected: usize,
    /// Keys skipped because the probe failed or the key vanished.
    pub skipped: usize,
    /// Big keys, largest first.
    pub big_keys: Vec<KeyRecord>,
    /// Big keys grouped by type.
    pub by_type: IndexMap<KeyType, TypeAggregate>,
    /// Wall time of the run.
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    /// The key budget ran out before the scan completed.
    pub truncated: bool,
    /// Set when a `SCAN` failure stopped the run early; results gathered
    /// up to that point are kept.
    pub interrupted: Option<String>,
}

impl AnalysisReport {
    /// Combined size of all big keys in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.big_keys.iter().map(|r| r.size_bytes).sum()
    }

    /// Combined size of all big keys in mebibytes.
    pub fn total_mb(&self) -> f64 {
        self.total_bytes() as f64 / MEBIBYTE as f64
    }

    /// The `n` largest keys.
    pub fn top(&self, n: usize) -> &[KeyRecord] {
        &self.big_keys[..n.min(self.big_keys.len())]
    }
}

/// Drives the scan → inspect → classify pipeline.
pub struct Analyzer<'a, M: Manager> {
    client: &'a ResilientClient<M>,
    config: AnalysisConfig,
    recommender: Recommender,
}

impl<'a, M> Analyzer<'a, M>
where
    M: Manager,
    M::Connection: Connection,
{
    /// Analyzer over `client` with `config`.
    pub fn new(client: &'a ResilientClient<M>, config: AnalysisConfig) -> Self {
        let recommender = Recommender::new(config.thresholds);
        Self {
            client,
            config,
            recommender,
        }
    }

    /// Settings in use.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Advice for one record under the configured thresholds.
    pub fn recommend(&self, record: &KeyRecord) -> Vec<Advice> {
        self.recommender.recommend(record)
    }

    /// Scans up to `max_keys` names and returns the big keys among them.
    ///
    /// Fails only on an invalid pattern. A `SCAN` that keeps failing after
    /// retries ends the run with [`AnalysisReport::interrupted`] set.
    pub async fn run(&self) -> Result<AnalysisReport, StoreError> {
        let pattern = KeyPattern::new(&self.config.pattern)?;
        let span = info_span!(
            "analysis",
            pattern = %self.config.pattern,
            max_keys = self.config.max_keys,
        );
        self.run_inner(pattern).instrument(span).await
    }

    async fn run_inner(&self, pattern: KeyPattern) -> Result<AnalysisReport, StoreError> {
        let config = &self.config;
        info!(min_size_mb = config.min_size_mb, "Searching for big keys");

        let started = Instant::now();
        let inspector = Inspector::new(self.client);
        let mut scanner = KeyScanner::new(self.client, pattern, config.batch_size, config.max_keys);
        let mut records = Vec::new();
        let mut inspected = 0;
        let mut skipped = 0;
        let mut interrupted = None;

        while let Some(next) = scanner.next_key().await {
            let name = match next {
                Ok(name) => name,
                Err(error) => {
                    error!(%error, "Scan failed, keeping partial results");
                    interrupted = Some(error.to_string());
                    break;
                }
            };

            match inspector.inspect(&name).await {
                Some(record) => {
                    inspected += 1;
                    if record.size_mb() >= config.min_size_mb {
                        debug!(key = %record.name, size_bytes = record.size_bytes, "Big key");
                        metrics::record_big_key(record.key_type.as_str());
                        records.push(record);
                    }
                }
                None => skipped += 1,
            }

            if scanner.yielded() % PROGRESS_EVERY == 0 {
                info!(scanned = scanner.yielded(), "Analysis progress");
            }
        }

        let truncated = scanner.hit_limit();
        if truncated {
            warn!(max_keys = config.max_keys, "Key limit reached");
        }

        let by_type = aggregate(&records);
        let big_keys = classify(records);
        let report = AnalysisReport {
            scanned: scanner.yielded(),
            inspected,
            skipped,
            big_keys,
            by_type,
            elapsed: started.elapsed(),
            truncated,
            interrupted,
        };
        info!(
            big_keys = report.big_keys.len(),
            scanned = report.scanned,
            "Analysis finished"
        );
        Ok(report)
    }
}
