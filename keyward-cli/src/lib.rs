#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use keyward::{AnalysisReport, Settings};

pub mod report;

/// Installs the `fmt` subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Settings from `path`, or the defaults when no file was given.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    match path {
        Some(path) => Settings::load(path).context("loading configuration"),
        None => Ok(Settings::default()),
    }
}

/// Fails when the analysis stopped early because the keyspace scan kept
/// failing. Partial results are still printed before this is checked.
pub fn ensure_complete(report: &AnalysisReport) -> anyhow::Result<()> {
    match &report.interrupted {
        Some(reason) => bail!("analysis incomplete, scan failed: {reason}"),
        None => Ok(()),
    }
}

/// Parses human durations such as `300s`, `5m` or `1h 30m`.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}

/// Resolves when the process receives Ctrl-C.
pub async fn ctrl_c() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "Cannot listen for Ctrl-C, running until the time budget ends");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(parse_duration("300s"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn interrupted_analysis_is_an_error() {
        let mut report = AnalysisReport {
            scanned: 5,
            inspected: 5,
            skipped: 0,
            big_keys: Vec::new(),
            by_type: Default::default(),
            elapsed: Duration::from_secs(1),
            truncated: false,
            interrupted: None,
        };
        assert!(ensure_complete(&report).is_ok());

        report.interrupted = Some("SCAN 10 MATCH * failed after 5 attempt(s)".to_owned());
        let error = ensure_complete(&report).unwrap_err();
        assert!(error.to_string().contains("SCAN 10 MATCH *"));
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        assert_eq!(load_settings(None).unwrap(), Settings::default());
        assert!(load_settings(Some(Path::new("/nonexistent/keyward.yaml"))).is_err());
    }
}
