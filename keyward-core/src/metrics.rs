//! Metrics for retries, pooling and keyspace analysis.
//!
//! Enable the `metrics` feature to emit these metrics; without it every
//! `record_*` function is an inlined no-op.
//!
//! ## Naming Pattern
//!
//! All metrics follow the pattern: `keyward_{component}_{event}_{metric_type}`
//!
//! - `keyward_retry_*` - retry executor metrics
//! - `keyward_pool_*` - connection pool metrics
//! - `keyward_analysis_*` - big-key analysis metrics

use std::time::Duration;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    // Retry metrics

    /// Metric name for retried attempts counter.
    pub static ref RETRY_ATTEMPTS: &'static str = {
        metrics::describe_counter!(
            "keyward_retry_attempts_total",
            "Total number of failed attempts followed by a retry."
        );
        "keyward_retry_attempts_total"
    };

    /// Metric name for exhausted operations counter.
    pub static ref RETRY_EXHAUSTED: &'static str = {
        metrics::describe_counter!(
            "keyward_retry_exhausted_total",
            "Total number of operations that ran out of attempts."
        );
        "keyward_retry_exhausted_total"
    };

    // Pool metrics

    /// Metric name for lease wait duration histogram.
    pub static ref POOL_ACQUIRE_DURATION: &'static str = {
        metrics::describe_histogram!(
            "keyward_pool_acquire_duration_seconds",
            metrics::Unit::Seconds,
            "Time spent waiting for a pooled connection."
        );
        "keyward_pool_acquire_duration_seconds"
    };

    /// Metric name for pool exhaustion counter.
    pub static ref POOL_EXHAUSTED: &'static str = {
        metrics::describe_counter!(
            "keyward_pool_exhausted_total",
            "Total number of acquisitions that timed out."
        );
        "keyward_pool_exhausted_total"
    };

    /// Metric name for discarded connections counter.
    pub static ref POOL_DISCARDED: &'static str = {
        metrics::describe_counter!(
            "keyward_pool_discarded_total",
            "Total number of connections dropped after a failed health check or fault."
        );
        "keyward_pool_discarded_total"
    };

    // Analysis metrics

    /// Metric name for scanned keys counter.
    pub static ref ANALYSIS_KEYS_SCANNED: &'static str = {
        metrics::describe_counter!(
            "keyward_analysis_keys_scanned_total",
            "Total number of key names yielded by the keyspace scanner."
        );
        "keyward_analysis_keys_scanned_total"
    };

    /// Metric name for inspected keys counter.
    pub static ref ANALYSIS_KEYS_INSPECTED: &'static str = {
        metrics::describe_counter!(
            "keyward_analysis_keys_inspected_total",
            "Total number of keys probed successfully."
        );
        "keyward_analysis_keys_inspected_total"
    };

    /// Metric name for skipped keys counter.
    pub static ref ANALYSIS_KEYS_SKIPPED: &'static str = {
        metrics::describe_counter!(
            "keyward_analysis_keys_skipped_total",
            "Total number of keys whose inspection failed."
        );
        "keyward_analysis_keys_skipped_total"
    };

    /// Metric name for big keys counter.
    pub static ref ANALYSIS_BIG_KEYS: &'static str = {
        metrics::describe_counter!(
            "keyward_analysis_big_keys_total",
            "Total number of keys above the size threshold."
        );
        "keyward_analysis_big_keys_total"
    };
}

// Retry metrics

/// Record a failed attempt that will be retried.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_retry(operation: &str) {
    metrics::counter!(*RETRY_ATTEMPTS, "command" => command_of(operation)).increment(1);
}

/// Record a retried attempt (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_retry(_operation: &str) {}

/// Record an operation that ran out of attempts.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_retry_exhausted(operation: &str) {
    metrics::counter!(*RETRY_EXHAUSTED, "command" => command_of(operation)).increment(1);
}

/// Record an exhausted operation (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_retry_exhausted(_operation: &str) {}

// Pool metrics

/// Record time spent waiting for a lease.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_acquire(duration: Duration) {
    metrics::histogram!(*POOL_ACQUIRE_DURATION).record(duration.as_secs_f64());
}

/// Record lease wait (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_acquire(_duration: Duration) {}

/// Record an acquisition that timed out.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_pool_exhausted() {
    metrics::counter!(*POOL_EXHAUSTED).increment(1);
}

/// Record pool exhaustion (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_pool_exhausted() {}

/// Record a discarded connection.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_discarded() {
    metrics::counter!(*POOL_DISCARDED).increment(1);
}

/// Record a discarded connection (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_discarded() {}

// Analysis metrics

/// Record a key name yielded by the scanner.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_key_scanned() {
    metrics::counter!(*ANALYSIS_KEYS_SCANNED).increment(1);
}

/// Record a scanned key (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_key_scanned() {}

/// Record a key probed successfully.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_key_inspected() {
    metrics::counter!(*ANALYSIS_KEYS_INSPECTED).increment(1);
}

/// Record an inspected key (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_key_inspected() {}

/// Record a key whose inspection failed.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_key_skipped() {
    metrics::counter!(*ANALYSIS_KEYS_SKIPPED).increment(1);
}

/// Record a skipped key (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_key_skipped() {}

/// Record a key above the size threshold.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_big_key(key_type: &str) {
    metrics::counter!(*ANALYSIS_BIG_KEYS, "type" => key_type.to_string()).increment(1);
}

/// Record a big key (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_big_key(_key_type: &str) {}

#[cfg(feature = "metrics")]
fn command_of(operation: &str) -> String {
    operation
        .split_whitespace()
        .next()
        .unwrap_or(operation)
        .to_string()
}
