//! Retry executor for remote operations.
//!
//! [`Retry`] runs an operation, sleeping according to a [`BackoffPolicy`]
//! between attempts that fail with a transient [`StoreError`]. Non-transient
//! failures are surfaced immediately.
//!
//! Every call to [`Retry::execute`] keeps its own attempt counter, so one
//! executor can be shared by any number of concurrent operation streams.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bounded_integer::bounded_integer;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::backoff::{BackoffConfig, BackoffPolicy};
use crate::error::StoreError;
use crate::metrics;

bounded_integer! {
    /// Attempt budget for one logical operation (1-1000).
    /// A value of 1 means the operation runs exactly once.
    #[repr(u16)]
    pub struct MaxAttempts { 1..=1000 }
}

impl Default for MaxAttempts {
    fn default() -> Self {
        Self::new(5).unwrap_or(Self::MIN)
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Default)]
pub struct RetryConfig {
    /// Total attempts per operation, including the first one.
    #[serde(default)]
    pub max_attempts: MaxAttempts,
    /// Delay schedule between attempts.
    #[serde(default)]
    pub backoff: BackoffConfig,
}

/// Failure of a retried operation.
///
/// Both variants carry the operation label (command and key) so messages
/// always name what failed.
#[derive(Debug, Error)]
pub enum RetryError {
    /// Every attempt failed with a transient error; holds the last one.
    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    Exhausted {
        /// Operation label, e.g. `GET counter:ab:visits`.
        operation: SmolStr,
        /// Attempts performed.
        attempts: u32,
        /// Error of the final attempt.
        #[source]
        source: StoreError,
    },

    /// A non-transient error; not retried.
    #[error("{operation} failed: {source}")]
    Fatal {
        /// Operation label, e.g. `SET cache:ab:data_1`.
        operation: SmolStr,
        /// Error that stopped the operation.
        #[source]
        source: StoreError,
    },
}

impl RetryError {
    /// Label of the failed operation.
    pub fn operation(&self) -> &str {
        match self {
            Self::Exhausted { operation, .. } | Self::Fatal { operation, .. } => operation,
        }
    }

    /// Underlying store error.
    pub fn store_error(&self) -> &StoreError {
        match self {
            Self::Exhausted { source, .. } | Self::Fatal { source, .. } => source,
        }
    }

    /// Number of attempts performed before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::Fatal { .. } => 1,
        }
    }
}

/// Observability hook invoked by [`Retry`].
///
/// The executor itself keeps no logging state; everything it wants to report
/// goes through this trait.
pub trait RetryObserver: Send + Sync {
    /// Attempt number `attempt` (1-based) failed and the executor will sleep
    /// for `delay` before the next one.
    fn on_retry(&self, operation: &str, attempt: u32, delay: Duration, error: &StoreError);

    /// The operation succeeded on attempt `attempts` after at least one retry.
    fn on_recovered(&self, _operation: &str, _attempts: u32) {}

    /// The attempt budget ran out.
    fn on_exhausted(&self, _operation: &str, _attempts: u32, _error: &StoreError) {}
}

/// Observer that reports through `tracing` (and `metrics` when enabled).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RetryObserver for TracingObserver {
    fn on_retry(&self, operation: &str, attempt: u32, delay: Duration, error: &StoreError) {
        warn!(
            operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            %error,
            "Attempt failed, retrying"
        );
        metrics::record_retry(operation);
    }

    fn on_recovered(&self, operation: &str, attempts: u32) {
        info!(operation, attempts, "Operation succeeded after retry");
    }

    fn on_exhausted(&self, operation: &str, attempts: u32, error: &StoreError) {
        error!(operation, attempts, %error, "All attempts failed");
        metrics::record_retry_exhausted(operation);
    }
}

/// Executes operations with retry on transient failures.
#[derive(Clone)]
pub struct Retry {
    policy: BackoffPolicy,
    max_attempts: MaxAttempts,
    observer: Arc<dyn RetryObserver>,
}

impl std::fmt::Debug for Retry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retry")
            .field("policy", &self.policy)
            .field("max_attempts", &self.max_attempts)
            .field("observer", &"...")
            .finish()
    }
}

impl Default for Retry {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<RetryConfig> for Retry {
    fn from(config: RetryConfig) -> Self {
        Self::builder()
            .max_attempts(config.max_attempts)
            .backoff(config.backoff.into())
            .build()
    }
}

impl Retry {
    /// Creates a new [`RetryBuilder`].
    pub fn builder() -> RetryBuilder {
        RetryBuilder::default()
    }

    /// Attempt budget.
    pub fn max_attempts(&self) -> MaxAttempts {
        self.max_attempts
    }

    /// Backoff policy used between attempts.
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Runs `op` until it succeeds, fails fatally, or the budget is spent.
    ///
    /// The first attempt starts immediately. After failed attempt `n`
    /// (zero-based) the executor sleeps for `policy.delay(n)`; there is no
    /// sleep after the final attempt.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: impl Into<SmolStr>,
        mut op: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let operation = operation.into();
        let max_attempts = u32::from(self.max_attempts.get());
        let mut attempt: u32 = 0;

        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        self.observer.on_recovered(&operation, attempt + 1);
                    }
                    return Ok(value);
                }
                Err(source) if !source.is_transient() => {
                    return Err(RetryError::Fatal { operation, source });
                }
                Err(source) => {
                    let failed = attempt;
                    attempt += 1;
                    if attempt >= max_attempts {
                        self.observer.on_exhausted(&operation, attempt, &source);
                        return Err(RetryError::Exhausted {
                            operation,
                            attempts: attempt,
                            source,
                        });
                    }
                    let delay = self.policy.delay(failed);
                    self.observer.on_retry(&operation, attempt, delay, &source);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Builder for [`Retry`].
pub struct RetryBuilder {
    policy: BackoffPolicy,
    max_attempts: MaxAttempts,
    observer: Arc<dyn RetryObserver>,
}

impl Default for RetryBuilder {
    fn default() -> Self {
        Self {
            policy: BackoffPolicy::default(),
            max_attempts: MaxAttempts::default(),
            observer: Arc::new(TracingObserver),
        }
    }
}

impl RetryBuilder {
    /// Set the attempt budget.
    pub fn max_attempts(self, max_attempts: MaxAttempts) -> Self {
        Self {
            max_attempts,
            ..self
        }
    }

    /// Set the backoff policy.
    pub fn backoff(self, policy: BackoffPolicy) -> Self {
        Self { policy, ..self }
    }

    /// Set the observer that receives retry events.
    pub fn observer(self, observer: Arc<dyn RetryObserver>) -> Self {
        Self { observer, ..self }
    }

    /// Build the executor.
    pub fn build(self) -> Retry {
        Retry {
            policy: self.policy,
            max_attempts: self.max_attempts,
            observer: self.observer,
        }
    }
}
