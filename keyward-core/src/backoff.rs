//! Exponential backoff with jitter.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for [`BackoffPolicy`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct BackoffConfig {
    /// Base time unit; attempt `n` waits `unit * (2^n + jitter)` (e.g. "1s", "100ms").
    #[serde(default = "default_unit", with = "humantime_serde")]
    pub unit: Duration,
    /// Upper bound for a single delay. `None` disables the cap.
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Option<Duration>,
}

fn default_unit() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Option<Duration> {
    Some(Duration::from_secs(30))
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            unit: default_unit(),
            max_delay: default_max_delay(),
        }
    }
}

/// Computes the wait before the next attempt.
///
/// The delay for zero-based attempt `a` is `unit * (2^a + j)` with `j` drawn
/// uniformly from `[0, 1)`, clamped to `max_delay`. The policy holds no
/// per-operation state and may be shared freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    unit: Duration,
    max_delay: Option<Duration>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(BackoffConfig::default())
    }
}

impl From<BackoffConfig> for BackoffPolicy {
    fn from(config: BackoffConfig) -> Self {
        Self {
            unit: config.unit,
            max_delay: config.max_delay,
        }
    }
}

impl BackoffPolicy {
    /// Policy with the given unit and no cap.
    pub fn new(unit: Duration) -> Self {
        Self {
            unit,
            max_delay: None,
        }
    }

    /// Sets the delay ceiling.
    pub fn max_delay(self, max_delay: impl Into<Option<Duration>>) -> Self {
        Self {
            max_delay: max_delay.into(),
            ..self
        }
    }

    /// Base time unit.
    pub fn unit(&self) -> Duration {
        self.unit
    }

    /// Delay for `attempt` with a freshly drawn jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with_jitter(attempt, rand::random::<f64>())
    }

    /// Delay for `attempt` with an explicit jitter in `[0, 1)`.
    ///
    /// Values outside that range are clamped into it.
    pub fn delay_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        let jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let ceiling = self.max_delay.unwrap_or(Duration::MAX);
        let unit = self.unit.as_nanos();
        let Some(base) = 1u128
            .checked_shl(attempt)
            .and_then(|factor| factor.checked_mul(unit))
        else {
            return ceiling;
        };
        // floored and kept strictly below one unit
        let spread = ((unit as f64 * jitter) as u128).min(unit.saturating_sub(1));
        base.checked_add(spread)
            .and_then(from_nanos)
            .map_or(ceiling, |delay| delay.min(ceiling))
    }
}

fn from_nanos(nanos: u128) -> Option<Duration> {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    let secs = u64::try_from(nanos / NANOS_PER_SEC).ok()?;
    Some(Duration::new(secs, (nanos % NANOS_PER_SEC) as u32))
}
