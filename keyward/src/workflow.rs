//! Failover drills: synthetic application load and connectivity monitoring.
//!
//! Both workflows run one cycle at a time against a [`ResilientClient`] and
//! stop when their time budget runs out or the `shutdown` future completes.
//! The stop signal is checked between cycles, so a command that is already
//! running (including its retries) always finishes.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use keyward_core::{Connection, Manager, RetryError};
use serde::Serialize;
use smol_str::SmolStr;
use tokio::time::Instant;
use tracing::{Instrument, error, info, info_span};

use crate::client::ResilientClient;

const PROGRESS_EVERY: u64 = 50;
const CACHE_EXPIRY: Duration = Duration::from_secs(300);
const SESSION_IP: &str = "192.168.1.100";

/// Load simulation settings.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    identifier: SmolStr,
    duration: Duration,
    interval: Duration,
}

impl LoadConfig {
    /// Load for `identifier`, which namespaces every key written.
    pub fn new(identifier: impl Into<SmolStr>) -> Self {
        Self {
            identifier: identifier.into(),
            duration: Duration::from_secs(300),
            interval: Duration::from_secs(1),
        }
    }

    /// Set total run time (default 300s).
    pub fn duration(self, duration: Duration) -> Self {
        Self { duration, ..self }
    }

    /// Set pause between cycles (default 1s).
    pub fn interval(self, interval: Duration) -> Self {
        Self { interval, ..self }
    }
}

/// Result of a load simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoadReport {
    /// Wall time of the run.
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    /// Commands attempted.
    pub operations: u64,
    /// Commands that failed after retries.
    pub errors: u64,
}

impl LoadReport {
    /// Share of commands that succeeded, in percent. `0.0` when nothing ran.
    pub fn success_rate(&self) -> f64 {
        if self.operations == 0 {
            0.0
        } else {
            (self.operations - self.errors) as f64 / self.operations as f64 * 100.0
        }
    }
}

/// Runs the application-like workload until `config.duration` elapses or
/// `shutdown` completes.
///
/// Each cycle issues, in order: `PING`, `INCR counter:<id>:visits`, three
/// `HSET`s on `session:<id>:<ts>`, `SET cache:<id>:data_<ts % 100>` with a
/// 300s expiry, `GET` of that key and `HGETALL` of the session. A command
/// that fails after retries counts as one error and ends its cycle; the
/// next cycle starts after the usual pause.
pub async fn simulate_load<M, S>(
    client: &ResilientClient<M>,
    config: &LoadConfig,
    shutdown: S,
) -> LoadReport
where
    M: Manager,
    M::Connection: Connection,
    S: Future<Output = ()>,
{
    let span = info_span!("load_simulation", identifier = %config.identifier);
    async move {
        info!(duration = ?config.duration, "Starting load simulation");
        let started = Instant::now();
        let mut report = LoadReport {
            elapsed: Duration::ZERO,
            operations: 0,
            errors: 0,
        };
        let mut next_progress = PROGRESS_EVERY;
        tokio::pin!(shutdown);

        while started.elapsed() < config.duration {
            match run_cycle(client, &config.identifier, &mut report.operations).await {
                Ok(visits) if report.operations >= next_progress => {
                    info!(operations = report.operations, visits, "Load progress");
                }
                Ok(_) => {}
                Err(error) => {
                    report.errors += 1;
                    error!(%error, "Operation failed");
                }
            }
            if report.operations >= next_progress {
                next_progress = (report.operations / PROGRESS_EVERY + 1) * PROGRESS_EVERY;
            }

            tokio::select! {
                () = &mut shutdown => {
                    info!("Stop requested");
                    break;
                }
                () = tokio::time::sleep(config.interval) => {}
            }
        }

        report.elapsed = started.elapsed();
        info!(
            elapsed = ?report.elapsed,
            operations = report.operations,
            errors = report.errors,
            success_rate = report.success_rate(),
            "Load simulation finished"
        );
        report
    }
    .instrument(span)
    .await
}

async fn run_cycle<M>(
    client: &ResilientClient<M>,
    identifier: &str,
    operations: &mut u64,
) -> Result<i64, RetryError>
where
    M: Manager,
    M::Connection: Connection,
{
    let timestamp = unix_timestamp();
    let counter = counter_key(identifier);
    let session = format!("session:{identifier}:{timestamp}");
    let cache = format!("cache:{identifier}:data_{}", timestamp % 100);

    *operations += 1;
    client.ping().await?;
    *operations += 1;
    let visits = client.incr(&counter).await?;

    *operations += 1;
    client
        .hset(&session, "user_id", &format!("user_{}", timestamp % 1000))
        .await?;
    *operations += 1;
    client
        .hset(&session, "login_time", &timestamp.to_string())
        .await?;
    *operations += 1;
    client.hset(&session, "ip", SESSION_IP).await?;

    *operations += 1;
    client
        .set(&cache, &format!("cached_data_{timestamp}"), Some(CACHE_EXPIRY))
        .await?;
    *operations += 1;
    client.get(&cache).await?;
    *operations += 1;
    client.hgetall(&session).await?;

    Ok(visits)
}

/// Connectivity monitor settings.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    identifier: SmolStr,
    interval: Duration,
}

impl MonitorConfig {
    /// Monitor reading the visit counter of `identifier`.
    pub fn new(identifier: impl Into<SmolStr>) -> Self {
        Self {
            identifier: identifier.into(),
            interval: Duration::from_secs(5),
        }
    }

    /// Set pause between polls (default 5s).
    pub fn interval(self, interval: Duration) -> Self {
        Self { interval, ..self }
    }
}

/// Result of a monitoring session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonitorReport {
    /// Wall time of the session.
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    /// Polls performed.
    pub polls: u64,
    /// Polls that failed.
    pub failures: u64,
}

/// Polls the node until `shutdown` completes: `PING`, then `GET` of the
/// visit counter written by [`simulate_load`].
pub async fn monitor<M, S>(
    client: &ResilientClient<M>,
    config: &MonitorConfig,
    shutdown: S,
) -> MonitorReport
where
    M: Manager,
    M::Connection: Connection,
    S: Future<Output = ()>,
{
    let span = info_span!("monitor", identifier = %config.identifier);
    async move {
        info!(interval = ?config.interval, "Starting continuous monitoring");
        let started = Instant::now();
        let counter = counter_key(&config.identifier);
        let mut report = MonitorReport {
            elapsed: Duration::ZERO,
            polls: 0,
            failures: 0,
        };
        tokio::pin!(shutdown);

        loop {
            report.polls += 1;
            match poll(client, &counter).await {
                Ok(visits) => info!(visits = %visits, "Connected"),
                Err(error) => {
                    report.failures += 1;
                    error!(%error, "Connectivity check failed");
                }
            }

            tokio::select! {
                () = &mut shutdown => break,
                () = tokio::time::sleep(config.interval) => {}
            }
        }

        report.elapsed = started.elapsed();
        info!(
            polls = report.polls,
            failures = report.failures,
            "Monitoring stopped"
        );
        report
    }
    .instrument(span)
    .await
}

async fn poll<M>(client: &ResilientClient<M>, counter: &str) -> Result<String, RetryError>
where
    M: Manager,
    M::Connection: Connection,
{
    client.ping().await?;
    Ok(client
        .get(counter)
        .await?
        .unwrap_or_else(|| "0".to_owned()))
}

/// Key holding the visit counter of `identifier`.
pub fn counter_key(identifier: &str) -> String {
    format!("counter:{identifier}:visits")
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
