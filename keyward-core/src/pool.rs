//! Bounded connection pool with leases and idle health checks.
//!
//! A [`Pool`] owns every connection it creates. Callers borrow one through a
//! [`Lease`], which returns the connection when dropped, on success and error
//! paths alike. At most `max_size` leases exist at once; further callers wait
//! up to `wait_timeout` and then fail with [`PoolError::Exhausted`].
//!
//! Idle connections that have not been used or checked for
//! `health_check_interval` are probed with [`Manager::check`] before they are
//! handed out. A connection failing the probe is dropped and replaced lazily.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::error::{StoreError, StoreResult};
use crate::metrics;

/// Creates and probes connections on behalf of a [`Pool`].
#[async_trait]
pub trait Manager: Send + Sync + 'static {
    /// Connection type handed out by the pool.
    type Connection: Send + 'static;

    /// Opens a new connection.
    async fn create(&self) -> StoreResult<Self::Connection>;

    /// Liveness probe for an idle connection.
    async fn check(&self, connection: &mut Self::Connection) -> StoreResult<()>;
}

const DEFAULT_MAX_SIZE: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(size) => size,
    None => NonZeroUsize::MIN,
};

/// Pool configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct PoolConfig {
    /// Maximum number of connections (leased and idle together).
    #[serde(default = "default_max_size")]
    pub max_size: NonZeroUsize,
    /// How long `acquire` waits for a free slot (e.g. "5s").
    #[serde(default = "default_wait_timeout", with = "humantime_serde")]
    pub wait_timeout: Duration,
    /// Idle time after which a connection is probed before reuse (e.g. "30s").
    #[serde(default = "default_health_check_interval", with = "humantime_serde")]
    pub health_check_interval: Duration,
}

fn default_max_size() -> NonZeroUsize {
    DEFAULT_MAX_SIZE
}

fn default_wait_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_health_check_interval() -> Duration {
    Duration::from_secs(30)
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            wait_timeout: default_wait_timeout(),
            health_check_interval: default_health_check_interval(),
        }
    }
}

/// Error returned by [`Pool::acquire`].
#[derive(Debug, Error)]
pub enum PoolError {
    /// All connections stayed leased for the whole wait timeout.
    #[error("no pooled connection became available within {0:?}")]
    Exhausted(Duration),

    /// Opening a fresh connection failed.
    #[error("failed to open connection: {0}")]
    Connect(#[source] StoreError),

    /// The pool was closed.
    #[error("connection pool is closed")]
    Closed,
}

impl From<PoolError> for StoreError {
    fn from(error: PoolError) -> Self {
        match error {
            PoolError::Exhausted(waited) => StoreError::Timeout(waited),
            PoolError::Connect(error) => error,
            PoolError::Closed => StoreError::Internal(Box::new(PoolError::Closed)),
        }
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Configured capacity.
    pub max_size: usize,
    /// Live connections, leased or idle.
    pub size: usize,
    /// Leases that can be handed out without waiting.
    pub available: usize,
    /// Connections sitting in the idle list.
    pub idle: usize,
}

struct Idle<C> {
    connection: C,
    checked_at: Instant,
}

struct PoolInner<M: Manager> {
    manager: M,
    config: PoolConfig,
    idle: Mutex<VecDeque<Idle<M::Connection>>>,
    semaphore: Arc<Semaphore>,
    size: AtomicUsize,
}

impl<M: Manager> PoolInner<M> {
    fn idle(&self) -> MutexGuard<'_, VecDeque<Idle<M::Connection>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn forget(&self) {
        self.size.fetch_sub(1, Ordering::Relaxed);
        metrics::record_discarded();
    }
}

/// Idle connection taken out of the list but not yet leased.
struct Checkout<'a, M: Manager> {
    idle: Option<Idle<M::Connection>>,
    pool: &'a PoolInner<M>,
}

impl<M: Manager> Checkout<'_, M> {
    fn is_stale(&self) -> bool {
        self.idle
            .as_ref()
            .is_some_and(|idle| idle.checked_at.elapsed() >= self.pool.config.health_check_interval)
    }

    async fn check(&mut self) -> StoreResult<()> {
        match self.idle.as_mut() {
            Some(idle) => self.pool.manager.check(&mut idle.connection).await,
            None => Ok(()),
        }
    }

    fn take(mut self) -> Option<M::Connection> {
        self.idle.take().map(|idle| idle.connection)
    }
}

impl<M: Manager> Drop for Checkout<'_, M> {
    fn drop(&mut self) {
        if self.idle.take().is_some() {
            self.pool.forget();
        }
    }
}

/// Bounded pool of reusable connections.
///
/// Cloning is cheap and every clone shares the same connections.
pub struct Pool<M: Manager> {
    inner: Arc<PoolInner<M>>,
}

impl<M: Manager> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: Manager> std::fmt::Debug for Pool<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.inner.config)
            .field("status", &self.status())
            .finish()
    }
}

impl<M: Manager> Pool<M> {
    /// Creates an empty pool. Connections are opened on demand.
    pub fn new(manager: M, config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                manager,
                config,
                idle: Mutex::new(VecDeque::with_capacity(config.max_size.get())),
                semaphore: Arc::new(Semaphore::new(config.max_size.get())),
                size: AtomicUsize::new(0),
            }),
        }
    }

    /// Pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Connection manager.
    pub fn manager(&self) -> &M {
        &self.inner.manager
    }

    /// Leases a connection, waiting up to `wait_timeout` for a free slot.
    pub async fn acquire(&self) -> Result<Lease<M>, PoolError> {
        let inner = &self.inner;
        let started = Instant::now();
        let permit = match tokio::time::timeout(
            inner.config.wait_timeout,
            Arc::clone(&inner.semaphore).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(PoolError::Closed),
            Err(_) => {
                warn!(
                    waited_ms = inner.config.wait_timeout.as_millis() as u64,
                    "Connection pool exhausted"
                );
                metrics::record_pool_exhausted();
                return Err(PoolError::Exhausted(inner.config.wait_timeout));
            }
        };
        metrics::record_acquire(started.elapsed());

        loop {
            let idle = inner.idle().pop_front();
            let Some(idle) = idle else {
                trace!("Opening new pooled connection");
                let connection = inner.manager.create().await.map_err(PoolError::Connect)?;
                inner.size.fetch_add(1, Ordering::Relaxed);
                return Ok(Lease::new(connection, permit, Arc::clone(inner)));
            };
            // forgets the connection if this future is dropped mid-probe
            let mut checkout = Checkout {
                idle: Some(idle),
                pool: inner,
            };

            if checkout.is_stale() {
                trace!("Probing idle connection");
                if let Err(error) = checkout.check().await {
                    debug!(%error, "Discarding idle connection that failed health check");
                    continue;
                }
            }
            let Some(connection) = checkout.take() else {
                continue;
            };
            return Ok(Lease::new(connection, permit, Arc::clone(inner)));
        }
    }

    /// Current occupancy.
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            max_size: self.inner.config.max_size.get(),
            size: self.inner.size.load(Ordering::Relaxed),
            available: self.inner.semaphore.available_permits(),
            idle: self.inner.idle().len(),
        }
    }

    /// Closes the pool: pending and future acquisitions fail with
    /// [`PoolError::Closed`] and idle connections are dropped. Outstanding
    /// leases stay usable and are dropped on release.
    pub fn close(&self) {
        self.inner.semaphore.close();
        let drained = self.inner.idle().drain(..).count();
        self.inner.size.fetch_sub(drained, Ordering::Relaxed);
        debug!(drained, "Connection pool closed");
    }
}

/// Exclusive handle to a pooled connection.
///
/// Dereferences to the connection. Dropping the lease returns the connection
/// to the pool unless it was marked broken by [`Lease::discard`] or
/// [`Lease::track`].
pub struct Lease<M: Manager> {
    connection: Option<M::Connection>,
    broken: bool,
    pool: Arc<PoolInner<M>>,
    // released after the connection is back in the idle list
    _permit: OwnedSemaphorePermit,
}

impl<M: Manager> Lease<M> {
    fn new(
        connection: M::Connection,
        permit: OwnedSemaphorePermit,
        pool: Arc<PoolInner<M>>,
    ) -> Self {
        Self {
            connection: Some(connection),
            broken: false,
            pool,
            _permit: permit,
        }
    }

    /// Returns the connection to the pool.
    pub fn release(self) {}

    /// Drops the connection instead of returning it.
    pub fn discard(mut self) {
        self.broken = true;
    }

    /// Passes `result` through, marking the connection broken when it failed
    /// with a connection-level error.
    pub fn track<T>(&mut self, result: StoreResult<T>) -> StoreResult<T> {
        if result.as_ref().is_err_and(StoreError::is_connection_fault) {
            self.broken = true;
        }
        result
    }

    /// Returns `true` if the connection will be dropped on release.
    pub fn is_broken(&self) -> bool {
        self.broken
    }
}

impl<M: Manager> std::fmt::Debug for Lease<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("broken", &self.broken)
            .field("pool_size", &self.pool.size.load(Ordering::Relaxed))
            .field("connection", &"...")
            .finish()
    }
}

impl<M: Manager> Deref for Lease<M> {
    type Target = M::Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("lease holds its connection until dropped")
    }
}

impl<M: Manager> DerefMut for Lease<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("lease holds its connection until dropped")
    }
}

impl<M: Manager> Drop for Lease<M> {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        if self.broken || self.pool.semaphore.is_closed() {
            trace!("Dropping leased connection");
            self.pool.forget();
            return;
        }
        self.pool.idle().push_back(Idle {
            connection,
            checked_at: Instant::now(),
        });
    }
}
