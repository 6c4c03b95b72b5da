//! Pooled cache client with retry on every command.

use std::time::Duration;

use keyward_core::{Connection, Manager, Pool, Retry, RetryError, ScanPage};

use crate::config::ClientConfig;

/// Cache client that survives node failover.
///
/// Every command runs through the [`Retry`] executor. Each attempt leases its
/// own connection from the [`Pool`]; a connection that failed with a
/// connection-class error is dropped instead of being returned, so the next
/// attempt dials a fresh one.
///
/// ```no_run
/// # #[cfg(feature = "redis")]
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// use keyward::{ClientConfig, ResilientClient};
/// use keyward::redis::RedisConnector;
///
/// let connector = RedisConnector::builder().host("127.0.0.1").build()?;
/// let client = ResilientClient::with_config(connector, &ClientConfig::default());
///
/// client.set("greeting", "hello", None).await?;
/// assert_eq!(client.get("greeting").await?.as_deref(), Some("hello"));
/// # Ok(())
/// # }
/// ```
pub struct ResilientClient<M: Manager> {
    pool: Pool<M>,
    retry: Retry,
}

impl<M: Manager> Clone for ResilientClient<M> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            retry: self.retry.clone(),
        }
    }
}

impl<M: Manager> std::fmt::Debug for ResilientClient<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("pool", &self.pool)
            .field("retry", &self.retry)
            .finish()
    }
}

impl<M> ResilientClient<M>
where
    M: Manager,
    M::Connection: Connection,
{
    /// Creates a client over an existing pool and executor.
    pub fn new(pool: Pool<M>, retry: Retry) -> Self {
        Self { pool, retry }
    }

    /// Creates a client with its own pool, configured from `config`.
    pub fn with_config(manager: M, config: &ClientConfig) -> Self {
        let retry = Retry::builder()
            .max_attempts(config.max_attempts)
            .backoff(config.backoff.into())
            .build();
        Self::new(Pool::new(manager, config.pool), retry)
    }

    /// Connection pool used by this client.
    pub fn pool(&self) -> &Pool<M> {
        &self.pool
    }

    /// Retry executor used by this client.
    pub fn retry(&self) -> &Retry {
        &self.retry
    }

    /// Closes the pool. Leased connections are dropped when returned.
    pub fn disconnect(&self) {
        self.pool.close();
    }

    /// `PING`
    pub async fn ping(&self) -> Result<(), RetryError> {
        let pool = &self.pool;
        self.retry
            .execute("PING", move || async move {
                let mut lease = pool.acquire().await?;
                let result = lease.ping().await;
                lease.track(result)
            })
            .await
    }

    /// `GET key`
    pub async fn get(&self, key: &str) -> Result<Option<String>, RetryError> {
        let pool = &self.pool;
        self.retry
            .execute(format!("GET {key}"), move || async move {
                let mut lease = pool.acquire().await?;
                let result = lease.get(key).await;
                lease.track(result)
            })
            .await
    }

    /// `SET key value [EX seconds]`
    pub async fn set(
        &self,
        key: &str,
        value: &str,
        expire: Option<Duration>,
    ) -> Result<(), RetryError> {
        let pool = &self.pool;
        self.retry
            .execute(format!("SET {key}"), move || async move {
                let mut lease = pool.acquire().await?;
                let result = lease.set(key, value, expire).await;
                lease.track(result)
            })
            .await
    }

    /// `INCR key`
    pub async fn incr(&self, key: &str) -> Result<i64, RetryError> {
        let pool = &self.pool;
        self.retry
            .execute(format!("INCR {key}"), move || async move {
                let mut lease = pool.acquire().await?;
                let result = lease.incr(key).await;
                lease.track(result)
            })
            .await
    }

    /// `HSET hash field value`
    pub async fn hset(&self, hash: &str, field: &str, value: &str) -> Result<u64, RetryError> {
        let pool = &self.pool;
        self.retry
            .execute(format!("HSET {hash} {field}"), move || async move {
                let mut lease = pool.acquire().await?;
                let result = lease.hset(hash, field, value).await;
                lease.track(result)
            })
            .await
    }

    /// `HGETALL hash`
    pub async fn hgetall(&self, hash: &str) -> Result<Vec<(String, String)>, RetryError> {
        let pool = &self.pool;
        self.retry
            .execute(format!("HGETALL {hash}"), move || async move {
                let mut lease = pool.acquire().await?;
                let result = lease.hgetall(hash).await;
                lease.track(result)
            })
            .await
    }

    /// `SCAN cursor MATCH pattern COUNT count`
    pub async fn scan_page(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<ScanPage, RetryError> {
        let pool = &self.pool;
        self.retry
            .execute(format!("SCAN {cursor} MATCH {pattern}"), move || async move {
                let mut lease = pool.acquire().await?;
                let result = lease.scan(cursor, pattern, count).await;
                lease.track(result)
            })
            .await
    }
}
