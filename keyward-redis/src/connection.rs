//! Keyward command surface over a Redis connection.

use std::time::Duration;

use async_trait::async_trait;
use keyward_core::{Connection, KeyType, ScanPage, StoreError, StoreResult};
use redis::aio::MultiplexedConnection;
use redis::{Cmd, FromRedisValue};
use tracing::trace;

use crate::error::Error;

/// A single multiplexed Redis connection with a per-command timeout.
#[derive(Clone)]
pub struct RedisConnection {
    inner: MultiplexedConnection,
    response_timeout: Duration,
}

impl RedisConnection {
    pub(crate) fn new(inner: MultiplexedConnection, response_timeout: Duration) -> Self {
        Self {
            inner,
            response_timeout,
        }
    }

    async fn query<T>(&mut self, cmd: &Cmd) -> StoreResult<T>
    where
        T: FromRedisValue + Send,
    {
        match tokio::time::timeout(self.response_timeout, cmd.query_async::<T>(&mut self.inner))
            .await
        {
            Ok(result) => result.map_err(|e| Error::from(e).into()),
            Err(_) => Err(Error::Timeout(self.response_timeout).into()),
        }
    }
}

#[async_trait]
impl Connection for RedisConnection {
    async fn ping(&mut self) -> StoreResult<()> {
        trace!("PING");
        self.query::<String>(&redis::cmd("PING")).await.map(drop)
    }

    async fn get(&mut self, key: &str) -> StoreResult<Option<String>> {
        self.query(redis::cmd("GET").arg(key)).await
    }

    async fn set(&mut self, key: &str, value: &str, expire: Option<Duration>) -> StoreResult<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(expire) = expire {
            let seconds = expire.as_secs();
            if seconds == 0 {
                return Err(StoreError::InvalidArgument(format!(
                    "expiry for `{key}` must be at least one second, got {expire:?}"
                )));
            }
            cmd.arg("EX").arg(seconds);
        }
        self.query::<()>(&cmd).await
    }

    async fn incr(&mut self, key: &str) -> StoreResult<i64> {
        self.query(redis::cmd("INCR").arg(key)).await
    }

    async fn hset(&mut self, hash: &str, field: &str, value: &str) -> StoreResult<u64> {
        self.query(redis::cmd("HSET").arg(hash).arg(field).arg(value))
            .await
    }

    async fn hgetall(&mut self, hash: &str) -> StoreResult<Vec<(String, String)>> {
        self.query(redis::cmd("HGETALL").arg(hash)).await
    }

    async fn key_type(&mut self, key: &str) -> StoreResult<String> {
        self.query(redis::cmd("TYPE").arg(key)).await
    }

    async fn memory_usage(&mut self, key: &str) -> StoreResult<Option<u64>> {
        self.query(redis::cmd("MEMORY").arg("USAGE").arg(key)).await
    }

    async fn ttl(&mut self, key: &str) -> StoreResult<i64> {
        self.query(redis::cmd("TTL").arg(key)).await
    }

    async fn length(&mut self, key: &str, key_type: KeyType) -> StoreResult<u64> {
        self.query(redis::cmd(key_type.length_command()).arg(key))
            .await
    }

    async fn scan(&mut self, cursor: u64, pattern: &str, count: usize) -> StoreResult<ScanPage> {
        trace!(cursor, pattern, count, "SCAN");
        let (cursor, keys): (u64, Vec<String>) = self
            .query(
                redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(pattern)
                    .arg("COUNT")
                    .arg(count),
            )
            .await?;
        Ok(ScanPage { cursor, keys })
    }
}
