//! Command surface consumed from a cache node.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::key::KeyType;

/// One page returned by `SCAN`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next call; `0` means the iteration is complete.
    pub cursor: u64,
    /// Key names returned by this call.
    pub keys: Vec<String>,
}

/// A single connection to a cache node.
///
/// Implementations translate each method into one remote command. They hold no
/// retry logic: failures are returned as-is and classified by
/// [`StoreError::is_transient`](crate::StoreError::is_transient).
#[async_trait]
pub trait Connection: Send {
    /// `PING`.
    async fn ping(&mut self) -> StoreResult<()>;

    /// `GET key`.
    async fn get(&mut self, key: &str) -> StoreResult<Option<String>>;

    /// `SET key value [EX seconds]`.
    async fn set(&mut self, key: &str, value: &str, expire: Option<Duration>) -> StoreResult<()>;

    /// `INCR key`.
    async fn incr(&mut self, key: &str) -> StoreResult<i64>;

    /// `HSET hash field value`, returns the number of added fields.
    async fn hset(&mut self, hash: &str, field: &str, value: &str) -> StoreResult<u64>;

    /// `HGETALL hash`, field order as returned by the node.
    async fn hgetall(&mut self, hash: &str) -> StoreResult<Vec<(String, String)>>;

    /// `TYPE key`, the raw type name (`none` for a missing key).
    async fn key_type(&mut self, key: &str) -> StoreResult<String>;

    /// `MEMORY USAGE key`, `None` for a missing key.
    async fn memory_usage(&mut self, key: &str) -> StoreResult<Option<u64>>;

    /// `TTL key`.
    async fn ttl(&mut self, key: &str) -> StoreResult<i64>;

    /// `STRLEN`, `LLEN`, `HLEN`, `SCARD` or `ZCARD` depending on `key_type`.
    async fn length(&mut self, key: &str, key_type: KeyType) -> StoreResult<u64>;

    /// `SCAN cursor MATCH pattern COUNT count`.
    async fn scan(&mut self, cursor: u64, pattern: &str, count: usize) -> StoreResult<ScanPage>;
}
