#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod backoff;
mod connection;
mod error;
mod key;
pub mod metrics;
mod pattern;
pub mod pool;
pub mod retry;

#[cfg(feature = "test-helpers")]
pub mod testing;

pub use backoff::{BackoffConfig, BackoffPolicy};
pub use connection::{Connection, ScanPage};
pub use error::{BoxError, StoreError, StoreResult};
pub use key::{Expiry, KeyRecord, KeyType, MEBIBYTE};
pub use pattern::KeyPattern;
pub use pool::{Lease, Manager, Pool, PoolConfig, PoolError, PoolStatus};
pub use retry::{MaxAttempts, Retry, RetryBuilder, RetryConfig, RetryError, RetryObserver, TracingObserver};
