//! Error types for the Redis driver.
//!
//! All errors convert into [`StoreError`] so the retry executor can decide
//! whether to try again.
//!
//! [`StoreError`]: keyward_core::StoreError

use std::time::Duration;

use keyward_core::StoreError;
use redis::RedisError;

/// Error type for Redis driver operations.
///
/// # When You'll Encounter This
///
/// - [`RedisConnectorBuilder::build`] with an invalid connection URL
/// - Opening a connection when Redis is unreachable
/// - A command the server rejects or does not answer in time
///
/// Inside keyward these errors are converted to [`StoreError`] right away;
/// only the builder returns them directly.
///
/// [`RedisConnectorBuilder::build`]: crate::RedisConnectorBuilder::build
/// [`StoreError`]: keyward_core::StoreError
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error from the underlying Redis client.
    ///
    /// This includes connection failures, protocol errors, authentication
    /// failures, and command execution errors.
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    /// The server did not answer within the configured timeout.
    #[error("Redis did not answer within {0:?}")]
    Timeout(Duration),

    /// Neither a server URL nor a host was configured.
    #[error("Redis host not specified. Call .host() or .server() before .build()")]
    MissingHost,
}

impl From<Error> for StoreError {
    fn from(error: Error) -> Self {
        match error {
            Error::Timeout(after) => StoreError::Timeout(after),
            Error::MissingHost => StoreError::InvalidArgument(Error::MissingHost.to_string()),
            Error::Redis(error) => classify(error),
        }
    }
}

fn classify(error: RedisError) -> StoreError {
    if matches!(error.code(), Some("NOAUTH" | "WRONGPASS")) {
        return StoreError::Auth(Box::new(error));
    }
    if error.is_timeout()
        || error.is_connection_refusal()
        || error.is_connection_dropped()
        || error.is_io_error()
    {
        return StoreError::Connection(Box::new(error));
    }
    // server error replies and replies that do not decode into the
    // expected type
    StoreError::Response(Box::new(error))
}
