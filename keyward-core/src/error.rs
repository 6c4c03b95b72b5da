//! Error types for cache node interaction.

use std::time::Duration;

use thiserror::Error;

/// Boxed error from an underlying driver.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias for single store commands.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error type for commands sent to a cache node.
///
/// This enum splits failures into the groups the retry executor cares about:
/// the first three variants are *transient* (caused by temporary network or
/// node conditions and safe to retry), everything else is *fatal*.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network interaction error: refused, reset or dropped connection.
    #[error("connection error: {0}")]
    Connection(#[source] BoxError),

    /// The node did not answer in time.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The node answered with an error or a malformed reply.
    #[error("response error: {0}")]
    Response(#[source] BoxError),

    /// Authentication was rejected by the node.
    #[error("authentication failed: {0}")]
    Auth(#[source] BoxError),

    /// Invalid arguments supplied by the caller.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The node reported a value type this tool does not model.
    #[error("unsupported value type `{0}`")]
    Unsupported(String),

    /// Internal error not bound to network interaction.
    #[error(transparent)]
    Internal(BoxError),
}

impl StoreError {
    /// Builds a [`StoreError::Connection`] from any error.
    pub fn connection(error: impl Into<BoxError>) -> Self {
        Self::Connection(error.into())
    }

    /// Builds a [`StoreError::Response`] from any error.
    pub fn response(error: impl Into<BoxError>) -> Self {
        Self::Response(error.into())
    }

    /// Returns `true` when retrying the same command may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout(_) | Self::Response(_)
        )
    }

    /// Returns `true` when the connection that produced this error should not
    /// be reused.
    pub fn is_connection_fault(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}
