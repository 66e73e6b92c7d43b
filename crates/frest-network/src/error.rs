//! Error types for storage network operations.

use serde::Serialize;
use thiserror::Error;

/// Errors reported by the storage network client.
///
/// Used both for synchronous submission errors and as the failure detail
/// delivered to [`PutCallback::on_failure`](crate::PutCallback::on_failure).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Error)]
pub enum NetworkError {
    /// Target URI could not be parsed
    #[error("invalid URI: {0}")]
    InvalidUri(String),

    /// Priority parameter outside the known classes
    #[error("invalid priority: {0}")]
    InvalidPriority(String),

    /// Nodes rejected the insert due to load
    #[error("rejected: overload")]
    RejectedOverload,

    /// No route to a node that would accept the data
    #[error("route not found")]
    RouteNotFound,

    /// Different data already lives under the target key
    #[error("collision: different data already inserted at {0}")]
    Collision(String),

    /// Insert was cancelled before completion
    #[error("cancelled")]
    Cancelled,

    /// Client does not support the requested mode
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Other client failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl NetworkError {
    /// Create an internal error with message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether a later attempt could plausibly succeed.
    ///
    /// The gateway never retries; this only informs log levels.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NetworkError::RejectedOverload | NetworkError::RouteNotFound
        )
    }
}
