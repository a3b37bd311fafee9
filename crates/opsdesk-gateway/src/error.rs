//! Gateway error types

use opsdesk_core::config::ConfigError;
use opsdesk_core::retry::{Classify, FailureKind};
use thiserror::Error;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors reported by a [`Backend`](crate::Backend) or a
/// [`ConnectionPool`](crate::ConnectionPool).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The backend could not be reached or the connection dropped.
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The backend answered with an error status.
    #[error("Backend returned {status}: {message}")]
    Status {
        /// HTTP-style status code
        status: u16,
        /// Message reported by the backend
        message: String,
    },

    /// The response could not be decoded into rows.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The connection pool was closed and grants no more slots.
    #[error("Connection pool closed")]
    PoolClosed,
}

impl BackendError {
    /// Create a status error.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }
}

impl Classify for BackendError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Network(_) => FailureKind::Network,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Status { status, .. } => FailureKind::from_status(*status),
            Self::Decode(_) => FailureKind::Client,
            Self::PoolClosed => FailureKind::Other,
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Errors surfaced by [`QueryGateway`](crate::QueryGateway).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    /// The backend failed terminally or the attempt budget ran out.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The query or mutation was rejected before reaching the backend.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Gateway configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl GatewayError {
    /// Create an invalid query error.
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }

    /// The backend error, if this failure came from the backend.
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            Self::Backend(err) => Some(err),
            Self::InvalidQuery(_) | Self::Config(_) => None,
        }
    }
}

impl Classify for GatewayError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Backend(err) => err.failure_kind(),
            Self::InvalidQuery(_) => FailureKind::Client,
            Self::Config(_) => FailureKind::Other,
        }
    }
}
