//! Backend trait
//!
//! A backend executes one query or mutation per call and reports failures
//! as [`BackendError`]. It never retries on its own; the gateway does.

use crate::error::BackendError;
use crate::query::{Mutation, Query, Row};
use async_trait::async_trait;

/// Data source the gateway reads from and writes to.
///
/// Implementations must be safe to call again after a failure: the gateway
/// re-invokes `fetch` (and idempotent mutations) under its retry policy.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use opsdesk_gateway::{Backend, BackendError, Mutation, Query, Row};
///
/// struct EmptyBackend;
///
/// #[async_trait]
/// impl Backend for EmptyBackend {
///     async fn fetch(&self, _query: &Query) -> Result<Vec<Row>, BackendError> {
///         Ok(Vec::new())
///     }
///
///     async fn mutate(&self, _mutation: &Mutation) -> Result<u64, BackendError> {
///         Ok(0)
///     }
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    /// Run a read and return the matching rows.
    async fn fetch(&self, query: &Query) -> Result<Vec<Row>, BackendError>;

    /// Apply a write and return the number of affected rows.
    async fn mutate(&self, mutation: &Mutation) -> Result<u64, BackendError>;
}
