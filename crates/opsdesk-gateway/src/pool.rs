//! Connection pooling
//!
//! The gateway acquires a [`PoolGuard`] before every attempt and drops it
//! when the attempt ends, so a backoff sleep never holds a connection.

use crate::error::BackendError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Proof of a granted connection slot, released on drop.
#[derive(Debug, Default)]
pub struct PoolGuard {
    _permit: Option<OwnedSemaphorePermit>,
}

impl PoolGuard {
    /// A guard that holds nothing.
    pub fn unbounded() -> Self {
        Self { _permit: None }
    }
}

/// Source of connection slots.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Wait for a slot.
    async fn acquire(&self) -> Result<PoolGuard, BackendError>;
}

/// Pool that grants every request immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughPool;

#[async_trait]
impl ConnectionPool for PassthroughPool {
    async fn acquire(&self) -> Result<PoolGuard, BackendError> {
        Ok(PoolGuard::unbounded())
    }
}

/// Pool that caps the number of attempts in flight.
///
/// ```rust
/// use opsdesk_gateway::BoundedPool;
///
/// let pool = BoundedPool::new(8);
/// assert_eq!(pool.available(), 8);
/// ```
#[derive(Debug, Clone)]
pub struct BoundedPool {
    slots: Arc<Semaphore>,
}

impl BoundedPool {
    /// Allow at most `max_connections` concurrent attempts (at least one).
    pub fn new(max_connections: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_connections.max(1))),
        }
    }

    /// Slots free right now.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Stop granting slots. Pending and future acquires fail with
    /// [`BackendError::PoolClosed`], which is never retried.
    pub fn close(&self) {
        self.slots.close();
    }
}

#[async_trait]
impl ConnectionPool for BoundedPool {
    async fn acquire(&self) -> Result<PoolGuard, BackendError> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| BackendError::PoolClosed)?;

        Ok(PoolGuard {
            _permit: Some(permit),
        })
    }
}

#[async_trait]
impl<P: ConnectionPool + ?Sized> ConnectionPool for Arc<P> {
    async fn acquire(&self) -> Result<PoolGuard, BackendError> {
        (**self).acquire().await
    }
}
