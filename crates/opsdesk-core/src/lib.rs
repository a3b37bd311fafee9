#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Core execution policies for the opsdesk data layer.
//!
//! Every call the dashboard makes to its hosted backend goes through the
//! retry machinery defined here:
//!
//! - **Retry policies** via [`RetryPolicy`](retry::RetryPolicy)
//!   - Deterministic exponential backoff, clamped to a maximum delay
//!   - Tagged failure classification instead of message matching
//!   - Cancellation and deadlines for long-running executions
//! - **Batch execution** via [`BatchRetryExecutor`](retry::BatchRetryExecutor)
//! - **Attempt observation** via the [`RetryObserver`](retry::RetryObserver) trait
//! - **Environment-driven configuration** via [`RetryConfig`](config::RetryConfig)
//!
//! # Examples
//!
//! Using the prelude for convenient imports:
//!
//! ```rust
//! use opsdesk_core::prelude::*;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), std::io::Error> {
//! let policy = RetryPolicy::<std::io::Error>::builder()
//!     .max_attempts(3)
//!     .initial_delay(Duration::from_millis(100))
//!     .build();
//!
//! let value = RetryExecutor::new(policy)
//!     .execute(|| async { Ok::<_, std::io::Error>(42) })
//!     .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod retry;

/// Convenient re-exports of commonly used items.
///
/// ```rust
/// use opsdesk_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ConfigError, RetryConfig};
    pub use crate::retry::{
        AttemptOutcome, BackoffStrategy, BatchOutcome, BatchRetryExecutor, Classify,
        ExponentialBackoff, FailureKind, FnObserver, RetryError, RetryExecutor, RetryObserver,
        RetryPolicy, RetryPolicyBuilder, RetryState, TracingObserver, retry, retry_with_policy,
    };
}
