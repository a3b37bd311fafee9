//! Retry policies and the executors that apply them.
//!
//! An execution runs a zero-argument async operation until it succeeds, the
//! failure is classified terminal, or the attempt budget is spent. Delays
//! between attempts grow exponentially from `initial_delay` and never exceed
//! `max_delay`.
//!
//! # Key Types
//!
//! - [`RetryPolicy`] - attempt budget, backoff and retry predicate
//! - [`BackoffStrategy`] - delay curve, implemented by [`ExponentialBackoff`]
//! - [`RetryExecutor`] - runs one operation under a policy
//! - [`BatchRetryExecutor`] - runs many operations concurrently
//! - [`Classify`] / [`FailureKind`] - tagged transient/terminal classification
//! - [`RetryObserver`] - per-attempt diagnostics
//!
//! # Examples
//!
//! ```rust
//! use opsdesk_core::retry::{RetryExecutor, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), std::io::Error> {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(4)
//!     .initial_delay(Duration::from_millis(250))
//!     .retry_if(|err: &std::io::Error| err.kind() == std::io::ErrorKind::TimedOut)
//!     .build();
//!
//! let _rows = RetryExecutor::new(policy)
//!     .execute(|| async { Ok::<_, std::io::Error>(vec!["order-1"]) })
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod batch;
mod classify;
mod error;
mod executor;
mod exponential;
mod observer;
mod policy;
mod strategy;

pub use batch::{BatchOutcome, BatchRetryExecutor};
pub use classify::{Classify, FailureKind};
pub use error::RetryError;
pub use executor::{ExecutionResult, RetryExecutor, retry, retry_with_policy};
pub use exponential::ExponentialBackoff;
pub use observer::{
    AttemptOutcome, FnObserver, NoOpObserver, RetryObserver, RetryState, TracingObserver,
};
pub use policy::{RetryPolicy, RetryPolicyBuilder};
pub use strategy::BackoffStrategy;
