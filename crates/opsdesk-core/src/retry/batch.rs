//! Concurrent execution of independent operations.

use super::classify::Classify;
use super::error::RetryError;
use super::executor::RetryExecutor;
use super::observer::{NoOpObserver, RetryObserver};
use super::policy::RetryPolicy;
use futures::future::join_all;
use std::fmt::Display;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Outcome of one operation in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome<T, E> {
    /// The operation produced a value.
    Success(T),
    /// The operation failed terminally or exhausted its attempts.
    Failure(E),
}

impl<T, E> BatchOutcome<T, E> {
    /// Whether this element succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Whether this element failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// The value, if any.
    pub fn success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// The error, if any.
    pub fn failure(&self) -> Option<&E> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error),
        }
    }

    /// Convert back into a `Result`.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(error) => Err(error),
        }
    }
}

impl<T, E> From<Result<T, E>> for BatchOutcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(error) => Self::Failure(error),
        }
    }
}

/// Runs many operations at once, each with its own retry loop.
///
/// Every operation is started immediately; there is no queueing or
/// admission control. Outcomes are returned in input order, and a failing
/// element never stops the others.
///
/// # Examples
///
/// ```rust
/// use opsdesk_core::retry::{BatchRetryExecutor, RetryPolicy};
///
/// # async fn example() {
/// let batch = BatchRetryExecutor::new(RetryPolicy::<std::io::Error>::default());
///
/// let outcomes = batch
///     .execute_all((1..=3).map(|id| move || async move { Ok::<_, std::io::Error>(id * 10) }))
///     .await;
///
/// assert!(outcomes.iter().all(|outcome| outcome.is_success()));
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BatchRetryExecutor<E, O = NoOpObserver> {
    executor: RetryExecutor<E, O>,
}

impl<E> BatchRetryExecutor<E, NoOpObserver> {
    /// Create a batch executor sharing `policy` across elements.
    pub fn new(policy: RetryPolicy<E>) -> Self {
        Self {
            executor: RetryExecutor::new(policy),
        }
    }
}

impl<E: Classify + 'static> Default for BatchRetryExecutor<E, NoOpObserver> {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl<E, O> BatchRetryExecutor<E, O> {
    /// Replace the observer shared by every element.
    pub fn with_observer<O2: RetryObserver>(self, observer: O2) -> BatchRetryExecutor<E, O2> {
        BatchRetryExecutor {
            executor: self.executor.with_observer(observer),
        }
    }

    /// The policy applied to every element.
    pub fn policy(&self) -> &RetryPolicy<E> {
        self.executor.policy()
    }
}

impl<E, O> From<RetryExecutor<E, O>> for BatchRetryExecutor<E, O> {
    fn from(executor: RetryExecutor<E, O>) -> Self {
        Self { executor }
    }
}

impl<E, O> BatchRetryExecutor<E, O>
where
    E: Display,
    O: RetryObserver,
{
    /// Run every operation concurrently and collect positional outcomes.
    pub async fn execute_all<I, F, Fut, T>(&self, operations: I) -> Vec<BatchOutcome<T, E>>
    where
        I: IntoIterator<Item = F>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let executions = operations
            .into_iter()
            .map(|operation| self.executor.execute(operation));

        let outcomes: Vec<BatchOutcome<T, E>> = join_all(executions)
            .await
            .into_iter()
            .map(BatchOutcome::from)
            .collect();

        tracing::debug!(
            total = outcomes.len(),
            failed = outcomes.iter().filter(|outcome| outcome.is_failure()).count(),
            "batch finished"
        );

        outcomes
    }

    /// Like [`execute_all`](Self::execute_all), with every element stopping
    /// once `token` is cancelled.
    pub async fn execute_all_with_cancellation<I, F, Fut, T>(
        &self,
        token: &CancellationToken,
        operations: I,
    ) -> Vec<BatchOutcome<T, RetryError<E>>>
    where
        I: IntoIterator<Item = F>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let executions = operations
            .into_iter()
            .map(|operation| self.executor.execute_with_cancellation(token, operation));

        join_all(executions)
            .await
            .into_iter()
            .map(BatchOutcome::from)
            .collect()
    }
}
