//! Retry execution engine.
//!
//! One loop drives every entry point:
//!
//! 1. invoke the operation;
//! 2. on success, return the value;
//! 3. on failure, give up if the budget is spent or the error is terminal;
//! 4. otherwise sleep `min(initial_delay * multiplier^(attempt-1), max_delay)`
//!    and go back to 1.
//!
//! Cancellable entry points race the operation and the backoff sleep against
//! a cancellation token or deadline.

use super::classify::Classify;
use super::error::RetryError;
use super::observer::{AttemptOutcome, NoOpObserver, RetryObserver, TracingObserver};
use super::policy::RetryPolicy;
use super::strategy::BackoffStrategy;
use std::convert::Infallible;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Result of one execution: the operation's value or its last error.
pub type ExecutionResult<T, E> = Result<T, E>;

/// Execute an async operation under the default policy.
///
/// Network, timeout and server failures are retried up to three attempts in
/// total with 1s and 2s backoff; every other error is surfaced immediately.
/// Failed attempts are logged through [`TracingObserver`].
///
/// # Example
///
/// ```rust,no_run
/// use opsdesk_core::retry::retry;
///
/// # async fn example() -> Result<(), std::io::Error> {
/// let body = retry(|| async {
///     tokio::fs::read_to_string("/var/run/opsdesk/orders.json").await
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry<F, Fut, T, E>(operation: F) -> ExecutionResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + Display + 'static,
{
    RetryExecutor::new(RetryPolicy::default())
        .with_observer(TracingObserver::default())
        .execute(operation)
        .await
}

/// Execute an async operation under `policy`, logging failed attempts.
///
/// # Example
///
/// ```rust
/// use opsdesk_core::retry::{RetryPolicy, retry_with_policy};
///
/// # async fn example() -> Result<(), std::io::Error> {
/// let policy = RetryPolicy::default();
///
/// let count = retry_with_policy(&policy, || async {
///     Ok::<_, std::io::Error>(12)
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_with_policy<F, Fut, T, E>(
    policy: &RetryPolicy<E>,
    operation: F,
) -> ExecutionResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    RetryExecutor::new(policy.clone())
        .with_observer(TracingObserver::default())
        .execute(operation)
        .await
}

/// Runs operations under a [`RetryPolicy`].
///
/// Executors hold no per-execution state; one instance can serve any number
/// of concurrent executions.
///
/// # Examples
///
/// ```rust
/// use opsdesk_core::retry::{RetryExecutor, RetryPolicy, TracingObserver};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), std::io::Error> {
/// let policy = RetryPolicy::builder()
///     .max_attempts(3)
///     .initial_delay(Duration::from_millis(10))
///     .build();
///
/// let executor = RetryExecutor::new(policy).with_observer(TracingObserver::new("load_orders"));
///
/// let calls = AtomicU32::new(0);
/// let value = executor
///     .execute(|| async {
///         if calls.fetch_add(1, Ordering::SeqCst) < 2 {
///             Err(std::io::Error::other("connection dropped"))
///         } else {
///             Ok("ok")
///         }
///     })
///     .await?;
///
/// assert_eq!(value, "ok");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RetryExecutor<E, O = NoOpObserver> {
    policy: RetryPolicy<E>,
    observer: O,
}

impl<E> RetryExecutor<E, NoOpObserver> {
    /// Create an executor without an observer.
    pub fn new(policy: RetryPolicy<E>) -> Self {
        Self {
            policy,
            observer: NoOpObserver,
        }
    }
}

impl<E: Classify + 'static> Default for RetryExecutor<E, NoOpObserver> {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl<E, O> RetryExecutor<E, O> {
    /// Replace the observer.
    pub fn with_observer<O2: RetryObserver>(self, observer: O2) -> RetryExecutor<E, O2> {
        RetryExecutor {
            policy: self.policy,
            observer,
        }
    }

    /// The policy applied to every execution.
    pub fn policy(&self) -> &RetryPolicy<E> {
        &self.policy
    }

    /// The observer notified of every attempt.
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Decide what follows the failure of `attempt`.
    ///
    /// Returns the backoff delay when another attempt is due, `None` when the
    /// error must be surfaced. The budget is checked before the predicate, so
    /// a single-attempt policy never consults it.
    pub fn next_delay(&self, attempt: u32, error: &E) -> Option<Duration> {
        let delay = self
            .policy
            .backoff()
            .next_delay(attempt, self.policy.max_attempts())?;

        self.policy.is_retryable(error).then_some(delay)
    }
}

impl<E, O> RetryExecutor<E, O>
where
    E: Display,
    O: RetryObserver,
{
    /// Execute an operation with retry logic.
    ///
    /// The operation is invoked until it succeeds, fails with an error the
    /// policy does not retry, or fails on the last allowed attempt. The error
    /// returned is the one the operation produced, untouched.
    ///
    /// The operation may run several times and must tolerate that.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> ExecutionResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(operation, std::future::pending::<Infallible>, || None)
            .await
            .map_err(Halt::into_failure)
    }

    /// Execute an operation that stops as soon as `token` is cancelled.
    ///
    /// Cancellation aborts the in-flight attempt or the pending backoff sleep
    /// and yields [`RetryError::Cancelled`]. It is never retried.
    pub async fn execute_with_cancellation<F, Fut, T>(
        &self,
        token: &CancellationToken,
        operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let signals = Signals::new(Some(token), None);
        self.run(operation, || signals.wait(), || signals.fired())
            .await
            .map_err(Halt::into_retry_error)
    }

    /// Execute an operation that stops once `deadline` passes.
    ///
    /// The deadline covers the whole execution, attempts and backoff alike,
    /// and yields [`RetryError::DeadlineExceeded`] when it passes.
    pub async fn execute_with_deadline<F, Fut, T>(
        &self,
        deadline: Instant,
        operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let signals = Signals::new(None, Some(deadline));
        self.run(operation, || signals.wait(), || signals.fired())
            .await
            .map_err(Halt::into_retry_error)
    }

    /// Execute an operation bounded by both a cancellation token and a
    /// deadline, whichever fires first.
    pub async fn execute_interruptible<F, Fut, T>(
        &self,
        token: &CancellationToken,
        deadline: Instant,
        operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let signals = Signals::new(Some(token), Some(deadline));
        self.run(operation, || signals.wait(), || signals.fired())
            .await
            .map_err(Halt::into_retry_error)
    }

    /// `interrupt` resolves when the execution must stop; `fired` reports
    /// whether it already has, so an attempt that never started is not
    /// counted.
    async fn run<F, Fut, T, I, IFut, P, R>(
        &self,
        mut operation: F,
        interrupt: I,
        fired: P,
    ) -> Result<T, Halt<E, R>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        I: Fn() -> IFut,
        IFut: Future<Output = R>,
        P: Fn() -> Option<R>,
    {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 1;

        loop {
            if let Some(reason) = fired() {
                return Err(Halt::Interrupted {
                    reason,
                    attempts: attempt - 1,
                });
            }

            let result = tokio::select! {
                biased;
                reason = interrupt() => {
                    return Err(Halt::Interrupted { reason, attempts: attempt });
                }
                result = operation() => result,
            };

            let delay = match result {
                Ok(value) => {
                    if self.observer.enabled() {
                        self.observer
                            .on_attempt(&AttemptOutcome::succeeded(attempt, max_attempts));
                    }
                    return Ok(value);
                }
                Err(error) => {
                    let delay = self.next_delay(attempt, &error);
                    if self.observer.enabled() {
                        self.observer.on_attempt(&AttemptOutcome::failed(
                            attempt,
                            max_attempts,
                            &error,
                            delay,
                        ));
                    }

                    match delay {
                        Some(delay) => delay,
                        None => return Err(Halt::Failed(error)),
                    }
                }
            };

            tokio::select! {
                biased;
                reason = interrupt() => {
                    return Err(Halt::Interrupted { reason, attempts: attempt });
                }
                () = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}

/// Why the retry loop stopped without a value.
enum Halt<E, R> {
    Failed(E),
    Interrupted { reason: R, attempts: u32 },
}

impl<E> Halt<E, Infallible> {
    fn into_failure(self) -> E {
        match self {
            Halt::Failed(error) => error,
            Halt::Interrupted { reason, .. } => match reason {},
        }
    }
}

impl<E> Halt<E, Interruption> {
    fn into_retry_error(self) -> RetryError<E> {
        match self {
            Halt::Failed(error) => RetryError::Operation(error),
            Halt::Interrupted { reason, attempts } => {
                tracing::debug!(attempts, reason = ?reason, "retry interrupted");
                match reason {
                    Interruption::Cancelled => RetryError::Cancelled { attempts },
                    Interruption::DeadlineExceeded => RetryError::DeadlineExceeded { attempts },
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Interruption {
    Cancelled,
    DeadlineExceeded,
}

/// Cancellation token and deadline bounding one execution.
#[derive(Clone, Copy)]
struct Signals<'a> {
    token: Option<&'a CancellationToken>,
    deadline: Option<Instant>,
}

impl<'a> Signals<'a> {
    fn new(token: Option<&'a CancellationToken>, deadline: Option<Instant>) -> Self {
        Self { token, deadline }
    }

    /// The interruption that has already happened, if any.
    fn fired(&self) -> Option<Interruption> {
        if self.token.is_some_and(CancellationToken::is_cancelled) {
            return Some(Interruption::Cancelled);
        }

        if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            return Some(Interruption::DeadlineExceeded);
        }

        None
    }

    /// Resolves when the token is cancelled or the deadline passes; never
    /// when both are absent.
    async fn wait(&self) -> Interruption {
        let cancelled = async {
            match self.token {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = cancelled => Interruption::Cancelled,
            () = expired => Interruption::DeadlineExceeded,
        }
    }
}
