//! Attempt observation and logging
//!
//! Every attempt an executor makes produces one [`AttemptOutcome`], handed to
//! the executor's [`RetryObserver`]. [`TracingObserver`] writes them to
//! `tracing`; [`FnObserver`] adapts any closure into a diagnostic sink.

use std::fmt;
use std::time::Duration;

/// Position of an execution in the retry state machine.
///
/// ```text
/// Attempting --ok--------------------------------> Succeeded
/// Attempting --retryable failure, budget left----> Waiting --delay--> Attempting
/// Attempting --terminal failure or budget spent--> FailedTerminal
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryState {
    /// The operation is running.
    Attempting,
    /// Backing off before the next attempt.
    Waiting,
    /// The operation produced a value.
    Succeeded,
    /// The last error is being surfaced to the caller.
    FailedTerminal,
}

impl RetryState {
    /// Whether no further attempts follow this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::FailedTerminal)
    }
}

/// Record of a single attempt.
///
/// Outcomes are transient: they exist for the duration of the observer call.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptOutcome {
    /// Attempt number (1-indexed)
    pub attempt: u32,
    /// Attempt budget of the execution
    pub max_attempts: u32,
    /// Rendered error of a failed attempt
    pub error: Option<String>,
    /// Delay scheduled before the next attempt, if there is one
    pub next_delay: Option<Duration>,
    /// State the execution moves to after this attempt
    pub state: RetryState,
}

impl AttemptOutcome {
    pub(crate) fn succeeded(attempt: u32, max_attempts: u32) -> Self {
        Self {
            attempt,
            max_attempts,
            error: None,
            next_delay: None,
            state: RetryState::Succeeded,
        }
    }

    pub(crate) fn failed(
        attempt: u32,
        max_attempts: u32,
        error: &dyn fmt::Display,
        next_delay: Option<Duration>,
    ) -> Self {
        Self {
            attempt,
            max_attempts,
            error: Some(error.to_string()),
            next_delay,
            state: if next_delay.is_some() {
                RetryState::Waiting
            } else {
                RetryState::FailedTerminal
            },
        }
    }

    /// Whether the attempt produced a value.
    pub fn succeeded_attempt(&self) -> bool {
        self.state == RetryState::Succeeded
    }

    /// Whether the execution gave up because the budget ran out.
    pub fn is_exhausted(&self) -> bool {
        self.state == RetryState::FailedTerminal && self.attempt >= self.max_attempts
    }

    /// Whether the execution gave up early on a terminal error.
    pub fn is_non_retryable(&self) -> bool {
        self.state == RetryState::FailedTerminal && self.attempt < self.max_attempts
    }
}

/// Observer of retry attempts.
///
/// Observers run synchronously on the executing task, before the backoff
/// sleep they precede. They must return quickly and must not panic.
///
/// # Example
///
/// ```rust
/// use opsdesk_core::retry::{AttemptOutcome, RetryObserver};
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// #[derive(Default)]
/// struct FailureCounter(AtomicU32);
///
/// impl RetryObserver for FailureCounter {
///     fn on_attempt(&self, outcome: &AttemptOutcome) {
///         if outcome.error.is_some() {
///             self.0.fetch_add(1, Ordering::Relaxed);
///         }
///     }
/// }
/// ```
pub trait RetryObserver: Send + Sync {
    /// Called once per attempt, after its outcome is known.
    fn on_attempt(&self, outcome: &AttemptOutcome);

    /// Whether outcomes should be built at all. Executors skip rendering the
    /// error when this returns `false`.
    fn enabled(&self) -> bool {
        true
    }
}

/// Observer that discards every outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_attempt(&self, _outcome: &AttemptOutcome) {}

    fn enabled(&self) -> bool {
        false
    }
}

/// Adapts a closure into a [`RetryObserver`].
///
/// ```rust
/// use opsdesk_core::retry::{FnObserver, RetryExecutor, RetryPolicy};
///
/// let executor = RetryExecutor::new(RetryPolicy::<std::io::Error>::default())
///     .with_observer(FnObserver::new(|outcome| {
///         if let (Some(delay), Some(error)) = (outcome.next_delay, &outcome.error) {
///             eprintln!(
///                 "attempt {}/{} failed, retrying in {:?}: {}",
///                 outcome.attempt, outcome.max_attempts, delay, error
///             );
///         }
///     }));
/// ```
#[derive(Clone)]
pub struct FnObserver<F> {
    callback: F,
}

impl<F> FnObserver<F>
where
    F: Fn(&AttemptOutcome) + Send + Sync,
{
    /// Wrap `callback`.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> RetryObserver for FnObserver<F>
where
    F: Fn(&AttemptOutcome) + Send + Sync,
{
    fn on_attempt(&self, outcome: &AttemptOutcome) {
        (self.callback)(outcome)
    }
}

impl<F> fmt::Debug for FnObserver<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnObserver").finish_non_exhaustive()
    }
}

/// An observer that logs attempts using the `tracing` crate
///
/// # Log Levels
///
/// - success on the first attempt: DEBUG
/// - success after retries: INFO
/// - failure that will be retried: WARN
/// - non-retryable failure: WARN
/// - budget exhausted: ERROR
#[derive(Debug, Clone)]
pub struct TracingObserver {
    operation: String,
}

impl TracingObserver {
    /// Create a tracing observer labelled with the operation name.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }

    /// The operation label.
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new("retry")
    }
}

impl RetryObserver for TracingObserver {
    fn on_attempt(&self, outcome: &AttemptOutcome) {
        let error = outcome.error.as_deref().unwrap_or_default();

        match outcome.state {
            RetryState::Succeeded if outcome.attempt > 1 => tracing::info!(
                operation = %self.operation,
                attempt = outcome.attempt,
                max_attempts = outcome.max_attempts,
                "succeeded after retry"
            ),
            RetryState::Succeeded => tracing::debug!(
                operation = %self.operation,
                "succeeded on first attempt"
            ),
            RetryState::Waiting => tracing::warn!(
                operation = %self.operation,
                attempt = outcome.attempt,
                max_attempts = outcome.max_attempts,
                delay_ms = outcome
                    .next_delay
                    .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
                error = %error,
                "attempt failed, will retry"
            ),
            RetryState::FailedTerminal if outcome.is_exhausted() => tracing::error!(
                operation = %self.operation,
                attempts = outcome.attempt,
                error = %error,
                "all retry attempts exhausted"
            ),
            RetryState::FailedTerminal => tracing::warn!(
                operation = %self.operation,
                attempt = outcome.attempt,
                error = %error,
                "non-retryable error"
            ),
            RetryState::Attempting => {}
        }
    }
}

impl<T: RetryObserver + ?Sized> RetryObserver for std::sync::Arc<T> {
    fn on_attempt(&self, outcome: &AttemptOutcome) {
        (**self).on_attempt(outcome)
    }

    fn enabled(&self) -> bool {
        (**self).enabled()
    }
}

impl<T: RetryObserver + ?Sized> RetryObserver for Box<T> {
    fn on_attempt(&self, outcome: &AttemptOutcome) {
        (**self).on_attempt(outcome)
    }

    fn enabled(&self) -> bool {
        (**self).enabled()
    }
}

impl<T: RetryObserver + ?Sized> RetryObserver for &T {
    fn on_attempt(&self, outcome: &AttemptOutcome) {
        (**self).on_attempt(outcome)
    }

    fn enabled(&self) -> bool {
        (**self).enabled()
    }
}
