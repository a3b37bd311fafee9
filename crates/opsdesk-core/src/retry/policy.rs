//! Retry policy: attempt budget, backoff curve and retry predicate.

use super::classify::Classify;
use super::exponential::ExponentialBackoff;
use super::strategy::BackoffStrategy;
use crate::config::RetryConfig;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// How an execution is retried.
///
/// A policy is immutable once built and cheap to clone, so a single default
/// can be shared by every call site.
///
/// # Default Configuration
///
/// - `max_attempts`: 3 (the first attempt plus two retries)
/// - `initial_delay`: 1000ms
/// - `max_delay`: 30000ms
/// - `backoff_multiplier`: 2.0
/// - `is_retryable`: network, timeout and server failures (see [`Classify`])
///
/// # Examples
///
/// ```rust
/// use opsdesk_core::retry::RetryPolicy;
/// use std::time::Duration;
///
/// // Default policy for classified errors
/// let policy = RetryPolicy::<std::io::Error>::default();
/// assert_eq!(policy.max_attempts(), 3);
///
/// // Custom policy with an explicit predicate
/// let policy = RetryPolicy::builder()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200))
///     .max_delay(Duration::from_secs(10))
///     .backoff_multiplier(1.5)
///     .retry_if(|status: &u16| *status >= 500)
///     .build();
///
/// assert!(policy.is_retryable(&503));
/// assert!(!policy.is_retryable(&404));
/// ```
pub struct RetryPolicy<E> {
    max_attempts: u32,
    backoff: ExponentialBackoff,
    is_retryable: Option<Predicate<E>>,
}

impl<E> RetryPolicy<E> {
    /// Create a new builder for configuring a retry policy.
    pub fn builder() -> RetryPolicyBuilder<E> {
        RetryPolicyBuilder::default()
    }

    /// A policy that makes exactly one attempt and never waits.
    pub fn no_retry() -> Self {
        Self::builder().max_attempts(1).build()
    }

    /// Total attempts allowed, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the first retry.
    pub fn initial_delay(&self) -> Duration {
        self.backoff.initial_delay()
    }

    /// Upper bound on any single delay.
    pub fn max_delay(&self) -> Duration {
        self.backoff.max_delay()
    }

    /// Growth factor applied per attempt.
    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff.multiplier()
    }

    /// The backoff curve of this policy.
    pub fn backoff(&self) -> &ExponentialBackoff {
        &self.backoff
    }

    /// Delay before the retry that follows the failure of `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay_for_attempt(attempt)
    }

    /// Evaluate the retry predicate.
    pub fn is_retryable(&self, error: &E) -> bool {
        self.is_retryable
            .as_ref()
            .is_none_or(|predicate| predicate(error))
    }

    /// Copy of this policy with a different attempt budget.
    pub fn with_max_attempts(&self, max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: self.backoff,
            is_retryable: self.is_retryable.clone(),
        }
    }
}

impl<E: Classify + 'static> RetryPolicy<E> {
    /// Default numbers with a predicate driven by [`Classify`].
    pub fn classified() -> Self {
        Self::builder().classified().build()
    }

    /// Build a classified policy from loaded configuration.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::builder().config(config).classified().build()
    }
}

impl<E: Classify + 'static> Default for RetryPolicy<E> {
    fn default() -> Self {
        Self::classified()
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            is_retryable: self.is_retryable.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.backoff.initial_delay())
            .field("max_delay", &self.backoff.max_delay())
            .field("backoff_multiplier", &self.backoff.multiplier())
            .finish_non_exhaustive()
    }
}

/// Builder for configuring [`RetryPolicy`].
///
/// Unset numeric fields take the defaults listed on [`RetryPolicy`]. Without
/// [`retry_if`](Self::retry_if) or [`classified`](Self::classified) every
/// error is considered retryable.
pub struct RetryPolicyBuilder<E> {
    max_attempts: Option<u32>,
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    backoff_multiplier: Option<f64>,
    is_retryable: Option<Predicate<E>>,
}

impl<E> Default for RetryPolicyBuilder<E> {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_delay: None,
            max_delay: None,
            backoff_multiplier: None,
            is_retryable: None,
        }
    }
}

impl<E> RetryPolicyBuilder<E> {
    /// Set the total number of attempts, including the first.
    ///
    /// Values below 1 are raised to 1.
    ///
    /// Default: 3
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }

    /// Set the delay before the first retry.
    ///
    /// Default: 1000ms
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Set the maximum delay between attempts.
    ///
    /// Default: 30000ms
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set the exponential multiplier.
    ///
    /// Values below 1.0 are raised to 1.0.
    ///
    /// Default: 2.0 (doubles each time)
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = Some(multiplier);
        self
    }

    /// Retry only the errors for which `predicate` returns `true`.
    ///
    /// The predicate must be cheap and must not panic.
    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.is_retryable = Some(Arc::new(predicate));
        self
    }

    /// Take every numeric setting from `config`.
    pub fn config(self, config: &RetryConfig) -> Self {
        self.max_attempts(config.max_attempts)
            .initial_delay(config.initial_delay())
            .max_delay(config.max_delay())
            .backoff_multiplier(config.backoff_multiplier)
    }

    /// Build the `RetryPolicy` instance.
    pub fn build(self) -> RetryPolicy<E> {
        let defaults = ExponentialBackoff::default();

        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(3),
            backoff: ExponentialBackoff::new(
                self.initial_delay.unwrap_or(defaults.initial_delay()),
                self.max_delay.unwrap_or(defaults.max_delay()),
                self.backoff_multiplier.unwrap_or(defaults.multiplier()),
            ),
            is_retryable: self.is_retryable,
        }
    }
}

impl<E: Classify + 'static> RetryPolicyBuilder<E> {
    /// Retry network, timeout and server failures; surface everything else.
    pub fn classified(self) -> Self {
        self.retry_if(|error: &E| error.is_transient())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::FailureKind;
    use std::io;

    #[test]
    fn test_builder_defaults() {
        let policy = RetryPolicy::<io::Error>::builder().build();

        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.initial_delay(), Duration::from_millis(1000));
        assert_eq!(policy.max_delay(), Duration::from_millis(30_000));
        assert_eq!(policy.backoff_multiplier(), 2.0);
        // Unclassified builder retries everything
        assert!(policy.is_retryable(&io::Error::new(io::ErrorKind::NotFound, "x")));
    }

    #[test]
    fn test_builder_custom_values() {
        let policy = RetryPolicy::<io::Error>::builder()
            .max_attempts(5)
            .initial_delay(Duration::from_millis(200))
            .max_delay(Duration::from_secs(10))
            .backoff_multiplier(1.5)
            .build();

        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.initial_delay(), Duration::from_millis(200));
        assert_eq!(policy.max_delay(), Duration::from_secs(10));
        assert_eq!(policy.backoff_multiplier(), 1.5);
    }

    #[test]
    fn test_builder_clamps_invalid_values() {
        let policy = RetryPolicy::<io::Error>::builder()
            .max_attempts(0)
            .backoff_multiplier(0.25)
            .build();

        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.backoff_multiplier(), 1.0);
    }

    #[test]
    fn test_default_policy_is_classified() {
        let policy = RetryPolicy::<io::Error>::default();

        assert_eq!(policy.max_attempts(), 3);
        assert!(policy.is_retryable(&io::Error::new(io::ErrorKind::TimedOut, "slow")));
        assert!(policy.is_retryable(&io::Error::new(io::ErrorKind::ConnectionReset, "reset")));
        assert!(!policy.is_retryable(&io::Error::new(io::ErrorKind::InvalidInput, "bad")));
    }

    #[test]
    fn test_custom_classification() {
        struct Status(u16);

        impl Classify for Status {
            fn failure_kind(&self) -> FailureKind {
                FailureKind::from_status(self.0)
            }
        }

        let policy = RetryPolicy::<Status>::default();
        assert!(policy.is_retryable(&Status(500)));
        assert!(policy.is_retryable(&Status(504)));
        assert!(!policy.is_retryable(&Status(404)));
        assert!(!policy.is_retryable(&Status(400)));
    }

    #[test]
    fn test_from_config() {
        let config = RetryConfig {
            max_attempts: 6,
            initial_delay_ms: 250,
            max_delay_ms: 4_000,
            backoff_multiplier: 3.0,
        };

        let policy = RetryPolicy::<io::Error>::from_config(&config);

        assert_eq!(policy.max_attempts(), 6);
        assert_eq!(policy.initial_delay(), Duration::from_millis(250));
        assert_eq!(policy.max_delay(), Duration::from_millis(4_000));
        assert_eq!(policy.backoff_multiplier(), 3.0);
        assert!(!policy.is_retryable(&io::Error::new(io::ErrorKind::NotFound, "x")));
    }

    #[test]
    fn test_clone_shares_predicate() {
        let policy = RetryPolicy::builder().retry_if(|n: &i32| *n > 0).build();
        let cloned = policy.clone();

        assert!(cloned.is_retryable(&1));
        assert!(!cloned.is_retryable(&-1));
    }

    #[test]
    fn test_with_max_attempts_and_no_retry() {
        let policy = RetryPolicy::<io::Error>::default().with_max_attempts(7);
        assert_eq!(policy.max_attempts(), 7);

        let single = RetryPolicy::<io::Error>::no_retry();
        assert_eq!(single.max_attempts(), 1);
    }

    #[test]
    fn test_debug_omits_predicate() {
        let policy = RetryPolicy::<io::Error>::default();
        let rendered = format!("{policy:?}");

        assert!(rendered.contains("max_attempts: 3"));
        assert!(rendered.contains(".."));
    }
}
