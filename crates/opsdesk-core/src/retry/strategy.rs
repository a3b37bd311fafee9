//! Backoff strategies.

use std::time::Duration;

/// A curve of delays between attempts.
///
/// The executor asks the strategy how long to wait after each failed attempt.
/// Implementations must be deterministic: the same `attempt` always yields
/// the same delay.
///
/// # Examples
///
/// ```rust
/// use opsdesk_core::retry::BackoffStrategy;
/// use std::time::Duration;
///
/// struct Fixed(Duration);
///
/// impl BackoffStrategy for Fixed {
///     fn delay_for_attempt(&self, _attempt: u32) -> Duration {
///         self.0
///     }
/// }
///
/// let fixed = Fixed(Duration::from_millis(250));
/// assert_eq!(fixed.next_delay(1, 3), Some(Duration::from_millis(250)));
/// assert_eq!(fixed.next_delay(3, 3), None);
/// assert_eq!(fixed.total_delay(3), Duration::from_millis(500));
/// ```
pub trait BackoffStrategy: Send + Sync {
    /// Delay before the retry that follows the failure of `attempt`
    /// (1-indexed).
    fn delay_for_attempt(&self, attempt: u32) -> Duration;

    /// Delay after the failure of `attempt`, or `None` once `attempt` has
    /// used up a budget of `max_attempts`.
    ///
    /// This is called after a failure and before sleeping.
    fn next_delay(&self, attempt: u32, max_attempts: u32) -> Option<Duration> {
        (attempt < max_attempts).then(|| self.delay_for_attempt(attempt))
    }

    /// Sum of the delays slept by an execution that fails `max_attempts` times:
    /// one delay per failed attempt except the last.
    fn total_delay(&self, max_attempts: u32) -> Duration {
        (1..max_attempts)
            .map(|attempt| self.delay_for_attempt(attempt))
            .sum()
    }
}

impl<T: BackoffStrategy + ?Sized> BackoffStrategy for &T {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        (**self).delay_for_attempt(attempt)
    }
}

impl<T: BackoffStrategy + ?Sized> BackoffStrategy for Box<T> {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        (**self).delay_for_attempt(attempt)
    }
}
