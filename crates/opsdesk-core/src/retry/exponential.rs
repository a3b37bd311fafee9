//! Deterministic exponential backoff.

use super::strategy::BackoffStrategy;
use std::time::Duration;

/// Exponential backoff without jitter.
///
/// Delays grow geometrically from `initial_delay` and are capped at
/// `max_delay`.
///
/// # Mathematical Formula
///
/// For the failure of attempt `n` (1-indexed):
/// ```text
/// raw_delay = initial_delay * (multiplier ^ (n - 1))
/// delay     = min(raw_delay, max_delay)
/// ```
///
/// The first retry therefore always waits exactly `initial_delay`. When
/// `initial_delay > max_delay` every delay collapses to `max_delay`.
///
/// # Examples
///
/// ```rust
/// use opsdesk_core::retry::{BackoffStrategy, ExponentialBackoff};
/// use std::time::Duration;
///
/// let backoff = ExponentialBackoff::new(
///     Duration::from_secs(1),
///     Duration::from_secs(30),
///     2.0,
/// );
///
/// assert_eq!(backoff.delay_for_attempt(1), Duration::from_secs(1));
/// assert_eq!(backoff.delay_for_attempt(4), Duration::from_secs(8));
/// assert_eq!(backoff.delay_for_attempt(6), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
}

impl ExponentialBackoff {
    /// Create a backoff curve.
    ///
    /// Multipliers below `1.0` (or non-finite) are raised to `1.0`, which
    /// turns the curve into a fixed delay.
    pub fn new(initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        let multiplier = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            1.0
        };

        Self {
            initial_delay,
            max_delay,
            multiplier,
        }
    }

    /// Delay before the first retry.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Upper bound on any single delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Growth factor applied per attempt.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }
}

impl BackoffStrategy for ExponentialBackoff {
    /// Delay before the retry that follows the failure of `attempt`.
    ///
    /// `attempt` is 1-indexed; `0` is treated like `1`.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);

        // Nanosecond arithmetic keeps whole-millisecond curves exact.
        let raw = self.initial_delay.as_nanos() as f64 * self.multiplier.powi(exponent);
        let cap = self.max_delay.as_nanos() as f64;

        if !raw.is_finite() || raw >= cap {
            self.max_delay
        } else {
            Duration::from_nanos(raw.round() as u64)
        }
    }
}

impl Default for ExponentialBackoff {
    /// Defaults:
    /// - `initial_delay`: 1s
    /// - `max_delay`: 30s
    /// - `multiplier`: 2.0 (doubles each time)
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            multiplier: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_exponential_delay_calculation() {
        let backoff = ExponentialBackoff::default();

        // Attempt 1 failed: 1000ms * 2^0
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_millis(4000));
        assert_eq!(backoff.delay_for_attempt(4), Duration::from_millis(8000));
    }

    #[test]
    fn test_max_delay_cap() {
        let backoff = ExponentialBackoff::default();

        // Attempt 7 would be 64000ms raw
        assert_eq!(backoff.delay_for_attempt(7), Duration::from_millis(30_000));
        assert_eq!(backoff.delay_for_attempt(64), Duration::from_millis(30_000));
        assert_eq!(backoff.delay_for_attempt(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn test_initial_delay_above_max_is_clamped() {
        let backoff =
            ExponentialBackoff::new(Duration::from_secs(10), Duration::from_secs(2), 2.0);

        for attempt in 1..6 {
            assert_eq!(backoff.delay_for_attempt(attempt), Duration::from_secs(2));
        }
    }

    #[test]
    fn test_attempt_zero_behaves_like_first() {
        let backoff = ExponentialBackoff::default();
        assert_eq!(backoff.delay_for_attempt(0), backoff.delay_for_attempt(1));
    }

    #[test]
    fn test_multiplier_clamped() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(500), Duration::from_secs(5), 0.5);
        assert_eq!(backoff.multiplier(), 1.0);
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_millis(500));

        let backoff =
            ExponentialBackoff::new(Duration::from_millis(500), Duration::from_secs(5), f64::NAN);
        assert_eq!(backoff.multiplier(), 1.0);
    }

    #[test]
    fn test_fractional_multiplier() {
        let backoff =
            ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(10), 1.5);

        assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_millis(150));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_millis(225));
    }

    #[test]
    fn test_total_delay() {
        let backoff = ExponentialBackoff::default();

        assert_eq!(backoff.total_delay(1), Duration::ZERO);
        assert_eq!(backoff.total_delay(3), Duration::from_millis(3000));
        // 1 + 2 + 4 + 8 + 16 + 30 (capped)
        assert_eq!(backoff.total_delay(7), Duration::from_millis(61_000));
    }

    #[test]
    fn test_next_delay_follows_curve_within_budget() {
        let backoff = ExponentialBackoff::default();

        assert_eq!(backoff.next_delay(1, 3), Some(Duration::from_millis(1000)));
        assert_eq!(backoff.next_delay(2, 3), Some(Duration::from_millis(2000)));
        assert_eq!(backoff.next_delay(3, 3), None);

        let strategy: &dyn BackoffStrategy = &backoff;
        assert_eq!(strategy.next_delay(6, 10), Some(Duration::from_millis(30_000)));
    }

    proptest! {
        /// Property: delays never exceed max_delay
        #[test]
        fn prop_delay_never_exceeds_max(
            initial_ms in 0u64..100_000,
            max_ms in 0u64..100_000,
            multiplier in 1.0f64..10.0,
            attempt in 0u32..200,
        ) {
            let backoff = ExponentialBackoff::new(
                Duration::from_millis(initial_ms),
                Duration::from_millis(max_ms),
                multiplier,
            );
            prop_assert!(backoff.delay_for_attempt(attempt) <= Duration::from_millis(max_ms));
        }

        /// Property: delays are monotonically non-decreasing
        #[test]
        fn prop_delay_monotonic(
            initial_ms in 0u64..10_000,
            max_ms in 0u64..100_000,
            multiplier in 1.0f64..4.0,
            attempt in 1u32..100,
        ) {
            let backoff = ExponentialBackoff::new(
                Duration::from_millis(initial_ms),
                Duration::from_millis(max_ms),
                multiplier,
            );
            prop_assert!(backoff.delay_for_attempt(attempt) <= backoff.delay_for_attempt(attempt + 1));
        }

        /// Property: the first retry waits min(initial_delay, max_delay)
        #[test]
        fn prop_first_delay_is_initial(
            initial_ms in 0u64..100_000,
            max_ms in 0u64..100_000,
            multiplier in 1.0f64..10.0,
        ) {
            let backoff = ExponentialBackoff::new(
                Duration::from_millis(initial_ms),
                Duration::from_millis(max_ms),
                multiplier,
            );
            prop_assert_eq!(
                backoff.delay_for_attempt(1),
                Duration::from_millis(initial_ms.min(max_ms))
            );
        }
    }
}
