//! Bounded exponential backoff for the consumer's error and reconnect paths.
//!
//! # Example
//!
//! ```rust
//! use ridehail_runtime::backoff::{Backoff, BackoffPolicy};
//! use std::time::Duration;
//!
//! let policy = BackoffPolicy::builder()
//!     .initial_delay(Duration::from_millis(100))
//!     .max_delay(Duration::from_secs(30))
//!     .multiplier(2.0)
//!     .build();
//!
//! let mut backoff = Backoff::new(policy);
//! assert_eq!(backoff.next_delay(), Duration::from_millis(100));
//! assert_eq!(backoff.next_delay(), Duration::from_millis(200));
//!
//! backoff.reset();
//! assert_eq!(backoff.next_delay(), Duration::from_millis(100));
//! ```

use std::time::Duration;

/// Backoff policy configuration.
///
/// # Default Values
///
/// - `initial_delay`: 100ms
/// - `max_delay`: 30 seconds
/// - `multiplier`: 2.0 (delay doubles each failure)
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failure
    pub initial_delay: Duration,
    /// Cap for the exponential growth
    pub max_delay: Duration,
    /// Growth factor per consecutive failure
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> BackoffPolicyBuilder {
        BackoffPolicyBuilder {
            initial_delay: None,
            max_delay: None,
            multiplier: None,
        }
    }

    /// Delay for the given zero-based attempt.
    ///
    /// `initial_delay * multiplier ^ attempt`, capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);

        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }
}

/// Builder for [`BackoffPolicy`].
#[derive(Debug, Clone)]
pub struct BackoffPolicyBuilder {
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<f64>,
}

impl BackoffPolicyBuilder {
    /// Set the delay after the first failure.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Set the cap for exponential growth.
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set the growth factor. Values below 1.0 are raised to 1.0.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Build the [`BackoffPolicy`].
    ///
    /// A `max_delay` below `initial_delay` is raised to `initial_delay`.
    #[must_use]
    pub fn build(self) -> BackoffPolicy {
        let defaults = BackoffPolicy::default();
        let initial_delay = self.initial_delay.unwrap_or(defaults.initial_delay);
        BackoffPolicy {
            initial_delay,
            max_delay: self.max_delay.unwrap_or(defaults.max_delay).max(initial_delay),
            multiplier: self.multiplier.unwrap_or(defaults.multiplier).max(1.0),
        }
    }
}

/// Consecutive-failure counter over a [`BackoffPolicy`].
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    failures: u32,
}

impl Backoff {
    /// Start with no recorded failures.
    #[must_use]
    pub const fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    /// Record a failure and return how long to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.policy.delay_for_attempt(self.failures);
        self.failures = self.failures.saturating_add(1);
        delay
    }

    /// Forget earlier failures after a success.
    pub const fn reset(&mut self) {
        self.failures = 0;
    }

    /// Failures recorded since the last reset.
    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    /// The policy in use.
    #[must_use]
    pub const fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_backoff_delay_calculation() {
        let policy = BackoffPolicy::builder()
            .initial_delay(Duration::from_millis(100))
            .multiplier(2.0)
            .max_delay(Duration::from_secs(10))
            .build();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_max_delay_cap() {
        let policy = BackoffPolicy::builder()
            .initial_delay(Duration::from_millis(1000))
            .multiplier(10.0)
            .max_delay(Duration::from_secs(2))
            .build();

        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(2));
    }

    #[test]
    fn test_builder_repairs_bad_settings() {
        let policy = BackoffPolicy::builder()
            .initial_delay(Duration::from_secs(5))
            .max_delay(Duration::from_secs(1))
            .multiplier(0.5)
            .build();

        assert_eq!(policy.max_delay, Duration::from_secs(5));
        assert!((policy.multiplier - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reset_starts_over() {
        let mut backoff = Backoff::new(BackoffPolicy::default());
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.consecutive_failures(), 2);

        backoff.reset();
        assert_eq!(backoff.consecutive_failures(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    proptest! {
        #[test]
        fn delays_never_shrink_and_stay_bounded(
            initial_ms in 1u64..5_000,
            max_ms in 1u64..60_000,
            multiplier in 1.0f64..10.0,
        ) {
            let policy = BackoffPolicy::builder()
                .initial_delay(Duration::from_millis(initial_ms))
                .max_delay(Duration::from_millis(max_ms))
                .multiplier(multiplier)
                .build();

            let mut previous = Duration::ZERO;
            for attempt in 0..64 {
                let delay = policy.delay_for_attempt(attempt);
                prop_assert!(delay >= previous);
                prop_assert!(delay <= policy.max_delay);
                previous = delay;
            }
        }
    }
}
