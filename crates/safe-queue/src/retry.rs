//! Bounded exponential backoff for checkout contention.
//!
//! A checkout that loses a race is tried again up to `max_attempts` more
//! times. Waits grow by `backoff_multiplier` from `initial_delay` and stop
//! growing at `max_delay`. With jitter each wait is drawn from the upper half
//! of its range, so consumers that collided once spread out on the next try.

use rand::Rng;
use std::time::Duration;

/// How often, and how far apart, a contended checkout is retried
///
/// ```rust
/// use safe_queue::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default().without_jitter();
/// assert_eq!(policy.delay_for(0), Duration::from_millis(10));
/// assert_eq!(policy.delay_for(1), Duration::from_millis(20));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_attempts: u32,

    pub initial_delay: Duration,

    /// Upper bound for any single wait
    pub max_delay: Duration,

    pub backoff_multiplier: f64,

    pub use_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            3,
            Duration::from_millis(10),
            Duration::from_millis(200),
            2.0,
        )
    }
}

impl RetryPolicy {
    /// Policy with jitter enabled
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            backoff_multiplier,
            use_jitter: true,
        }
    }

    /// Retry straight away, without waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO, 1.0).without_jitter()
    }

    pub fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }

    /// Wait before retry number `retry`, counting from zero
    pub fn delay_for(&self, retry: u32) -> Duration {
        let ceiling = self.max_delay.as_secs_f64();
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let grown = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        // NaN only arises from a zero initial delay times an overflowed factor
        let wait = if grown.is_nan() {
            0.0
        } else {
            grown.clamp(0.0, ceiling)
        };

        if !self.use_jitter || wait <= 0.0 {
            return Duration::from_secs_f64(wait);
        }
        let half = wait / 2.0;
        Duration::from_secs_f64(half + rand::thread_rng().gen_range(0.0..=half))
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
