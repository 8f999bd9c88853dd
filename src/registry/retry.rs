//! Retry policy for transient upstream failures.
//!
//! An explicit policy object rather than a decorator: the client composes
//! the backoff schedule produced here with a retryable-outcome predicate
//! (see [`FetchError::is_retryable`](crate::registry::error::FetchError)).

use crate::config::{HTTP_MAX_RETRIES, RETRY_BASE_DELAY_MS, RETRY_MAX_DELAY_MS};
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};

/// Exponential backoff schedule: `base, 2*base, 4*base, …`, jittered and
/// capped, with a bounded number of retries after the initial attempt
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy with `max_retries` retry attempts (so up to
    /// `max_retries + 1` total tries per logical call)
    #[must_use]
    pub const fn new(max_retries: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Number of retry attempts after the initial try
    #[must_use]
    pub const fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// The backoff schedule for one logical call. Jitter keeps concurrent
    /// callers from retrying in lockstep.
    pub fn backoff(&self) -> impl Iterator<Item = Duration> {
        // ExponentialBackoff yields 2^n ms; factor scales it to base * 2^(n-1)
        let factor = (self.base_delay.as_millis() as u64 / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_delay)
            .map(jitter)
            .take(self.max_retries)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            HTTP_MAX_RETRIES,
            Duration::from_millis(RETRY_BASE_DELAY_MS),
            Duration::from_millis(RETRY_MAX_DELAY_MS),
        )
    }
}
