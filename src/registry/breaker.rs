//! Circuit breaker shielding one upstream registry endpoint.
//!
//! # States
//! - Closed: requests pass through, failures are counted
//! - Open: requests short-circuit until `open_until`
//! - Half-open (implicit): once the cooldown elapses, the next request is
//!   attempted as a probe; failure re-opens, success closes
//!
//! One breaker per client instance. Breaker state is never shared across
//! unrelated upstream endpoints.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct BreakerState {
    failures: u32,
    open_until: Option<Instant>,
}

/// Per-client failure tracker with a cooldown-gated short circuit
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Creates a breaker that opens after `threshold` counted failures and
    /// stays open for `cooldown`
    #[must_use]
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            state: Mutex::new(BreakerState::default()),
        }
    }

    /// Returns `true` if a request may proceed. Once the cooldown has
    /// elapsed this admits a single-caller probe (half-open behaviour
    /// emerges from the outcome of that probe).
    pub fn check(&self) -> bool {
        let state = self.state.lock().expect("breaker mutex poisoned");
        match state.open_until {
            Some(until) => Instant::now() >= until,
            None => true,
        }
    }

    /// Records a successful call: failure count resets, circuit closes
    pub fn record_success(&self) {
        let mut state = self.state.lock().expect("breaker mutex poisoned");
        state.failures = 0;
        state.open_until = None;
    }

    /// Records a failed call. Reaching the threshold (re-)opens the circuit
    /// for the full cooldown, so a failed half-open probe pushes the window
    /// forward.
    pub fn record_failure(&self) {
        let mut state = self.state.lock().expect("breaker mutex poisoned");
        state.failures = state.failures.saturating_add(1);
        if state.failures >= self.threshold {
            state.open_until = Some(Instant::now() + self.cooldown);
        }
    }

    /// Current counted failures (for logs and stats)
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.state.lock().expect("breaker mutex poisoned").failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(5, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_closed_until_threshold() {
        let breaker = breaker();
        for _ in 0..4 {
            breaker.record_failure();
            assert!(breaker.check());
        }
        breaker.record_failure();
        assert!(!breaker.check());
    }

    #[tokio::test]
    async fn test_success_resets_failures() {
        let breaker = breaker();
        for _ in 0..4 {
            breaker.record_failure();
        }
        breaker.record_success();
        assert_eq!(breaker.failure_count(), 0);
        breaker.record_failure();
        assert!(breaker.check());
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_allowed_after_cooldown() {
        let breaker = breaker();
        for _ in 0..5 {
            breaker.record_failure();
        }
        assert!(!breaker.check());
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(breaker.check());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_reopens() {
        let breaker = breaker();
        for _ in 0..5 {
            breaker.record_failure();
        }
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(breaker.check());
        breaker.record_failure();
        assert!(!breaker.check());
        // The cooldown restarted; half a window later it is still open
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!breaker.check());
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_probe_closes() {
        let breaker = breaker();
        for _ in 0..5 {
            breaker.record_failure();
        }
        tokio::time::sleep(Duration::from_secs(61)).await;
        breaker.record_success();
        assert!(breaker.check());
        assert_eq!(breaker.failure_count(), 0);
    }
}
