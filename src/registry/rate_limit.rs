//! Outbound and per-caller rate limiting.
//!
//! Two variants with different admission contracts:
//! - [`KeyedRateLimiter`] answers immediately (used per chat user);
//! - [`GlobalRateLimiter`] waits for a slot (used in front of upstream
//!   registries, where dropping a paid call is worse than delaying it).
//!
//! All state mutations happen inside one mutex scope per limiter; nothing
//! sleeps or does I/O while holding a lock.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Entries beyond this size trigger a stale-key sweep on the next check
const PRUNE_THRESHOLD: usize = 10_000;

/// Non-blocking per-key limiter: at most one admission per key per interval
pub struct KeyedRateLimiter {
    min_interval: Duration,
    hits: Mutex<HashMap<i64, Instant>>,
}

impl KeyedRateLimiter {
    /// Creates a limiter admitting one request per `min_interval` per key
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if the request is admitted. The key's last-seen
    /// timestamp is updated only on admission, so a rejected caller cannot
    /// push its own window forward by hammering.
    pub fn allow(&self, key: i64) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock().expect("rate limiter mutex poisoned");

        // Stale-entry sweep to keep the table bounded
        if hits.len() > PRUNE_THRESHOLD {
            let min_interval = self.min_interval;
            hits.retain(|_, last| now.duration_since(*last) < min_interval);
        }

        match hits.get(&key) {
            Some(last) if now.duration_since(*last) < self.min_interval => false,
            _ => {
                hits.insert(key, now);
                true
            }
        }
    }

    /// Number of keys currently tracked
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.hits.lock().expect("rate limiter mutex poisoned").len()
    }
}

/// Blocking global limiter: at most `rate` admissions per one-second window.
///
/// `acquire` never rejects; it sleeps until the oldest admission leaves the
/// window, then re-checks.
pub struct GlobalRateLimiter {
    rate: usize,
    window: Duration,
    admissions: tokio::sync::Mutex<VecDeque<Instant>>,
}

impl GlobalRateLimiter {
    /// Creates a limiter admitting `rate` calls per second
    #[must_use]
    pub fn new(rate: usize) -> Self {
        Self {
            rate: rate.max(1),
            window: Duration::from_secs(1),
            admissions: tokio::sync::Mutex::new(VecDeque::new()),
        }
    }

    /// Waits until an admission slot exists, then claims it
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut admissions = self.admissions.lock().await;
                let now = Instant::now();
                while admissions
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= self.window)
                {
                    admissions.pop_front();
                }
                if admissions.len() < self.rate {
                    admissions.push_back(now);
                    return;
                }
                // Sleep outside the lock until the oldest admission expires,
                // then re-check: another task may claim the freed slot first
                match admissions.front() {
                    Some(oldest) => self.window.saturating_sub(now.duration_since(*oldest)),
                    None => Duration::ZERO,
                }
            };
            tokio::time::sleep(wait).await;
        }
    }
}
