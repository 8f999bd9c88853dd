//! Flood protection for "slow down" notices.
//!
//! A rate-limited user who keeps hammering would otherwise receive a notice
//! for every rejected request, turning our own throttle into a Telegram
//! flood. Each user gets the notice once per cooldown; further rejections
//! are silenced and only counted.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Tracks which users recently received a rate-limit notice
#[derive(Clone)]
pub struct RateNoticeCache {
    cache: Cache<i64, ()>,
    silenced_count: Arc<AtomicU64>,
}

impl RateNoticeCache {
    /// Creates a notice cache.
    ///
    /// # Arguments
    ///
    /// * `cooldown_secs` - Seconds between notices to the same user
    /// * `max_capacity` - Maximum number of tracked users
    #[must_use]
    pub fn new(cooldown_secs: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(cooldown_secs))
            .build();
        Self {
            cache,
            silenced_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns `true` if a notice should be sent to this user now.
    /// Silenced attempts are logged with throttling (every 100th).
    pub async fn should_send(&self, user_id: i64) -> bool {
        if self.cache.get(&user_id).await.is_none() {
            return true;
        }
        let count = self.silenced_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count % 100 == 0 {
            debug!("silenced {count} rate-limit notices (recent: user {user_id})");
        }
        false
    }

    /// Marks that a notice was sent, starting the cooldown
    pub async fn mark_sent(&self, user_id: i64) {
        self.cache.insert(user_id, ()).await;
    }

    /// Total silenced notices since start (for stats)
    #[must_use]
    pub fn silenced_count(&self) -> u64 {
        self.silenced_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_notice_allowed() {
        let cache = RateNoticeCache::new(30, 100);
        assert!(cache.should_send(12345).await);
    }

    #[tokio::test]
    async fn test_cooldown_silences_second_notice() {
        let cache = RateNoticeCache::new(30, 100);
        assert!(cache.should_send(12345).await);
        cache.mark_sent(12345).await;
        assert!(!cache.should_send(12345).await);
        assert_eq!(cache.silenced_count(), 1);
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let cache = RateNoticeCache::new(30, 100);
        cache.mark_sent(111).await;
        assert!(cache.should_send(222).await);
    }
}
