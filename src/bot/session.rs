//! Per-chat "last looked-at entity" store.
//!
//! Lets follow-up actions ("show courts for the company I just checked")
//! work without re-sending the identifier. Entries expire on their own; a
//! forgotten session only costs the user one extra lookup.

use moka::future::Cache;
use std::time::Duration;

/// Remembers the last resolved INN per chat
#[derive(Clone)]
pub struct SessionStore {
    cache: Cache<i64, String>,
}

impl SessionStore {
    /// Creates a store keeping entries for `ttl_secs`
    #[must_use]
    pub fn new(ttl_secs: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();
        Self { cache }
    }

    /// Records the INN a chat just resolved
    pub async fn remember(&self, chat_id: i64, inn: &str) {
        self.cache.insert(chat_id, inn.to_string()).await;
    }

    /// The INN a chat last resolved, if still remembered
    pub async fn last_inn(&self, chat_id: i64) -> Option<String> {
        self.cache.get(&chat_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_remember_and_recall() {
        let sessions = SessionStore::new(3600, 100);
        sessions.remember(42, "7707083893").await;
        assert_eq!(
            sessions.last_inn(42).await.as_deref(),
            Some("7707083893")
        );
        assert_eq!(sessions.last_inn(43).await, None);
    }

    #[tokio::test]
    async fn test_latest_lookup_wins() {
        let sessions = SessionStore::new(3600, 100);
        sessions.remember(42, "7707083893").await;
        sessions.remember(42, "500100732259").await;
        assert_eq!(
            sessions.last_inn(42).await.as_deref(),
            Some("500100732259")
        );
    }
}
