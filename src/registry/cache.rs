//! Durable TTL cache over an embedded SQLite table.
//!
//! Schema: `cache (key TEXT PRIMARY KEY, value TEXT NOT NULL,
//! expires_at REAL NOT NULL)`. A read past `expires_at` behaves exactly like
//! a miss and deletes the row; `cleanup` exists only to reclaim space and is
//! not needed for correctness.

use crate::registry::error::CacheError;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

const CREATE_SQL: &str = "
CREATE TABLE IF NOT EXISTS cache (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    expires_at REAL NOT NULL
);
";

/// Keyed JSON store with per-entry expiry.
///
/// Writes to the same key serialize on the connection mutex; the blocking
/// SQLite work runs on the tokio blocking pool so async callers never stall
/// a worker thread.
#[derive(Clone)]
pub struct SqliteCache {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCache {
    /// Opens (or creates) the cache database at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the database directory cannot be created or the
    /// schema cannot be applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        if let Some(dir) = path.as_ref().parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens a throwaway in-memory cache (used by tests and dry runs)
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot create the in-memory database.
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Fetches and deserializes the value under `key`.
    ///
    /// An expired entry is indistinguishable from a missing one and is
    /// deleted on the way out.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure or if the stored JSON no longer
    /// matches `T`.
    pub async fn get<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("cache mutex poisoned");
            let row: Option<(String, f64)> = conn
                .query_row(
                    "SELECT value, expires_at FROM cache WHERE key = ?1",
                    params![key],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?;
            let Some((value, expires_at)) = row else {
                return Ok(None);
            };
            if unix_now() > expires_at {
                debug!("evicting expired cache entry {key}");
                conn.execute("DELETE FROM cache WHERE key = ?1", params![key])?;
                return Ok(None);
            }
            Ok(Some(serde_json::from_str(&value)?))
        })
        .await
        .map_err(|e| CacheError::Task(e.to_string()))?
    }

    /// Stores `value` under `key` for `ttl`. Unconditional upsert; the last
    /// writer wins.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure or if `value` cannot serialize.
    pub async fn set<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let payload = serde_json::to_string(value)?;
        let expires_at = unix_now() + ttl.as_secs_f64();
        let conn = Arc::clone(&self.conn);
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("cache mutex poisoned");
            conn.execute(
                "INSERT OR REPLACE INTO cache (key, value, expires_at) VALUES (?1, ?2, ?3)",
                params![key, payload, expires_at],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| CacheError::Task(e.to_string()))?
    }

    /// Deletes every expired row; returns how many were removed
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure.
    pub async fn cleanup(&self) -> Result<usize, CacheError> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("cache mutex poisoned");
            let removed = conn.execute("DELETE FROM cache WHERE expires_at < ?1", params![unix_now()])?;
            Ok(removed)
        })
        .await
        .map_err(|e| CacheError::Task(e.to_string()))?
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
    struct Payload {
        name: String,
        values: Vec<i64>,
    }

    fn payload() -> Payload {
        Payload {
            name: "ООО Ромашка".to_string(),
            values: vec![1, 2, 3],
        }
    }

    #[tokio::test]
    async fn test_set_then_get_round_trips() -> Result<(), CacheError> {
        let cache = SqliteCache::open_in_memory()?;
        cache
            .set("card|7707083893", &payload(), Duration::from_secs(60))
            .await?;
        let loaded: Option<Payload> = cache.get("card|7707083893").await?;
        assert_eq!(loaded, Some(payload()));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_key_is_none() -> Result<(), CacheError> {
        let cache = SqliteCache::open_in_memory()?;
        let loaded: Option<Payload> = cache.get("nope").await?;
        assert_eq!(loaded, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_entry_behaves_like_miss_and_stays_gone() -> Result<(), CacheError> {
        let cache = SqliteCache::open_in_memory()?;
        cache
            .set("short", &payload(), Duration::from_millis(50))
            .await?;
        tokio::time::sleep(Duration::from_millis(120)).await;

        let first: Option<Payload> = cache.get("short").await?;
        assert_eq!(first, None);
        // No resurrection on an immediate re-read
        let second: Option<Payload> = cache.get("short").await?;
        assert_eq!(second, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_overwrites_previous_value() -> Result<(), CacheError> {
        let cache = SqliteCache::open_in_memory()?;
        cache.set("k", &payload(), Duration::from_secs(60)).await?;
        let replacement = Payload {
            name: "ИП Иванов".to_string(),
            values: vec![9],
        };
        cache.set("k", &replacement, Duration::from_secs(60)).await?;
        let loaded: Option<Payload> = cache.get("k").await?;
        assert_eq!(loaded, Some(replacement));
        Ok(())
    }

    #[tokio::test]
    async fn test_cleanup_reclaims_expired_rows_only() -> Result<(), CacheError> {
        let cache = SqliteCache::open_in_memory()?;
        cache
            .set("stale", &payload(), Duration::from_millis(10))
            .await?;
        cache.set("fresh", &payload(), Duration::from_secs(60)).await?;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(cache.cleanup().await?, 1);
        let fresh: Option<Payload> = cache.get("fresh").await?;
        assert_eq!(fresh, Some(payload()));
        Ok(())
    }
}
