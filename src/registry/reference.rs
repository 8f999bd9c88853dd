//! Reference data lookups: OKVED activity codes and federal region names.
//!
//! Read-mostly SQLite tables populated out of band. Lookup failures are
//! never fatal — enrichment simply does not happen.

use crate::registry::error::CacheError;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::warn;

const CREATE_SQL: &str = "
CREATE TABLE IF NOT EXISTS okved (
    code TEXT PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS regions (
    code TEXT PRIMARY KEY,
    name TEXT NOT NULL
);
";

/// OKVED/region display-name lookup
#[derive(Clone)]
pub struct ReferenceData {
    conn: Arc<Mutex<Connection>>,
}

impl ReferenceData {
    /// Opens (or creates) the reference database at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be applied.
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

    /// Opens an empty in-memory reference database (tests, dry runs)
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

    /// Display name for an OKVED activity code, if known
    pub async fn okved_name(&self, code: &str) -> Option<String> {
        self.lookup("SELECT name FROM okved WHERE code = ?1", code).await
    }

    /// Display name for a federal region code, if known
    pub async fn region_name(&self, code: &str) -> Option<String> {
        self.lookup("SELECT name FROM regions WHERE code = ?1", code)
            .await
    }

    async fn lookup(&self, sql: &'static str, code: &str) -> Option<String> {
        if code.is_empty() {
            return None;
        }
        let conn = Arc::clone(&self.conn);
        let code = code.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("reference mutex poisoned");
            conn.query_row(sql, params![code], |r| r.get::<_, String>(0))
                .optional()
        })
        .await;
        match result {
            Ok(Ok(name)) => name,
            Ok(Err(e)) => {
                warn!("reference lookup failed: {e}");
                None
            }
            Err(e) => {
                warn!("reference lookup task failed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(reference: &ReferenceData) {
        let conn = reference.conn.lock().expect("reference mutex poisoned");
        conn.execute(
            "INSERT INTO okved (code, name) VALUES (?1, ?2)",
            params!["62.01", "Разработка компьютерного программного обеспечения"],
        )
        .expect("seed okved");
        conn.execute(
            "INSERT INTO regions (code, name) VALUES (?1, ?2)",
            params!["77", "Москва"],
        )
        .expect("seed regions");
    }

    #[tokio::test]
    async fn test_known_codes_resolve() -> Result<(), CacheError> {
        let reference = ReferenceData::open_in_memory()?;
        seed(&reference);

        assert_eq!(
            reference.okved_name("62.01").await.as_deref(),
            Some("Разработка компьютерного программного обеспечения")
        );
        assert_eq!(reference.region_name("77").await.as_deref(), Some("Москва"));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_or_empty_code_is_none() -> Result<(), CacheError> {
        let reference = ReferenceData::open_in_memory()?;
        seed(&reference);

        assert_eq!(reference.okved_name("99.99").await, None);
        assert_eq!(reference.okved_name("").await, None);
        Ok(())
    }
}
