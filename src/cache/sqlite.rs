//! SQLite-based cache store.
//!
//! Expiry is evaluated in Rust against the injected clock rather than in SQL,
//! so the same TTL rules apply as for the in-memory store.

use super::{CacheEntry, CacheStore};
use crate::clock::Clock;
use crate::error::{Result, SporError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS cache_entries (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        created_at TEXT NOT NULL,
        ttl_ms INTEGER NOT NULL
    );
"#;

/// SQLite-based cache store.
pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl SqliteCacheStore {
    /// Open (or create) a cache database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path, clock: Arc<dyn Clock>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite cache at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
            clock,
        })
    }

    /// Create an in-memory SQLite cache (useful for testing).
    pub fn in_memory(clock: Arc<dyn Clock>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            clock,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SporError::Cache(format!("Failed to acquire lock: {}", e)))
    }

    fn parse_created_at(raw: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| SporError::Cache(format!("Invalid created_at '{}': {}", raw, e)))
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let conn = self.lock()?;

        let row: Option<(String, String, i64)> = conn
            .query_row(
                "SELECT value, created_at, ttl_ms FROM cache_entries WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((value, created_at, ttl_ms)) = row else {
            return Ok(None);
        };

        let entry = CacheEntry::new(
            key.to_string(),
            value,
            Self::parse_created_at(&created_at)?,
            Duration::from_millis(ttl_ms.max(0) as u64),
        );

        if entry.is_expired(self.clock.now()) {
            debug!("Evicting expired cache entry {}", key);
            conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO cache_entries (key, value, created_at, ttl_ms)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                key,
                value,
                self.clock.now().to_rfc3339(),
                ttl.as_millis().min(i64::MAX as u128) as i64,
            ],
        )?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        Ok(deleted > 0)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM cache_entries WHERE substr(key, 1, length(?1)) = ?1",
            params![prefix],
        )?;
        Ok(deleted)
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let conn = self.lock()?;

        let expired: Vec<String> = {
            let mut stmt = conn.prepare("SELECT key, created_at, ttl_ms FROM cache_entries")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?;

            let mut expired = Vec::new();
            for row in rows {
                let (key, created_at, ttl_ms) = row?;
                let entry = CacheEntry::new(
                    key,
                    String::new(),
                    Self::parse_created_at(&created_at)?,
                    Duration::from_millis(ttl_ms.max(0) as u64),
                );
                if entry.is_expired(now) {
                    expired.push(entry.key);
                }
            }
            expired
        };

        let tx = conn.unchecked_transaction()?;
        for key in &expired {
            tx.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        }
        tx.commit()?;

        info!("Purged {} expired cache entries", expired.len());
        Ok(expired.len())
    }

    async fn len(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
