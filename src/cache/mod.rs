//! Artifact cache for Spor.
//!
//! A [`CacheStore`] is a string key/value store with per-entry TTL. Every
//! artifact the engine derives (native transcripts, AI translations,
//! embeddings, answers) goes through one injected store, namespaced by the key
//! schemes in [`keys`].

pub mod keys;
mod memory;
mod sqlite;

pub use memory::MemoryCacheStore;
pub use sqlite::SqliteCacheStore;

use crate::clock::Clock;
use crate::config::Settings;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// A stored value with its lifetime.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(key: String, value: String, created_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            key,
            value,
            created_at,
            ttl,
        }
    }

    /// The instant after which the entry must not be served.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let ttl = chrono::Duration::from_std(self.ttl).ok()?;
        self.created_at.checked_add_signed(ttl)
    }

    /// True once `now > created_at + ttl`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(expires_at) => now > expires_at,
            None => false,
        }
    }
}

/// Trait for cache backends.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a live entry. Expired entries are never returned.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Insert or replace an entry.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Delete a single entry. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Delete every entry whose key starts with `prefix`.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize>;

    /// Drop all expired entries.
    async fn purge_expired(&self) -> Result<usize>;

    /// Number of stored entries, expired or not.
    async fn len(&self) -> Result<usize>;
}

/// Read and deserialize a JSON value.
///
/// A value that no longer deserializes (e.g. written by an older version) is
/// treated as a miss.
pub async fn get_json<T: DeserializeOwned>(store: &dyn CacheStore, key: &str) -> Result<Option<T>> {
    let Some(entry) = store.get(key).await? else {
        return Ok(None);
    };

    match serde_json::from_str(&entry.value) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("Discarding undecodable cache entry {}: {}", key, e);
            Ok(None)
        }
    }
}

/// Serialize and store a JSON value.
pub async fn set_json<T: Serialize>(
    store: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<()> {
    let encoded = serde_json::to_string(value)?;
    store.set(key, encoded, ttl).await
}

/// Create the cache store selected in settings.
pub fn create_cache_store(settings: &Settings, clock: Arc<dyn Clock>) -> Result<Arc<dyn CacheStore>> {
    match settings.cache.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryCacheStore::new(clock))),
        "sqlite" => Ok(Arc::new(SqliteCacheStore::new(&settings.cache_path(), clock)?)),
        other => Err(crate::error::SporError::Config(format!(
            "Unknown cache backend: {}",
            other
        ))),
    }
}
