//! In-memory cache store.
//!
//! Useful for testing and single-process deployments.

use super::{CacheEntry, CacheStore};
use crate::clock::Clock;
use crate::error::{Result, SporError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// In-memory cache store.
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCacheStore {
    /// Create a new in-memory cache store.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    fn poisoned<T>(e: std::sync::PoisonError<T>) -> SporError {
        SporError::Cache(format!("Cache lock poisoned: {}", e))
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let now = self.clock.now();

        {
            let entries = self.entries.read().map_err(Self::poisoned)?;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.clone())),
                Some(_) => {}
            }
        }

        // Expired: evict lazily.
        let mut entries = self.entries.write().map_err(Self::poisoned)?;
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(key.to_string(), value, self.clock.now(), ttl);
        let mut entries = self.entries.write().map_err(Self::poisoned)?;
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.write().map_err(Self::poisoned)?;
        Ok(entries.remove(key).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let mut entries = self.entries.write().map_err(Self::poisoned)?;
        let initial_len = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(initial_len - entries.len())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut entries = self.entries.write().map_err(Self::poisoned)?;
        let initial_len = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(initial_len - entries.len())
    }

    async fn len(&self) -> Result<usize> {
        let entries = self.entries.read().map_err(Self::poisoned)?;
        Ok(entries.len())
    }
}
