//! In-memory reference store.
//!
//! Uses DashMap for concurrent access with per-key sharding.
//! Expired entries are dropped lazily on access.

use super::CacheBackend;
use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Entry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(data: Vec<u8>, ttl: Option<Duration>) -> Self {
        Entry {
            data,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() > exp)
    }
}

/// Thread-safe in-memory store.
///
/// Clones share the same map.
///
/// # Example
///
/// ```no_run
/// use cache_debugger::backend::{CacheBackend, InMemoryBackend};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = InMemoryBackend::new();
///     backend.set("key1", b"value".to_vec(), None).await?;
///     assert!(backend.get("key1").await?.is_some());
///     Ok(())
/// }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, Entry>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until next access.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn clear(&self) {
        self.store.clear();
        debug!("InMemory CLEAR");
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.store.get(key) {
            if !entry.is_expired() {
                return Ok(Some(entry.data.clone()));
            }
        }

        self.store.remove_if(key, |_, entry| entry.is_expired());
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool> {
        self.store.insert(key.to_string(), Entry::new(value, ttl));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self
            .store
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired()))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self
            .store
            .get(key)
            .is_some_and(|entry| !entry.is_expired()))
    }
}
