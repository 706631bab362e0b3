//! External cache store interface.
//!
//! The debugger never implements caching itself. It wraps whatever store
//! implements [`CacheBackend`] and observes the calls going through it.
//! [`InMemoryBackend`] is provided for tests, examples and local development.

use crate::error::Result;
use std::time::Duration;

pub mod inmemory;

pub use inmemory::InMemoryBackend;

/// Trait for the key/value store being observed.
///
/// **IMPORTANT:** All methods use `&self` instead of `&mut self` to allow concurrent access.
/// Backend implementations should use interior mutability (RwLock, Mutex, DashMap or
/// external storage).
///
/// **ASYNC:** All methods are async and must be awaited.
///
/// Store failures are reported as `Err` (conventionally `Error::BackendError`).
/// The instrumented facade passes them through to the caller unchanged.
#[allow(async_fn_in_trait)]
pub trait CacheBackend: Send + Sync + Clone {
    /// Retrieve value from store by key.
    ///
    /// # Returns
    /// - `Ok(Some(bytes))` - Value present
    /// - `Ok(None)` - Key absent
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs (connection lost, etc.)
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store value with optional TTL.
    ///
    /// Returns whether the store accepted the write.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool>;

    /// Remove value from store.
    ///
    /// Returns whether a value was removed.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Check if key exists in store.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
