//! Instrumented cache facade.
//!
//! [`InstrumentedCache`] wraps a [`CacheBackend`], times every call, and
//! publishes a [`Signal`] describing the outcome. Instrumentation is a side
//! channel only: return values and errors are exactly those of the wrapped
//! store, whether or not anything is listening.
//!
//! # Example
//!
//! ```no_run
//! use cache_debugger::{backend::InMemoryBackend, CacheDebugger};
//!
//! # async fn run() -> cache_debugger::Result<()> {
//! let debugger = CacheDebugger::global();
//! let cache = debugger.instrument(InMemoryBackend::new());
//!
//! debugger
//!     .trace(|| async {
//!         cache.write("user:1", "Alice").await?;
//!         let name: Option<String> = cache.read("user:1").await?;
//!         let greeting: String = cache
//!             .fetch("greeting", || async { Ok("hello".to_string()) })
//!             .await?;
//!         Ok::<_, cache_debugger::Error>((name, greeting))
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::backend::CacheBackend;
use crate::error::{Error, Result};
use crate::event::{EventDetails, EventKind, Signal};
use crate::notifications::Notifier;
use crate::serialization::{decode_value, encode_value};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::{Duration, Instant};

/// Cache facade that publishes a signal for every operation.
#[derive(Clone)]
pub struct InstrumentedCache<B: CacheBackend> {
    backend: B,
    notifier: Notifier,
}

impl<B: CacheBackend> InstrumentedCache<B> {
    /// Wrap `backend`, publishing signals on `notifier`.
    pub fn new(backend: B, notifier: Notifier) -> Self {
        InstrumentedCache { backend, notifier }
    }

    /// Get backend reference (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Read a value.
    ///
    /// Publishes `ReadHit` with the value, or `ReadMiss` when absent.
    ///
    /// # Errors
    ///
    /// Returns the store's error, or a decoding error for foreign/stale bytes,
    /// after publishing `OperationError`.
    pub async fn read<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let start = Instant::now();
        let result = self.load::<T>(key).await;
        let elapsed = start.elapsed();

        match result {
            Ok(value) => {
                let kind = if value.is_some() {
                    EventKind::ReadHit
                } else {
                    EventKind::ReadMiss
                };
                self.emit(kind, || {
                    EventDetails::new(key, elapsed).with_value(value.as_ref().and_then(to_json))
                });
                Ok(value)
            }
            Err(e) => Err(self.fail("read", key, elapsed, e)),
        }
    }

    /// Write a value with the backend's default TTL.
    ///
    /// Returns the store's acknowledgement. Publishes `Write`.
    ///
    /// # Errors
    ///
    /// Returns the store's error (or a serialization error) after publishing
    /// `OperationError`.
    pub async fn write<T>(&self, key: &str, value: &T) -> Result<bool>
    where
        T: Serialize + ?Sized,
    {
        self.write_with_ttl(key, value, None).await
    }

    /// Write a value with an explicit TTL. Publishes `Write`.
    ///
    /// # Errors
    ///
    /// Same as [`InstrumentedCache::write`].
    pub async fn write_with_ttl<T>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<bool>
    where
        T: Serialize + ?Sized,
    {
        let start = Instant::now();
        let result = self.store(key, value, ttl).await;
        let elapsed = start.elapsed();

        match result {
            Ok(stored) => {
                self.emit(EventKind::Write, || {
                    EventDetails::new(key, elapsed).with_value(to_json(value))
                });
                Ok(stored)
            }
            Err(e) => Err(self.fail("write", key, elapsed, e)),
        }
    }

    /// Delete a key. Publishes `Delete`.
    ///
    /// # Errors
    ///
    /// Returns the store's error after publishing `OperationError`.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let start = Instant::now();
        let result = self.backend.delete(key).await;
        let elapsed = start.elapsed();

        match result {
            Ok(removed) => {
                self.emit(EventKind::Delete, || EventDetails::new(key, elapsed));
                Ok(removed)
            }
            Err(e) => Err(self.fail("delete", key, elapsed, e)),
        }
    }

    /// Check whether a key exists. Publishes `Exist` with the result.
    ///
    /// # Errors
    ///
    /// Returns the store's error after publishing `OperationError`.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let start = Instant::now();
        let result = self.backend.exists(key).await;
        let elapsed = start.elapsed();

        match result {
            Ok(exists) => {
                self.emit(EventKind::Exist, || {
                    EventDetails::new(key, elapsed).with_exists(exists)
                });
                Ok(exists)
            }
            Err(e) => Err(self.fail("exists", key, elapsed, e)),
        }
    }

    /// Return the stored value, or compute, store and return it.
    ///
    /// Publishes `FetchHit` without calling `compute` when the key is present,
    /// otherwise `FetchMiss` with the computed value. The duration covers the
    /// whole call, compute included.
    ///
    /// # Errors
    ///
    /// - `compute`'s own error is returned unchanged and publishes nothing.
    /// - Store or decoding errors publish `OperationError` and are returned.
    pub async fn fetch<T, F, Fut>(&self, key: &str, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let start = Instant::now();

        let cached = match self.load::<T>(key).await {
            Ok(cached) => cached,
            Err(e) => return Err(self.fail("fetch", key, start.elapsed(), e)),
        };

        if let Some(value) = cached {
            let elapsed = start.elapsed();
            self.emit(EventKind::FetchHit, || {
                EventDetails::new(key, elapsed).with_value(to_json(&value))
            });
            return Ok(value);
        }

        let value = compute().await?;

        if let Err(e) = self.store(key, &value, None).await {
            return Err(self.fail("fetch", key, start.elapsed(), e));
        }

        let elapsed = start.elapsed();
        self.emit(EventKind::FetchMiss, || {
            EventDetails::new(key, elapsed).with_value(to_json(&value))
        });
        Ok(value)
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.backend.get(key).await? {
            Some(bytes) => decode_value(&bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn store<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<bool>
    where
        T: Serialize + ?Sized,
    {
        let bytes = encode_value(value)?;
        self.backend.set(key, bytes, ttl).await
    }

    /// Publish a signal if anyone listens for `kind`. Details are built lazily.
    fn emit(&self, kind: EventKind, details: impl FnOnce() -> EventDetails) {
        if self.notifier.is_listening(kind.name()) {
            self.notifier.publish(&Signal::new(kind, details()));
        }
    }

    /// Publish `OperationError` and hand the error back for propagation.
    fn fail(&self, operation: &'static str, key: &str, elapsed: Duration, error: Error) -> Error {
        debug!("Cache {} failed for {}: {}", operation, key, error);
        self.emit(EventKind::OperationError, || {
            EventDetails::new(key, elapsed).with_error(operation, error.message())
        });
        error
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Option<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| debug!("Value not representable in event details: {}", e))
        .ok()
}
