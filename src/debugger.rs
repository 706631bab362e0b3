//! Process-wide debugger handle.
//!
//! [`CacheDebugger`] ties together the notification bus, the subscriber and
//! its configuration. It hands out instrumented caches and scopes, and
//! optionally keeps a permanent scope open (`always_on`).
//!
//! # Example
//!
//! ```no_run
//! use cache_debugger::{backend::InMemoryBackend, CacheDebugger, EventKind};
//!
//! # async fn run() -> cache_debugger::Result<()> {
//! let debugger = CacheDebugger::global();
//! debugger.configure(|config| {
//!     config.observed_kinds.insert(EventKind::Delete);
//!     config.sampling_rate = Some(0.1);
//! })?;
//!
//! let cache = debugger.instrument(InMemoryBackend::new());
//! debugger.trace(|| cache.delete("session:42")).await?;
//! # Ok(())
//! # }
//! ```

use crate::backend::CacheBackend;
use crate::config::Config;
use crate::error::Result;
use crate::instrumented::InstrumentedCache;
use crate::notifications::Notifier;
use crate::subscriber::{Scope, Subscriber};
use std::future::Future;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Shared debugger handle.
///
/// Cheap to clone; clones share configuration, bus and scopes.
#[derive(Clone)]
pub struct CacheDebugger {
    notifier: Notifier,
    subscriber: Arc<Subscriber>,
    /// Permanent scope held while `always_on` is set.
    global_scope: Arc<Mutex<Option<Scope>>>,
}

impl Default for CacheDebugger {
    fn default() -> Self {
        Self::from_subscriber(Subscriber::default())
    }
}

impl CacheDebugger {
    /// Create a debugger with a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` if `config` fails validation.
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self::from_subscriber(Subscriber::new(config)?))
    }

    fn from_subscriber(subscriber: Subscriber) -> Self {
        let debugger = CacheDebugger {
            notifier: Notifier::new(),
            subscriber: Arc::new(subscriber),
            global_scope: Arc::new(Mutex::new(None)),
        };
        debugger.sync_global_scope();
        debugger
    }

    /// The process-wide debugger, created with the default configuration on
    /// first use.
    pub fn global() -> &'static CacheDebugger {
        static GLOBAL: OnceLock<CacheDebugger> = OnceLock::new();
        GLOBAL.get_or_init(CacheDebugger::default)
    }

    /// Current configuration snapshot.
    pub fn configuration(&self) -> Arc<Config> {
        self.subscriber.configuration()
    }

    /// Edit a copy of the configuration, validate it and swap it in.
    ///
    /// Meant for process start. Concurrent readers see the old or the new
    /// configuration, never a mix. Kinds are registered when a scope opens,
    /// so scopes that are already open keep their original kind set.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` and leaves the current
    /// configuration in place if the edited copy fails validation.
    pub fn configure<F>(&self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = Config::clone(&self.configuration());
        edit(&mut config);
        self.set_configuration(config)
    }

    /// Replace the configuration wholesale.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` if `config` fails validation.
    pub fn set_configuration(&self, config: Config) -> Result<()> {
        self.subscriber.reconfigure(config)?;
        self.sync_global_scope();
        info!("Cache debugger reconfigured: {:?}", self.configuration());
        Ok(())
    }

    /// Open or close the permanent scope to match `always_on`.
    fn sync_global_scope(&self) {
        let always_on = self.configuration().always_on;
        let mut global = self
            .global_scope
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Reopen on every change so the registered kinds follow the config.
        *global = None;
        if always_on {
            *global = Some(self.scope());
        }
    }

    /// Whether signals are captured outside explicit scopes.
    pub fn is_always_on(&self) -> bool {
        self.global_scope
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(Scope::is_active)
    }

    /// Open a scope. Capturing stops when the returned guard is dropped.
    pub fn scope(&self) -> Scope {
        Scope::open(&self.notifier, &self.subscriber)
    }

    /// Run `work` with a scope open around it.
    ///
    /// The scope is released when `work` finishes, panics, or the returned
    /// future is dropped before completion.
    pub async fn trace<F, Fut, T>(&self, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _scope = self.scope();
        work().await
    }

    /// Blocking counterpart of [`CacheDebugger::trace`].
    pub fn trace_sync<F, T>(&self, work: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _scope = self.scope();
        work()
    }

    /// Wrap a store so its operations publish on this debugger's bus.
    pub fn instrument<B: CacheBackend>(&self, backend: B) -> InstrumentedCache<B> {
        InstrumentedCache::new(backend, self.notifier.clone())
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn subscriber(&self) -> &Arc<Subscriber> {
        &self.subscriber
    }
}
