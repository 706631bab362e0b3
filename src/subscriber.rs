//! Signal gating and routing.
//!
//! [`Subscriber`] decides whether a signal becomes an event and, if so,
//! formats it and hands it to the configured sink. [`Scope`] is the guard that
//! keeps a subscriber registered on the notification bus for the duration of
//! a unit of work.
//!
//! # Decision order
//!
//! ```text
//! signal
//!   ├─ enabled == false ............... drop (Disabled)
//!   ├─ kind not observed .............. drop (NotObserved)
//!   ├─ sampling draw >= sampling_rate . drop (SampledOut)
//!   ├─ custom_filter returns false .... drop (Filtered)
//!   ├─ on_event(kind, details)          result and panics ignored
//!   ├─ format ......................... failure swallowed (FormatFailed)
//!   └─ sink.accept .................... failure logged (SinkFailed)
//! ```

use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::{EventKind, Signal};
use crate::format::format_signal;
use crate::notifications::{Listener, Notifier, SubscriptionId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// What happened to one signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Disabled,
    NotObserved,
    SampledOut,
    Filtered,
    FormatFailed,
    SinkFailed,
    Delivered,
}

/// Configuration snapshot plus the sampling source built for it.
struct State {
    config: Arc<Config>,
    seeded: Option<Mutex<StdRng>>,
}

impl State {
    fn new(config: Config) -> Self {
        let seeded = config
            .sampling_seed
            .map(|seed| Mutex::new(StdRng::seed_from_u64(seed)));
        State {
            config: Arc::new(config),
            seeded,
        }
    }

    /// Uniform draw from `[0, 1)`.
    fn draw(&self) -> f64 {
        match &self.seeded {
            Some(rng) => rng
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .random::<f64>(),
            None => rand::rng().random::<f64>(),
        }
    }
}

/// Gate-and-route pipeline for signals.
///
/// Readers take a snapshot of the whole configuration per signal, so a
/// concurrent [`Subscriber::reconfigure`] is observed either entirely or not
/// at all.
pub struct Subscriber {
    state: RwLock<Arc<State>>,
}

impl Subscriber {
    /// Create a subscriber with a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` if `config` fails validation.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Subscriber {
            state: RwLock::new(Arc::new(State::new(config))),
        })
    }

    /// Current configuration.
    pub fn configuration(&self) -> Arc<Config> {
        Arc::clone(&self.snapshot().config)
    }

    /// Replace the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` and keeps the current
    /// configuration if `config` fails validation.
    pub fn reconfigure(&self, config: Config) -> Result<()> {
        config.validate()?;
        let state = Arc::new(State::new(config));
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
        Ok(())
    }

    fn snapshot(&self) -> Arc<State> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Run one signal through the pipeline.
    ///
    /// Never panics and never returns an error: every diagnostic failure is
    /// logged and reported through the returned [`Outcome`].
    pub fn process(&self, signal: &Signal) -> Outcome {
        let state = self.snapshot();
        let config = &state.config;
        let kind = signal.kind;

        if !config.enabled {
            return Outcome::Disabled;
        }

        if !config.observes(kind) {
            return Outcome::NotObserved;
        }

        if let Some(rate) = config.sampling_rate {
            let exempt = kind == EventKind::OperationError && !config.sample_errors;
            if !exempt && state.draw() >= rate {
                trace!("Sampled out {} for {}", kind, signal.details.key);
                return Outcome::SampledOut;
            }
        }

        if let Some(filter) = &config.custom_filter {
            match catch_unwind(AssertUnwindSafe(|| filter(kind, &signal.details))) {
                Ok(true) => {}
                Ok(false) => return Outcome::Filtered,
                Err(_) => {
                    warn!("custom_filter panicked on {}; event dropped", kind);
                    return Outcome::Filtered;
                }
            }
        }

        if let Some(hook) = &config.on_event {
            if catch_unwind(AssertUnwindSafe(|| hook(kind, &signal.details))).is_err() {
                warn!("on_event hook panicked on {}; continuing delivery", kind);
            }
        }

        // Neither built-in format fails on valid details.
        let output = match format_signal(signal, config.format) {
            Ok(output) => output,
            Err(e) => {
                warn!("Failed to format {} for {}: {}", kind, signal.details.key, e);
                return Outcome::FormatFailed;
            }
        };

        let delivered = catch_unwind(AssertUnwindSafe(|| config.sink.accept(&output)))
            .unwrap_or_else(|_| Err(Error::SinkDeliveryError("sink panicked".to_string())));

        match delivered {
            Ok(()) => Outcome::Delivered,
            Err(e) => {
                warn!("Failed to deliver {} event: {}", kind, e);
                Outcome::SinkFailed
            }
        }
    }
}

impl Default for Subscriber {
    fn default() -> Self {
        Subscriber {
            state: RwLock::new(Arc::new(State::new(Config::default()))),
        }
    }
}

impl Listener for Subscriber {
    fn on_signal(&self, signal: &Signal) {
        self.process(signal);
    }
}

/// Active listening period.
///
/// Opening a scope registers the subscriber once per observed kind (as
/// configured at that moment). Every registration is removed when the scope
/// is closed or dropped, including during unwinding and when an async task
/// holding it is cancelled. A scope only ever removes its own registrations.
#[must_use = "a Scope stops capturing as soon as it is dropped"]
pub struct Scope {
    notifier: Notifier,
    handles: Vec<SubscriptionId>,
}

impl Scope {
    /// Register `subscriber` on `notifier` for each observed kind.
    ///
    /// A disabled configuration registers nothing, so the facade does not
    /// even build signals while the scope is open.
    pub fn open(notifier: &Notifier, subscriber: &Arc<Subscriber>) -> Self {
        let config = subscriber.configuration();
        if !config.enabled {
            debug!("Cache debugger disabled; scope registers no listeners");
            return Scope {
                notifier: notifier.clone(),
                handles: Vec::new(),
            };
        }

        let listener: Arc<dyn Listener> = subscriber.clone();
        let handles: Vec<_> = config
            .observed_kinds
            .iter()
            .map(|kind| notifier.subscribe(kind.name(), Arc::clone(&listener)))
            .collect();

        debug!("Opened cache debugger scope ({} listeners)", handles.len());

        Scope {
            notifier: notifier.clone(),
            handles,
        }
    }

    /// Registrations still held by this scope.
    pub fn handles(&self) -> &[SubscriptionId] {
        &self.handles
    }

    pub fn is_active(&self) -> bool {
        !self.handles.is_empty()
    }

    /// Release every registration. Calling it again does nothing.
    ///
    /// Returns how many registrations were actually removed.
    pub fn close(&mut self) -> usize {
        if self.handles.is_empty() {
            return 0;
        }

        let removed = self
            .handles
            .drain(..)
            .filter(|id| self.notifier.unsubscribe(*id))
            .count();
        debug!("Closed cache debugger scope ({} listeners)", removed);
        removed
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.close();
    }
}
