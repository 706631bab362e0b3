//! In-process named-signal bus.
//!
//! Decouples the instrumented facade (publisher) from subscribers. Listeners
//! register for one signal name, e.g. `cache_read.hit`, or for every name.
//! Registration, removal and publishing are safe from any number of threads.
//!
//! The same listener may hold several registrations at once (overlapping
//! scopes, or a permanent scope plus a traced one). It still receives each
//! published signal once, and stays subscribed until its last registration
//! is removed.
//!
//! Uses DashMap so concurrent scope entry/exit never contends on one lock.

use crate::event::Signal;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Receiver of published signals.
pub trait Listener: Send + Sync {
    fn on_signal(&self, signal: &Signal);
}

/// Handle identifying one registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Registration {
    /// `None` matches every signal name.
    name: Option<&'static str>,
    listener: Arc<dyn Listener>,
}

impl Registration {
    fn matches(&self, name: &str) -> bool {
        self.name.map_or(true, |n| n == name)
    }
}

/// Named-signal publish/subscribe bus.
///
/// Cheap to clone; clones share the same registrations.
#[derive(Clone, Default)]
pub struct Notifier {
    registrations: Arc<DashMap<SubscriptionId, Registration>>,
    next_id: Arc<AtomicU64>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for signals named `name`.
    pub fn subscribe(&self, name: &'static str, listener: Arc<dyn Listener>) -> SubscriptionId {
        self.register(Some(name), listener)
    }

    /// Register `listener` for every signal.
    pub fn subscribe_all(&self, listener: Arc<dyn Listener>) -> SubscriptionId {
        self.register(None, listener)
    }

    fn register(&self, name: Option<&'static str>, listener: Arc<dyn Listener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registrations
            .insert(id, Registration { name, listener });
        trace!("Subscribed {:?} to {}", id, name.unwrap_or("*"));
        id
    }

    /// Remove a registration.
    ///
    /// Returns `false` if it was already gone; removing twice is a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.registrations.remove(&id).is_some();
        trace!("Unsubscribed {:?} (present: {})", id, removed);
        removed
    }

    /// Whether any registration would receive a signal with this name.
    pub fn is_listening(&self, name: &str) -> bool {
        self.registrations.iter().any(|r| r.matches(name))
    }

    pub fn listener_count(&self) -> usize {
        self.registrations.len()
    }

    /// Deliver `signal` once to every distinct matching listener on the
    /// calling thread.
    ///
    /// Listeners are collected first so none runs while a map shard is locked;
    /// a listener may therefore subscribe or unsubscribe from its callback.
    pub fn publish(&self, signal: &Signal) {
        let name = signal.name();
        let mut listeners: Vec<(SubscriptionId, Arc<dyn Listener>)> = self
            .registrations
            .iter()
            .filter(|r| r.matches(name))
            .map(|r| (*r.key(), Arc::clone(&r.listener)))
            .collect();

        // Registration order, so delivery order is stable across publishes.
        listeners.sort_unstable_by_key(|(id, _)| *id);

        let mut delivered = HashSet::with_capacity(listeners.len());
        for (_, listener) in listeners {
            if delivered.insert(listener_addr(&listener)) {
                listener.on_signal(signal);
            }
        }
    }
}

/// Identity of the listener object behind an `Arc<dyn Listener>`.
fn listener_addr(listener: &Arc<dyn Listener>) -> usize {
    Arc::as_ptr(listener) as *const () as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventDetails, EventKind};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl Listener for Recorder {
        fn on_signal(&self, signal: &Signal) {
            self.seen
                .lock()
                .expect("Failed to lock")
                .push(signal.details.key.clone());
        }
    }

    fn signal(kind: EventKind, key: &str) -> Signal {
        Signal::new(kind, EventDetails::new(key, Duration::from_micros(10)))
    }

    #[test]
    fn test_publish_matches_name() {
        let notifier = Notifier::new();
        let recorder = Arc::new(Recorder::default());
        notifier.subscribe(EventKind::Write.name(), recorder.clone());

        notifier.publish(&signal(EventKind::Write, "a"));
        notifier.publish(&signal(EventKind::Delete, "b"));

        assert_eq!(*recorder.seen.lock().expect("Failed to lock"), vec!["a"]);
    }

    #[test]
    fn test_subscribe_all() {
        let notifier = Notifier::new();
        let recorder = Arc::new(Recorder::default());
        notifier.subscribe_all(recorder.clone());

        notifier.publish(&signal(EventKind::Write, "a"));
        notifier.publish(&signal(EventKind::Exist, "b"));

        assert_eq!(
            *recorder.seen.lock().expect("Failed to lock"),
            vec!["a", "b"]
        );
        assert!(notifier.is_listening("anything"));
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let notifier = Notifier::new();
        let recorder = Arc::new(Recorder::default());
        let id = notifier.subscribe(EventKind::ReadHit.name(), recorder.clone());

        assert!(notifier.is_listening("cache_read.hit"));
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        assert!(!notifier.is_listening("cache_read.hit"));

        notifier.publish(&signal(EventKind::ReadHit, "late"));
        assert!(recorder.seen.lock().expect("Failed to lock").is_empty());
    }

    #[test]
    fn test_repeated_registration_delivers_once() {
        let notifier = Notifier::new();
        let recorder = Arc::new(Recorder::default());
        let first = notifier.subscribe(EventKind::Write.name(), recorder.clone());
        let second = notifier.subscribe(EventKind::Write.name(), recorder.clone());
        notifier.subscribe_all(recorder.clone());
        let other = Arc::new(Recorder::default());
        notifier.subscribe(EventKind::Write.name(), other.clone());

        notifier.publish(&signal(EventKind::Write, "a"));
        assert_eq!(*recorder.seen.lock().expect("Failed to lock"), vec!["a"]);
        assert_eq!(*other.seen.lock().expect("Failed to lock"), vec!["a"]);

        assert!(notifier.unsubscribe(first));
        assert!(notifier.unsubscribe(second));
        notifier.publish(&signal(EventKind::Write, "b"));
        assert_eq!(
            *recorder.seen.lock().expect("Failed to lock"),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_concurrent_subscribe_unsubscribe() {
        let notifier = Notifier::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let notifier = notifier.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let id = notifier.subscribe_all(Arc::new(Recorder::default()));
                        notifier.publish(&signal(EventKind::Write, "k"));
                        assert!(notifier.unsubscribe(id));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("Thread panicked");
        }
        assert_eq!(notifier.listener_count(), 0);
    }
}
