//! # cache-debugger
//!
//! Structured, filterable, sampled diagnostic events for key/value cache
//! operations, without touching the call sites that use the cache.
//!
//! ## Features
//!
//! - **Transparent:** The instrumented facade returns exactly what the store returns
//! - **Scoped:** Events are captured only inside a scope (or always, if configured)
//! - **Filterable:** Kind allow-list, per-event sampling and a custom predicate
//! - **Pluggable output:** Text or JSON to the `log` facade, stdout, memory or a channel
//! - **Best effort:** Formatting and sink failures never reach the cache caller
//!
//! ## Pipeline
//!
//! ```text
//! InstrumentedCache::read ─► store ─► Signal ─► Notifier ─► Subscriber (scope active)
//!                                                              │ enabled?
//!                                                              │ kind observed?
//!                                                              │ sampled in?
//!                                                              │ custom_filter?
//!                                                              ├─► on_event hook
//!                                                              └─► format ─► Sink
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use cache_debugger::{
//!     backend::InMemoryBackend,
//!     config::{Config, Format},
//!     sink::StdoutSink,
//!     CacheDebugger, EventKind,
//! };
//!
//! let debugger = CacheDebugger::new(
//!     Config::default()
//!         .with_format(Format::Json)
//!         .observe(EventKind::OperationError)
//!         .with_sink(StdoutSink),
//! )?;
//!
//! let cache = debugger.instrument(InMemoryBackend::new());
//!
//! debugger
//!     .trace(|| async {
//!         cache.write("user:1", "Alice").await?;
//!         cache.read::<String>("user:1").await
//!     })
//!     .await?;
//! // [CacheDebugger] {"event":"cache_write","timestamp":"...","details":{"key":"user:1",...}}
//! // [CacheDebugger] {"event":"cache_read.hit","timestamp":"...","details":{"key":"user:1",...}}
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod config;
pub mod debugger;
pub mod error;
pub mod event;
pub mod format;
pub mod instrumented;
pub mod notifications;
pub mod serialization;
pub mod sink;
pub mod subscriber;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use config::{Config, Format};
pub use debugger::CacheDebugger;
pub use error::{Error, Result};
pub use event::{EventDetails, EventKind, Signal};
pub use format::format_event;
pub use instrumented::InstrumentedCache;
pub use sink::Sink;
pub use subscriber::{Outcome, Scope, Subscriber};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
