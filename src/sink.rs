//! Sinks: final consumers of formatted event output.
//!
//! A sink must never stall the cache call that produced the event. The
//! built-in sinks either write synchronously to a cheap target (log facade,
//! stdout, memory) or hand off to a bounded channel without waiting.

use crate::error::{Error, Result};
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

/// Prefix applied by the log and stdout sinks.
pub const LOG_PREFIX: &str = "[CacheDebugger]";

/// Trait for event output destinations.
///
/// Failures are reported to the subscriber, which logs them and moves on.
/// Nothing is retried.
pub trait Sink: Send + Sync {
    /// Accept one formatted event.
    ///
    /// # Errors
    ///
    /// Returns `Error::SinkDeliveryError` if the output could not be delivered.
    fn accept(&self, output: &str) -> Result<()>;
}

/// Writes events through the `log` facade.
#[derive(Clone, Debug)]
pub struct LogSink {
    level: log::Level,
}

impl LogSink {
    pub fn new(level: log::Level) -> Self {
        LogSink { level }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        LogSink::new(log::Level::Info)
    }
}

impl Sink for LogSink {
    fn accept(&self, output: &str) -> Result<()> {
        log!(self.level, "{} {}", LOG_PREFIX, output);
        Ok(())
    }
}

/// Prints events to standard output.
#[derive(Clone, Debug, Default)]
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn accept(&self, output: &str) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{} {}", LOG_PREFIX, output)?;
        Ok(())
    }
}

/// Keeps every event in memory.
///
/// Clones share the same buffer, so one handle can go into the configuration
/// and another can be inspected.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the captured output, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Sink for MemorySink {
    fn accept(&self, output: &str) -> Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(output.to_string());
        Ok(())
    }
}

/// Forwards events to a bounded tokio channel.
///
/// Uses `try_send`: a full or closed channel drops the event and reports
/// `Error::SinkDeliveryError` instead of waiting.
///
/// # Example
///
/// ```
/// use cache_debugger::sink::{ChannelSink, Sink};
///
/// let (sink, mut rx) = ChannelSink::new(16);
/// sink.accept("WRITE key: k (0.1ms)").unwrap();
/// assert_eq!(rx.try_recv().unwrap(), "WRITE key: k (0.1ms)");
/// ```
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<String>,
}

impl ChannelSink {
    /// Create a sink and the receiving half of its channel.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (ChannelSink { tx }, rx)
    }
}

impl Sink for ChannelSink {
    fn accept(&self, output: &str) -> Result<()> {
        self.tx.try_send(output.to_string()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                Error::SinkDeliveryError("channel full, event dropped".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                Error::SinkDeliveryError("channel closed".to_string())
            }
        })
    }
}
