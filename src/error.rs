//! Error types for the cache debugger.

use std::fmt;

/// Result type for cache debugger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the cache debugger.
///
/// Errors fall in two groups. Errors that describe the wrapped cache operation
/// (`BackendError`, the serialization variants) always reach the caller.
/// Diagnostic errors (`FormattingError`, `SinkDeliveryError`) are produced
/// inside the event pipeline, logged there and never returned from a cache call.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration rejected by validation.
    ///
    /// Raised when:
    /// - `sampling_rate` is NaN or outside `[0.0, 1.0]`
    /// - an output format name is not `text` or `json`
    /// - an event name in settings does not match any `EventKind`
    ///
    /// **Recovery:** Fix configuration; the previous configuration stays active.
    InvalidConfiguration(String),

    /// The external cache store failed.
    ///
    /// The instrumented facade emits an `OperationError` event and then
    /// returns this error unchanged.
    BackendError(String),

    /// A value could not be encoded for the store.
    SerializationError(String),

    /// Stored bytes could not be decoded into the requested type.
    DeserializationError(String),

    /// Stored bytes do not carry the expected envelope header.
    InvalidCacheEntry(String),

    /// Stored envelope was written with a different schema version.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from stored entry)
        found: u32,
    },

    /// An event could not be rendered. Swallowed by the subscriber.
    FormattingError(String),

    /// A sink refused or failed to accept output. Logged, never retried.
    SinkDeliveryError(String),

    /// Generic error with custom message.
    ///
    /// Also the natural choice for compute closures passed to `fetch`.
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::InvalidCacheEntry(msg) => write!(f, "Invalid cache entry: {}", msg),
            Error::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Cache version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            Error::FormattingError(msg) => write!(f, "Formatting error: {}", msg),
            Error::SinkDeliveryError(msg) => write!(f, "Sink delivery error: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Message carried by the error, without the category prefix.
    ///
    /// This is what lands in `EventDetails::error_message`.
    pub fn message(&self) -> String {
        match self {
            Error::InvalidConfiguration(msg)
            | Error::BackendError(msg)
            | Error::SerializationError(msg)
            | Error::DeserializationError(msg)
            | Error::InvalidCacheEntry(msg)
            | Error::FormattingError(msg)
            | Error::SinkDeliveryError(msg)
            | Error::Other(msg) => msg.clone(),
            Error::VersionMismatch { .. } => self.to_string(),
        }
    }
}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::FormattingError(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::SinkDeliveryError(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}
