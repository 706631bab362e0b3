//! Postcard value encoding with a versioned envelope.
//!
//! The instrumented facade stores typed values in a byte-oriented backend.
//! Every stored value is wrapped so that foreign or stale bytes are rejected
//! instead of being decoded into garbage:
//!
//! ```text
//! ┌─────────────────┬─────────────────┬──────────────────────────┐
//! │  MAGIC (4 bytes)│VERSION (4 bytes)│POSTCARD PAYLOAD (N bytes)│
//! └─────────────────┴─────────────────┴──────────────────────────┘
//!   "CDBG"              u32 (LE)           postcard::to_allocvec(T)
//! ```
//!
//! # Example
//!
//! ```rust
//! use cache_debugger::serialization::{decode_value, encode_value};
//!
//! # fn main() -> cache_debugger::Result<()> {
//! let bytes = encode_value(&"hello".to_string())?;
//! let back: String = decode_value(&bytes)?;
//! assert_eq!(back, "hello");
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Magic header for stored values: b"CDBG"
pub const VALUE_MAGIC: [u8; 4] = *b"CDBG";

/// Current envelope schema version.
///
/// Bump when the envelope layout changes; older entries then fail with
/// `Error::VersionMismatch` and surface as read errors.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct Envelope<T> {
    magic: [u8; 4],
    version: u32,
    payload: T,
}

/// Encode a value for storage.
///
/// # Errors
///
/// Returns `Error::SerializationError` if Postcard serialization fails.
pub fn encode_value<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let envelope = Envelope {
        magic: VALUE_MAGIC,
        version: CURRENT_SCHEMA_VERSION,
        payload: value,
    };
    postcard::to_allocvec(&envelope).map_err(|e| {
        error!("Value serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Decode a stored value, validating magic and version.
///
/// # Errors
///
/// - `Error::DeserializationError`: bytes are not a postcard envelope of `T`
/// - `Error::InvalidCacheEntry`: magic header mismatch
/// - `Error::VersionMismatch`: envelope written by another schema version
pub fn decode_value<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> Result<T> {
    let envelope: Envelope<T> = postcard::from_bytes(bytes).map_err(|e| {
        debug!("Value deserialization failed: {}", e);
        Error::DeserializationError(e.to_string())
    })?;

    if envelope.magic != VALUE_MAGIC {
        return Err(Error::InvalidCacheEntry(format!(
            "Invalid magic: expected {:?}, got {:?}",
            VALUE_MAGIC, envelope.magic
        )));
    }

    if envelope.version != CURRENT_SCHEMA_VERSION {
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found: envelope.version,
        });
    }

    Ok(envelope.payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
    struct Profile {
        id: u64,
        name: String,
        active: bool,
    }

    #[test]
    fn test_envelope_header() {
        let bytes = encode_value(&7u32).expect("Failed to encode");
        assert_eq!(&bytes[0..4], b"CDBG");
    }

    #[test]
    fn test_struct_value() {
        let profile = Profile {
            id: 1,
            name: "Alice".to_string(),
            active: true,
        };
        let bytes = encode_value(&profile).expect("Failed to encode");
        let decoded: Profile = decode_value(&bytes).expect("Failed to decode");
        assert_eq!(decoded, profile);
    }

    #[test]
    fn test_invalid_magic_rejected() {
        let mut bytes = encode_value(&"v").expect("Failed to encode");
        bytes[0] = b'X';

        let result: Result<String> = decode_value(&bytes);
        assert!(matches!(result, Err(Error::InvalidCacheEntry(_))));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let stale = Envelope {
            magic: VALUE_MAGIC,
            version: CURRENT_SCHEMA_VERSION + 1,
            payload: "v".to_string(),
        };
        let bytes = postcard::to_allocvec(&stale).expect("Failed to encode");

        let result: Result<String> = decode_value(&bytes);
        assert!(matches!(
            result,
            Err(Error::VersionMismatch {
                expected: CURRENT_SCHEMA_VERSION,
                ..
            })
        ));
    }

    #[test]
    fn test_foreign_bytes_rejected() {
        let result: Result<Profile> = decode_value(b"plain text, not an envelope");
        assert!(result.is_err());
    }
}
