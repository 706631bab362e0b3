//! Event records for observed cache operations.
//!
//! A [`Signal`] is the raw notification the instrumented facade publishes when
//! an operation completes. It carries an [`EventKind`], the [`EventDetails`]
//! payload and the wall-clock instant the operation finished. Signals that
//! survive filtering are formatted and delivered as events.
//!
//! # Kinds and signal names
//!
//! | Kind | Signal name | Text tag |
//! |------|-------------|----------|
//! | `ReadHit` | `cache_read.hit` | `HIT` |
//! | `ReadMiss` | `cache_read.miss` | `MISS` |
//! | `Write` | `cache_write` | `WRITE` |
//! | `Delete` | `cache_delete` | `DELETE` |
//! | `Exist` | `cache_exist` | `EXIST` |
//! | `FetchHit` | `cache_fetch.hit` | `FETCH_HIT` |
//! | `FetchMiss` | `cache_fetch.miss` | `FETCH_MISS` |
//! | `OperationError` | `cache_operation.error` | *(fallback)* |

use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Closed set of observable cache outcomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "cache_read.hit")]
    ReadHit,
    #[serde(rename = "cache_read.miss")]
    ReadMiss,
    #[serde(rename = "cache_write")]
    Write,
    #[serde(rename = "cache_delete")]
    Delete,
    #[serde(rename = "cache_exist")]
    Exist,
    #[serde(rename = "cache_fetch.hit")]
    FetchHit,
    #[serde(rename = "cache_fetch.miss")]
    FetchMiss,
    #[serde(rename = "cache_operation.error")]
    OperationError,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 8] = [
        EventKind::ReadHit,
        EventKind::ReadMiss,
        EventKind::Write,
        EventKind::Delete,
        EventKind::Exist,
        EventKind::FetchHit,
        EventKind::FetchMiss,
        EventKind::OperationError,
    ];

    /// Signal name used on the notification bus.
    pub const fn name(self) -> &'static str {
        match self {
            EventKind::ReadHit => "cache_read.hit",
            EventKind::ReadMiss => "cache_read.miss",
            EventKind::Write => "cache_write",
            EventKind::Delete => "cache_delete",
            EventKind::Exist => "cache_exist",
            EventKind::FetchHit => "cache_fetch.hit",
            EventKind::FetchMiss => "cache_fetch.miss",
            EventKind::OperationError => "cache_operation.error",
        }
    }

    /// snake_case label, e.g. `read_hit`.
    pub const fn label(self) -> &'static str {
        match self {
            EventKind::ReadHit => "read_hit",
            EventKind::ReadMiss => "read_miss",
            EventKind::Write => "write",
            EventKind::Delete => "delete",
            EventKind::Exist => "exist",
            EventKind::FetchHit => "fetch_hit",
            EventKind::FetchMiss => "fetch_miss",
            EventKind::OperationError => "operation_error",
        }
    }

    /// Tag used by the text template, if the kind has one.
    pub const fn text_tag(self) -> Option<&'static str> {
        match self {
            EventKind::ReadHit => Some("HIT"),
            EventKind::ReadMiss => Some("MISS"),
            EventKind::Write => Some("WRITE"),
            EventKind::Delete => Some("DELETE"),
            EventKind::Exist => Some("EXIST"),
            EventKind::FetchHit => Some("FETCH_HIT"),
            EventKind::FetchMiss => Some("FETCH_MISS"),
            EventKind::OperationError => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    /// Accepts either the signal name (`cache_read.hit`) or the label (`read_hit`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s || kind.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidConfiguration(format!("unknown event kind: {}", s)))
    }
}

/// Payload of one observed operation.
///
/// `key` and `duration_ms` are always present. The remaining fields depend on
/// the kind:
/// - `value`: `Write`, `ReadHit`, `ReadMiss` (absent), `FetchHit`, `FetchMiss`
/// - `exists`: `Exist`
/// - `error_message`, `operation`: `OperationError`
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EventDetails {
    pub key: String,
    pub duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<&'static str>,
}

impl EventDetails {
    pub fn new(key: impl Into<String>, elapsed: Duration) -> Self {
        EventDetails {
            key: key.into(),
            duration_ms: duration_ms(elapsed),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: Option<serde_json::Value>) -> Self {
        self.value = value;
        self
    }

    pub fn with_exists(mut self, exists: bool) -> Self {
        self.exists = Some(exists);
        self
    }

    pub fn with_error(mut self, operation: &'static str, message: impl Into<String>) -> Self {
        self.operation = Some(operation);
        self.error_message = Some(message.into());
        self
    }
}

/// Elapsed time in milliseconds, rounded to two decimal places.
pub fn duration_ms(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100_000.0).round() / 100.0
}

/// Raw notification that a cache operation completed.
#[derive(Clone, Debug, PartialEq)]
pub struct Signal {
    pub kind: EventKind,
    pub details: EventDetails,
    /// Captured when the operation finished, not when the event is rendered.
    pub completed_at: DateTime<Utc>,
}

impl Signal {
    pub fn new(kind: EventKind, details: EventDetails) -> Self {
        Signal {
            kind,
            details,
            completed_at: Utc::now(),
        }
    }

    /// Signal name used on the notification bus.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parses_name_and_label() {
        assert_eq!(
            "cache_read.hit".parse::<EventKind>().expect("parse name"),
            EventKind::ReadHit
        );
        assert_eq!(
            "fetch_miss".parse::<EventKind>().expect("parse label"),
            EventKind::FetchMiss
        );
        assert_eq!(
            " OPERATION_ERROR ".parse::<EventKind>().expect("parse label"),
            EventKind::OperationError
        );
    }

    #[test]
    fn test_kind_rejects_unknown() {
        let err = "cache_evict".parse::<EventKind>().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_kind_serde_uses_signal_name() {
        let json = serde_json::to_string(&EventKind::FetchHit).expect("serialize kind");
        assert_eq!(json, "\"cache_fetch.hit\"");

        let kind: EventKind = serde_json::from_str("\"cache_exist\"").expect("deserialize kind");
        assert_eq!(kind, EventKind::Exist);
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<_> = EventKind::ALL.iter().map(|k| k.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), EventKind::ALL.len());
    }

    #[test]
    fn test_duration_rounding() {
        assert_eq!(duration_ms(Duration::from_micros(1234)), 1.23);
        assert_eq!(duration_ms(Duration::from_micros(1236)), 1.24);
        assert_eq!(duration_ms(Duration::ZERO), 0.0);
        assert_eq!(duration_ms(Duration::from_millis(2)), 2.0);
    }

    #[test]
    fn test_details_skip_absent_fields() {
        let details = EventDetails::new("k", Duration::from_millis(1)).with_exists(false);
        let json = serde_json::to_value(&details).expect("serialize details");

        assert_eq!(json["key"], "k");
        assert_eq!(json["exists"], false);
        assert!(json.get("value").is_none());
        assert!(json.get("error_message").is_none());
    }
}
