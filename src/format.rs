//! Rendering of events into sink output.
//!
//! Text output follows a fixed template per kind:
//!
//! ```text
//! HIT key: user:1 (0.42ms)
//! EXIST key: user:1 (0.1ms) exists: true
//! OPERATION_ERROR key: user:1 (0.3ms) error: Cache unavailable
//! ```
//!
//! JSON output is one object per event:
//!
//! ```text
//! {"event":"cache_read.hit","timestamp":"2024-05-01T12:00:00.000Z","details":{"key":"user:1","duration_ms":0.42,"value":"Alice"}}
//! ```

use crate::config::Format;
use crate::error::Result;
use crate::event::{EventDetails, EventKind, Signal};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt::Write;

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'static str,
    timestamp: String,
    details: &'a EventDetails,
}

/// Render a signal with the given format.
///
/// # Errors
///
/// Returns `Error::FormattingError` if JSON encoding fails.
pub fn format_signal(signal: &Signal, format: Format) -> Result<String> {
    format_event(signal.kind, &signal.details, format, signal.completed_at)
}

/// Render one event.
///
/// `timestamp` is the instant the operation completed; only JSON output uses it.
///
/// # Errors
///
/// Returns `Error::FormattingError` if JSON encoding fails. With the current
/// `EventDetails` shape it does not: values are already `serde_json::Value`
/// and non-finite durations encode as `null`.
pub fn format_event(
    kind: EventKind,
    details: &EventDetails,
    format: Format,
    timestamp: DateTime<Utc>,
) -> Result<String> {
    match format {
        Format::Text => Ok(format_text(kind, details)),
        Format::Json => {
            let event = JsonEvent {
                event: kind.name(),
                timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                details,
            };
            Ok(serde_json::to_string(&event)?)
        }
    }
}

fn format_text(kind: EventKind, details: &EventDetails) -> String {
    let tag = match kind.text_tag() {
        Some(tag) => tag.to_string(),
        None => kind.label().to_ascii_uppercase(),
    };

    let mut line = format!(
        "{} key: {} ({}ms)",
        tag,
        details.key,
        format_duration(details.duration_ms)
    );

    // Writing to a String cannot fail.
    if kind == EventKind::Exist {
        let _ = write!(line, " exists: {}", details.exists.unwrap_or(false));
    }
    if let Some(message) = &details.error_message {
        let _ = write!(line, " error: {}", message);
    }

    line
}

/// `1.23` stays `1.23`, whole numbers keep one decimal: `2.0`.
fn format_duration(ms: f64) -> String {
    if ms.fract() == 0.0 {
        format!("{:.1}", ms)
    } else {
        ms.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn details(key: &str, micros: u64) -> EventDetails {
        EventDetails::new(key, Duration::from_micros(micros))
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn test_text_read_hit() {
        let out = format_event(EventKind::ReadHit, &details("test_key", 1230), Format::Text, ts())
            .expect("Failed to format");
        assert_eq!(out, "HIT key: test_key (1.23ms)");
    }

    #[test]
    fn test_text_read_miss() {
        let out = format_event(EventKind::ReadMiss, &details("test_key", 1230), Format::Text, ts())
            .expect("Failed to format");
        assert_eq!(out, "MISS key: test_key (1.23ms)");
    }

    #[test]
    fn test_text_write_and_fetch_hit() {
        let write = format_event(EventKind::Write, &details("test_key", 1230), Format::Text, ts())
            .expect("Failed to format");
        assert_eq!(write, "WRITE key: test_key (1.23ms)");

        let fetch = format_event(
            EventKind::FetchHit,
            &details("test_key", 1230),
            Format::Text,
            ts(),
        )
        .expect("Failed to format");
        assert_eq!(fetch, "FETCH_HIT key: test_key (1.23ms)");
    }

    #[test]
    fn test_text_exist_appends_result() {
        let d = details("k", 500).with_exists(true);
        let out = format_event(EventKind::Exist, &d, Format::Text, ts()).expect("Failed to format");
        assert_eq!(out, "EXIST key: k (0.5ms) exists: true");
    }

    #[test]
    fn test_text_error_falls_back_to_kind_label() {
        let d = details("k", 2000).with_error("delete", "Cache unavailable");
        let out = format_event(EventKind::OperationError, &d, Format::Text, ts())
            .expect("Failed to format");
        assert_eq!(out, "OPERATION_ERROR key: k (2.0ms) error: Cache unavailable");
    }

    #[test]
    fn test_json_accepts_non_finite_and_nested_details() {
        let d = EventDetails {
            key: "quote\"and\nnewline".to_string(),
            duration_ms: f64::NAN,
            value: Some(serde_json::json!({"nested": [1, null, {"deep": f64::INFINITY}]})),
            ..Default::default()
        };

        let out = format_event(EventKind::Write, &d, Format::Json, ts()).expect("Failed to format");
        let parsed: serde_json::Value = serde_json::from_str(&out).expect("Output is not JSON");
        assert_eq!(parsed["details"]["duration_ms"], serde_json::Value::Null);
        assert_eq!(parsed["details"]["key"], "quote\"and\nnewline");
    }

    #[test]
    fn test_json_shape() {
        let d = details("user:1", 420).with_value(Some(serde_json::json!("Alice")));
        let out =
            format_event(EventKind::ReadHit, &d, Format::Json, ts()).expect("Failed to format");

        let parsed: serde_json::Value = serde_json::from_str(&out).expect("Output is not JSON");
        assert_eq!(parsed["event"], "cache_read.hit");
        assert_eq!(parsed["timestamp"], "2024-05-01T12:00:00.000Z");
        assert_eq!(parsed["details"]["key"], "user:1");
        assert_eq!(parsed["details"]["duration_ms"], 0.42);
        assert_eq!(parsed["details"]["value"], "Alice");
    }

    #[test]
    fn test_json_uses_capture_time() {
        let signal = Signal {
            kind: EventKind::Write,
            details: details("k", 10),
            completed_at: ts(),
        };

        let first = format_signal(&signal, Format::Json).expect("Failed to format");
        std::thread::sleep(Duration::from_millis(5));
        let second = format_signal(&signal, Format::Json).expect("Failed to format");
        assert_eq!(first, second);
    }
}
