//! Debugger configuration and validation.
//!
//! [`Config`] is built once, validated, and then shared read-only behind an
//! `Arc`. Changes go through [`CacheDebugger::configure`](crate::CacheDebugger::configure),
//! which validates a modified copy and swaps it in whole.
//!
//! # Example
//!
//! ```
//! use cache_debugger::config::{Config, Format};
//! use cache_debugger::EventKind;
//!
//! let config = Config::default()
//!     .with_format(Format::Json)
//!     .with_sampling_rate(0.25)
//!     .observe(EventKind::Delete)
//!     .with_filter(|_kind, details| !details.key.starts_with("session:"));
//!
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Settings
//!
//! Plain-data settings can be loaded from JSON or from the environment and
//! overlaid onto the defaults with [`Config::from_settings`]:
//!
//! | Variable | Example |
//! |----------|---------|
//! | `CACHE_DEBUGGER_ENABLED` | `true` |
//! | `CACHE_DEBUGGER_EVENTS` | `cache_read.hit,cache_write,delete` |
//! | `CACHE_DEBUGGER_SAMPLING_RATE` | `0.1` |
//! | `CACHE_DEBUGGER_FORMAT` | `json` |
//! | `CACHE_DEBUGGER_SAMPLE_ERRORS` | `false` |
//! | `CACHE_DEBUGGER_ALWAYS_ON` | `true` |

use crate::error::{Error, Result};
use crate::event::{EventDetails, EventKind};
use crate::sink::{LogSink, Sink};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Final gate on an event. Returning `false` drops it.
pub type EventFilter = Arc<dyn Fn(EventKind, &EventDetails) -> bool + Send + Sync>;

/// Side effect invoked for every event that survives filtering.
pub type EventHook = Arc<dyn Fn(EventKind, &EventDetails) + Send + Sync>;

/// Output format used by the formatter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// `HIT key: user:1 (0.42ms)`
    #[default]
    Text,
    /// `{"event": ..., "timestamp": ..., "details": {...}}`
    Json,
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            other => Err(Error::InvalidConfiguration(format!(
                "unknown format '{}', expected 'text' or 'json'",
                other
            ))),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Text => f.write_str("text"),
            Format::Json => f.write_str("json"),
        }
    }
}

/// Kinds observed when nothing else is configured.
pub const DEFAULT_OBSERVED_KINDS: [EventKind; 4] = [
    EventKind::ReadHit,
    EventKind::ReadMiss,
    EventKind::Write,
    EventKind::FetchHit,
];

/// Debugger configuration.
#[derive(Clone)]
pub struct Config {
    /// Master switch. When `false` no signal becomes an event.
    pub enabled: bool,

    /// Allow-list of kinds. Checked before sampling and the custom filter.
    pub observed_kinds: BTreeSet<EventKind>,

    /// Probability in `[0.0, 1.0]` that an event is kept. `None` keeps all.
    pub sampling_rate: Option<f64>,

    /// Seed for a deterministic sampling sequence. `None` draws from the thread RNG.
    pub sampling_seed: Option<u64>,

    /// Whether `OperationError` events are subject to sampling.
    pub sample_errors: bool,

    /// Capture signals outside of any explicit scope.
    pub always_on: bool,

    pub format: Format,

    pub custom_filter: Option<EventFilter>,

    pub on_event: Option<EventHook>,

    /// Destination for formatted output.
    pub sink: Arc<dyn Sink>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            enabled: true,
            observed_kinds: DEFAULT_OBSERVED_KINDS.into_iter().collect(),
            sampling_rate: None,
            sampling_seed: None,
            sample_errors: true,
            always_on: false,
            format: Format::Text,
            custom_filter: None,
            on_event: None,
            sink: Arc::new(LogSink::default()),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("enabled", &self.enabled)
            .field("observed_kinds", &self.observed_kinds)
            .field("sampling_rate", &self.sampling_rate)
            .field("sampling_seed", &self.sampling_seed)
            .field("sample_errors", &self.sample_errors)
            .field("always_on", &self.always_on)
            .field("format", &self.format)
            .field("custom_filter", &self.custom_filter.is_some())
            .field("on_event", &self.on_event.is_some())
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Validate the configuration.
    ///
    /// Has no side effects and may be called any number of times.
    /// Callback arity is fixed by the `EventFilter`/`EventHook` types, so only
    /// the value ranges need checking here.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` when `sampling_rate` is NaN or
    /// outside `[0.0, 1.0]`.
    pub fn validate(&self) -> Result<()> {
        if let Some(rate) = self.sampling_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(Error::InvalidConfiguration(format!(
                    "sampling_rate must be within [0.0, 1.0], got {}",
                    rate
                )));
            }
        }
        Ok(())
    }

    /// Overlay plain settings onto the defaults and validate the result.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` for unknown event names, unknown
    /// formats, or an out-of-range sampling rate.
    pub fn from_settings(settings: ConfigSettings) -> Result<Self> {
        let config = Config::default().apply(settings)?;
        config.validate()?;
        Ok(config)
    }

    /// Load settings from `CACHE_DEBUGGER_*` environment variables.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_settings`], plus unparsable numbers or booleans.
    pub fn from_env() -> Result<Self> {
        Config::from_settings(ConfigSettings::from_env()?)
    }

    /// Apply settings to this configuration. Unset fields are left alone.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` for unknown event names or formats.
    pub fn apply(mut self, settings: ConfigSettings) -> Result<Self> {
        if let Some(enabled) = settings.enabled {
            self.enabled = enabled;
        }
        if let Some(events) = settings.events {
            self.observed_kinds = events
                .iter()
                .map(|name| name.parse::<EventKind>())
                .collect::<Result<_>>()?;
        }
        if settings.sampling_rate.is_some() {
            self.sampling_rate = settings.sampling_rate;
        }
        if settings.sampling_seed.is_some() {
            self.sampling_seed = settings.sampling_seed;
        }
        if let Some(sample_errors) = settings.sample_errors {
            self.sample_errors = sample_errors;
        }
        if let Some(always_on) = settings.always_on {
            self.always_on = always_on;
        }
        if let Some(format) = settings.format {
            self.format = format.parse()?;
        }
        Ok(self)
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Replace the observed kinds.
    pub fn with_observed_kinds(mut self, kinds: impl IntoIterator<Item = EventKind>) -> Self {
        self.observed_kinds = kinds.into_iter().collect();
        self
    }

    /// Observe every kind, including `OperationError`.
    pub fn observe_all(self) -> Self {
        self.with_observed_kinds(EventKind::ALL)
    }

    /// Add one kind to the observed set.
    pub fn observe(mut self, kind: EventKind) -> Self {
        self.observed_kinds.insert(kind);
        self
    }

    /// Set the sampling rate. Range is checked by [`Config::validate`].
    pub fn with_sampling_rate(mut self, rate: f64) -> Self {
        self.sampling_rate = Some(rate);
        self
    }

    /// Use a seeded RNG so the sampling sequence is reproducible.
    pub fn with_sampling_seed(mut self, seed: u64) -> Self {
        self.sampling_seed = Some(seed);
        self
    }

    pub fn with_sample_errors(mut self, sample_errors: bool) -> Self {
        self.sample_errors = sample_errors;
        self
    }

    pub fn with_always_on(mut self, always_on: bool) -> Self {
        self.always_on = always_on;
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(EventKind, &EventDetails) -> bool + Send + Sync + 'static,
    {
        self.custom_filter = Some(Arc::new(filter));
        self
    }

    pub fn with_on_event<F>(mut self, hook: F) -> Self
    where
        F: Fn(EventKind, &EventDetails) + Send + Sync + 'static,
    {
        self.on_event = Some(Arc::new(hook));
        self
    }

    pub fn with_sink(mut self, sink: impl Sink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Share an existing sink handle.
    pub fn with_shared_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn observes(&self, kind: EventKind) -> bool {
        self.observed_kinds.contains(&kind)
    }
}

/// Plain-data settings, loadable from JSON or the environment.
///
/// Every field is optional; unset fields keep the value of the configuration
/// they are applied to.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigSettings {
    pub enabled: Option<bool>,
    /// Event names or labels, e.g. `cache_read.hit` or `read_hit`.
    pub events: Option<Vec<String>>,
    pub sampling_rate: Option<f64>,
    pub sampling_seed: Option<u64>,
    pub sample_errors: Option<bool>,
    pub always_on: Option<bool>,
    /// `text` or `json`.
    pub format: Option<String>,
}

const ENV_PREFIX: &str = "CACHE_DEBUGGER_";

impl ConfigSettings {
    /// Parse settings from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` if the document is malformed or
    /// contains unknown fields.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidConfiguration(e.to_string()))
    }

    /// Read `CACHE_DEBUGGER_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` for values that do not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Read settings from an iterator of `(name, value)` pairs.
    ///
    /// Names without the `CACHE_DEBUGGER_` prefix are ignored.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` for values that do not parse.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut settings = ConfigSettings::default();

        for (name, value) in vars {
            let Some(field) = name.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref().trim();

            match field {
                "ENABLED" => settings.enabled = Some(parse_var(field, value)?),
                "EVENTS" => {
                    settings.events = Some(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(String::from)
                            .collect(),
                    )
                }
                "SAMPLING_RATE" => settings.sampling_rate = Some(parse_var(field, value)?),
                "SAMPLING_SEED" => settings.sampling_seed = Some(parse_var(field, value)?),
                "SAMPLE_ERRORS" => settings.sample_errors = Some(parse_var(field, value)?),
                "ALWAYS_ON" => settings.always_on = Some(parse_var(field, value)?),
                "FORMAT" => settings.format = Some(value.to_string()),
                other => debug!("Ignoring unknown setting {}{}", ENV_PREFIX, other),
            }
        }

        Ok(settings)
    }
}

fn parse_var<T: FromStr>(field: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value.parse().map_err(|e: T::Err| {
        Error::InvalidConfiguration(format!("{}{}='{}': {}", ENV_PREFIX, field, value, e))
    })
}
