//! Interceptor registration options.
//!
//! Turns the opaque `[interceptor]` option map into an immutable
//! [`InterceptorConfig`]. Only `tracking_url` is mandatory; every other
//! option falls back to its default when absent or of the wrong type.

use serde_json::{Map, Value};
use std::time::Duration;
use url::Url;

use crate::config::validation::ValidationError;

/// Default per-delivery deadline.
pub const DEFAULT_TIMEOUT_MS: u64 = 2_000;

/// Default body capture limit.
pub const DEFAULT_MAX_CAPTURE_KB: usize = 256;

/// Largest capture limit in bytes; bigger `max_capture_kb` values are clamped.
pub const MAX_CAPTURE_BYTES: usize = isize::MAX as usize;

/// Immutable per-registration settings shared by every request.
#[derive(Debug, Clone, PartialEq)]
pub struct InterceptorConfig {
    /// Absolute URI the tracking payload is POSTed to.
    pub tracking_url: Url,

    /// Deadline for a single delivery call, measured from its start.
    pub timeout: Duration,

    /// Maximum captured bytes per body; zero disables capture.
    pub max_capture: usize,

    /// Emit per-request debug records.
    pub verbose: bool,
}

impl InterceptorConfig {
    /// Build a config with defaults for everything but the tracking URL.
    pub fn new(tracking_url: Url) -> Self {
        Self {
            tracking_url,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_capture: DEFAULT_MAX_CAPTURE_KB * 1024,
            verbose: false,
        }
    }

    /// Interpret the raw option map.
    ///
    /// `max_capture_kb` may be fractional (`1.5` means 1536 bytes). A value
    /// of zero or below disables capture entirely. `timeout_ms` values of
    /// zero or below are ignored.
    pub fn from_options(options: &Map<String, Value>) -> Result<Self, ValidationError> {
        let raw_url = match options.get("tracking_url") {
            None | Some(Value::Null) => return Err(ValidationError::MissingTrackingUrl),
            Some(Value::String(s)) => s.as_str(),
            Some(other) => {
                return Err(ValidationError::InvalidTrackingUrl {
                    url: other.to_string(),
                    reason: "expected a string".to_string(),
                })
            }
        };

        let mut config = Self::new(parse_tracking_url(raw_url)?);

        match options.get("timeout_ms") {
            Some(Value::Number(n)) => match n.as_f64().filter(|ms| *ms > 0.0) {
                Some(ms) => match Duration::try_from_secs_f64(ms / 1000.0) {
                    Ok(timeout) => config.timeout = timeout,
                    Err(_) => ignored("timeout_ms", &Value::Number(n.clone())),
                },
                None => tracing::debug!(
                    plugin = "traffic-mirror",
                    value = %n,
                    "Ignoring non-positive timeout_ms"
                ),
            },
            Some(other) => ignored("timeout_ms", other),
            None => {}
        }

        match options.get("max_capture_kb") {
            Some(Value::Number(n)) => {
                config.max_capture = capture_limit(n.as_f64().unwrap_or(0.0));
            }
            Some(other) => ignored("max_capture_kb", other),
            None => {}
        }

        match options.get("verbose") {
            Some(Value::Bool(v)) => config.verbose = *v,
            Some(other) => ignored("verbose", other),
            None => {}
        }

        Ok(config)
    }

    /// Whether bodies are captured at all.
    pub fn capture_enabled(&self) -> bool {
        self.max_capture > 0
    }
}

fn ignored(option: &str, value: &Value) {
    tracing::debug!(
        plugin = "traffic-mirror",
        option,
        value = %value,
        "Ignoring option of unexpected type"
    );
}

fn capture_limit(kb: f64) -> usize {
    if kb <= 0.0 {
        return 0;
    }
    let bytes = kb * 1024.0;
    if bytes >= MAX_CAPTURE_BYTES as f64 {
        tracing::debug!(
            plugin = "traffic-mirror",
            max_capture_kb = kb,
            "Clamping max_capture_kb"
        );
        MAX_CAPTURE_BYTES
    } else {
        bytes as usize
    }
}

fn parse_tracking_url(raw: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(raw).map_err(|e| ValidationError::InvalidTrackingUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        scheme => Err(ValidationError::InvalidTrackingUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme or missing host ({})", scheme),
        }),
    }
}
