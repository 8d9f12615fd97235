//! Runtime-tunable settings and the rules for changing them.
//!
//! The runtime configuration is a small JSON object stored on disk:
//!
//! ```json
//! {
//!   "inputThrottleMs": 8,
//!   "mouseSensitivity": 1.0,
//!   "invertScroll": false,
//!   "frontendPort": 3000,
//!   "networkPollIntervalMs": 5000
//! }
//! ```
//!
//! A local operator changes it with `update-config`.  [`validate_update`]
//! decides which submitted keys are acceptable; the storage layer merges them
//! into the file and reloads it, and the new values take effect immediately.
//!
//! # Serde default values
//!
//! Every field has a `#[serde(default = "…")]` so that a missing or partial
//! file still yields a complete configuration.  Keys the server does not know
//! are kept in `extra` and written back untouched.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Error type for runtime configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A submitted value broke a rule; the message is shown to the operator.
    #[error("{0}")]
    Invalid(String),

    /// None of the submitted keys were acceptable.
    #[error("No valid config keys provided")]
    NoValidKeys,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file content is not valid JSON for this schema.
    #[error("failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings that can change while the server runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Move-coalescing interval in milliseconds (1–1000).
    #[serde(default = "default_input_throttle_ms")]
    pub input_throttle_ms: u64,

    /// Multiplier applied to pointer deltas.
    #[serde(default = "default_mouse_sensitivity")]
    pub mouse_sensitivity: f64,

    /// Flip both scroll axes.
    #[serde(default)]
    pub invert_scroll: bool,

    /// Port the device-facing web client is served on.
    #[serde(default = "default_frontend_port")]
    pub frontend_port: u16,

    /// How often the client should re-check the network, in milliseconds.
    #[serde(default = "default_network_poll_interval_ms")]
    pub network_poll_interval_ms: u64,

    /// Keys this version does not interpret.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_input_throttle_ms() -> u64 {
    8
}
fn default_mouse_sensitivity() -> f64 {
    1.0
}
fn default_frontend_port() -> u16 {
    3000
}
fn default_network_poll_interval_ms() -> u64 {
    5000
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            input_throttle_ms: default_input_throttle_ms(),
            mouse_sensitivity: default_mouse_sensitivity(),
            invert_scroll: false,
            frontend_port: default_frontend_port(),
            network_poll_interval_ms: default_network_poll_interval_ms(),
            extra: BTreeMap::new(),
        }
    }
}

impl RuntimeConfig {
    /// The move-coalescing interval as a [`Duration`].
    pub fn input_throttle(&self) -> Duration {
        Duration::from_millis(self.input_throttle_ms)
    }
}

/// Free-form string keys accepted by `update-config`.
const STRING_KEYS: [&str; 2] = ["host", "address"];

/// Longest accepted value for a free-form string key.
const MAX_STRING_VALUE: usize = 255;

/// Filters an `update-config` payload down to the acceptable keys.
///
/// Rules:
///
/// | Key                     | Accepted values                 |
/// |-------------------------|---------------------------------|
/// | `frontendPort`          | integer 1–65535                 |
/// | `inputThrottleMs`       | number 1–1000                   |
/// | `mouseSensitivity`      | number 0.1–10                   |
/// | `networkPollIntervalMs` | number 100–60000                |
/// | `invertScroll`          | boolean                         |
/// | `host`, `address`       | string of at most 255 chars     |
///
/// Any other key is ignored.  A string key with an unacceptable value is
/// skipped, while a bad value for a typed key fails the whole update.
///
/// # Errors
///
/// - [`ConfigError::Invalid`] if a typed key has an out-of-range value.
/// - [`ConfigError::NoValidKeys`] if nothing acceptable remains.
pub fn validate_update(update: &Map<String, Value>) -> Result<Map<String, Value>, ConfigError> {
    let mut accepted = Map::new();

    for (key, value) in update {
        match key.as_str() {
            "frontendPort" => {
                let port = value
                    .as_f64()
                    .filter(|p| p.fract() == 0.0 && (1.0..=65535.0).contains(p))
                    .ok_or_else(|| {
                        ConfigError::Invalid("Invalid port number (must be 1–65535)".into())
                    })?;
                accepted.insert(key.clone(), Value::from(port as u64));
            }
            "inputThrottleMs" => {
                let ms = number_in(value, 1.0, 1000.0).ok_or_else(|| {
                    ConfigError::Invalid("Invalid inputThrottleMs (must be 1–1000)".into())
                })?;
                accepted.insert(key.clone(), Value::from(ms.round() as u64));
            }
            "mouseSensitivity" => {
                let s = number_in(value, 0.1, 10.0).ok_or_else(|| {
                    ConfigError::Invalid("Invalid mouseSensitivity (must be 0.1–10)".into())
                })?;
                accepted.insert(key.clone(), Value::from(s));
            }
            "networkPollIntervalMs" => {
                let ms = number_in(value, 100.0, 60_000.0).ok_or_else(|| {
                    ConfigError::Invalid("Invalid networkPollIntervalMs (must be 100–60000)".into())
                })?;
                accepted.insert(key.clone(), Value::from(ms.round() as u64));
            }
            "invertScroll" => {
                let b = value.as_bool().ok_or_else(|| {
                    ConfigError::Invalid("Invalid invertScroll (must be a boolean)".into())
                })?;
                accepted.insert(key.clone(), Value::from(b));
            }
            k if STRING_KEYS.contains(&k) => {
                if let Some(s) = value.as_str() {
                    if s.chars().count() <= MAX_STRING_VALUE {
                        accepted.insert(key.clone(), Value::from(s));
                    }
                }
            }
            _ => {}
        }
    }

    if accepted.is_empty() {
        return Err(ConfigError::NoValidKeys);
    }
    Ok(accepted)
}

fn number_in(value: &Value, min: f64, max: f64) -> Option<f64> {
    value
        .as_f64()
        .filter(|v| v.is_finite() && (min..=max).contains(v))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
