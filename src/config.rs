//! Configuration for the input delivery engine.
//!
//! Configuration is an immutable snapshot: the engine reads an [`InputConfig`]
//! at request admission and never observes changes mid-request.
//! Reconfiguration builds a new, fully validated snapshot via
//! [`InputConfig::apply`] rather than mutating in place.
//!
//! Values load from three layers, later layers overriding earlier ones:
//! 1. built-in defaults (the `defaults` module),
//! 2. an optional TOML file ([`InputConfig::from_file`]),
//! 3. environment variables ([`InputConfig::with_env_overrides`]).
//!
//! ## Environment surface
//!
//! | Variable              | Meaning                          | Default |
//! |-----------------------|----------------------------------|---------|
//! | `INPUT_CLEANUP_DELAY` | post-clear settle time (seconds) | `0.8`   |
//! | `SAFE_SEND_LIMIT`     | single-shot safe length (chars)  | `150`   |
//! | `INIT_TIMEOUT`        | surface/verify timeout (seconds) | `15`    |
//! | `RESIDUAL_CLEANUP`    | enable staged residual clearing  | `true`  |
//! | `CHUNK_THRESHOLD`     | chunking cutover length (chars)  | `4000`  |
//! | `CHUNK_SIZE`          | maximum chunk length (chars)     | `2000`  |
//! | `CHUNK_PACING_DELAY`  | inter-chunk pacing (seconds)     | `0.3`   |
//! | `MAX_RETRIES`         | recovery retry ceiling           | `3`     |
//! | `RESPONSE_TIMEOUT`    | reply wait (seconds)             | `120`   |

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Hard cap on message length, enforced before any processing.
///
/// Messages above this are rejected outright with a validation error, not
/// chunked.
pub const MAX_MESSAGE_LEN: usize = 32_000;

/// Immutable configuration snapshot for the input delivery engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Delay after the standard clear action, giving the UI time to settle.
    ///
    /// Default: 800 ms
    #[serde(default = "defaults::cleanup_delay_ms")]
    pub cleanup_delay_ms: u64,

    /// Longest message (in chars) delivered as a single injection with no
    /// fallback.
    ///
    /// Default: 150
    #[serde(default = "defaults::safe_send_limit")]
    pub safe_send_limit: usize,

    /// Length (in chars) above which delivery always chunks.
    ///
    /// Must be strictly greater than `safe_send_limit`.
    ///
    /// Default: 4000
    #[serde(default = "defaults::chunk_threshold")]
    pub chunk_threshold: usize,

    /// Bound on surface acquisition and post-send verification.
    ///
    /// The delivery gate admission bound is twice this value.
    ///
    /// Default: 15 seconds
    #[serde(default = "defaults::init_timeout_secs")]
    pub init_timeout_secs: u64,

    /// Whether cleanup escalates through residual detection and forced
    /// clearing.
    ///
    /// Default: true
    #[serde(default = "defaults::residual_cleanup")]
    pub residual_cleanup: bool,

    /// Total retries the recovery manager may spend across all levels.
    ///
    /// Default: 3 (one retry per recovery level)
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Maximum chunk length in chars.
    ///
    /// Default: 2000
    #[serde(default = "defaults::chunk_size")]
    pub chunk_size: usize,

    /// Pacing delay between successive chunk injections.
    ///
    /// Default: 300 ms
    #[serde(default = "defaults::chunk_pacing_delay_ms")]
    pub chunk_pacing_delay_ms: u64,

    /// How long to wait for the remote agent's reply after a confirmed send.
    ///
    /// Default: 120 seconds
    #[serde(default = "defaults::reply_timeout_secs")]
    pub reply_timeout_secs: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            cleanup_delay_ms: defaults::cleanup_delay_ms(),
            safe_send_limit: defaults::safe_send_limit(),
            chunk_threshold: defaults::chunk_threshold(),
            init_timeout_secs: defaults::init_timeout_secs(),
            residual_cleanup: defaults::residual_cleanup(),
            max_retries: defaults::max_retries(),
            chunk_size: defaults::chunk_size(),
            chunk_pacing_delay_ms: defaults::chunk_pacing_delay_ms(),
            reply_timeout_secs: defaults::reply_timeout_secs(),
        }
    }
}

impl InputConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// absent fields.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment-variable overrides on top of this snapshot.
    ///
    /// Unset or unparseable variables leave the current value in place; a
    /// malformed value is logged and ignored rather than failing startup.
    ///
    /// # Errors
    /// Returns an error if the resulting combination fails validation.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(secs) = env_f64("INPUT_CLEANUP_DELAY") {
            self.cleanup_delay_ms = secs_to_ms(secs);
        }
        if let Some(limit) = env_parse::<usize>("SAFE_SEND_LIMIT") {
            self.safe_send_limit = limit;
        }
        if let Some(secs) = env_parse::<u64>("INIT_TIMEOUT") {
            self.init_timeout_secs = secs;
        }
        if let Some(enabled) = env_bool("RESIDUAL_CLEANUP") {
            self.residual_cleanup = enabled;
        }
        if let Some(threshold) = env_parse::<usize>("CHUNK_THRESHOLD") {
            self.chunk_threshold = threshold;
        }
        if let Some(size) = env_parse::<usize>("CHUNK_SIZE") {
            self.chunk_size = size;
        }
        if let Some(secs) = env_f64("CHUNK_PACING_DELAY") {
            self.chunk_pacing_delay_ms = secs_to_ms(secs);
        }
        if let Some(retries) = env_parse::<u32>("MAX_RETRIES") {
            self.max_retries = retries;
        }
        if let Some(secs) = env_parse::<u64>("RESPONSE_TIMEOUT") {
            self.reply_timeout_secs = secs;
        }

        self.validate()?;
        Ok(self)
    }

    /// Build a new snapshot with the update applied, validating the result.
    ///
    /// The current snapshot is untouched: an invalid combination is rejected
    /// without partial mutation.
    ///
    /// # Errors
    /// Returns an error if the updated combination violates an invariant.
    pub fn apply(&self, update: &ConfigUpdate) -> Result<Self, ConfigError> {
        let candidate = Self {
            cleanup_delay_ms: update.cleanup_delay_ms.unwrap_or(self.cleanup_delay_ms),
            safe_send_limit: update.safe_send_limit.unwrap_or(self.safe_send_limit),
            chunk_threshold: update.chunk_threshold.unwrap_or(self.chunk_threshold),
            init_timeout_secs: update.init_timeout_secs.unwrap_or(self.init_timeout_secs),
            residual_cleanup: update.residual_cleanup.unwrap_or(self.residual_cleanup),
            max_retries: update.max_retries.unwrap_or(self.max_retries),
            chunk_size: update.chunk_size.unwrap_or(self.chunk_size),
            chunk_pacing_delay_ms: update
                .chunk_pacing_delay_ms
                .unwrap_or(self.chunk_pacing_delay_ms),
            reply_timeout_secs: update.reply_timeout_secs.unwrap_or(self.reply_timeout_secs),
        };
        candidate.validate()?;
        Ok(candidate)
    }

    /// Check the configuration invariants.
    ///
    /// # Errors
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.safe_send_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "safe_send_limit",
                reason: "must be greater than zero".into(),
            });
        }
        if self.safe_send_limit >= self.chunk_threshold {
            return Err(ConfigError::Invalid {
                field: "safe_send_limit",
                reason: format!(
                    "must be below chunk_threshold ({} >= {})",
                    self.safe_send_limit, self.chunk_threshold
                ),
            });
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                field: "chunk_size",
                reason: "must be greater than zero".into(),
            });
        }
        if self.init_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "init_timeout_secs",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Delay observed after the standard clear action.
    #[must_use]
    pub const fn cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_delay_ms)
    }

    /// Bound on surface acquisition and post-send verification.
    #[must_use]
    pub const fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }

    /// Admission bound for the delivery gate: `init_timeout` doubled.
    #[must_use]
    pub const fn gate_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs * 2)
    }

    /// Pacing delay between successive chunk injections.
    #[must_use]
    pub const fn chunk_pacing_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_pacing_delay_ms)
    }

    /// How long to wait for the remote agent's reply.
    #[must_use]
    pub const fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }
}

/// Partial configuration update.
///
/// Every field is optional; absent fields keep the current value. Applied
/// atomically through [`InputConfig::apply`].
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ConfigUpdate {
    pub cleanup_delay_ms: Option<u64>,
    pub safe_send_limit: Option<usize>,
    pub chunk_threshold: Option<usize>,
    pub init_timeout_secs: Option<u64>,
    pub residual_cleanup: Option<bool>,
    pub max_retries: Option<u32>,
    pub chunk_size: Option<usize>,
    pub chunk_pacing_delay_ms: Option<u64>,
    pub reply_timeout_secs: Option<u64>,
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}

fn env_f64(name: &str) -> Option<f64> {
    env_parse::<f64>(name).filter(|secs| {
        if secs.is_finite() && *secs >= 0.0 {
            true
        } else {
            tracing::warn!(variable = name, "Ignoring negative or non-finite delay override");
            false
        }
    })
}

fn env_bool(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            tracing::warn!(variable = name, value = other, "Ignoring unparseable boolean override");
            None
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn secs_to_ms(secs: f64) -> u64 {
    (secs * 1000.0).round() as u64
}

/// Default configuration values.
mod defaults {
    pub const fn cleanup_delay_ms() -> u64 {
        800
    }
    pub const fn safe_send_limit() -> usize {
        150
    }
    pub const fn chunk_threshold() -> usize {
        4000
    }
    pub const fn init_timeout_secs() -> u64 {
        15
    }
    pub const fn residual_cleanup() -> bool {
        true
    }
    pub const fn max_retries() -> u32 {
        3
    }
    pub const fn chunk_size() -> usize {
        2000
    }
    pub const fn chunk_pacing_delay_ms() -> u64 {
        300
    }
    pub const fn reply_timeout_secs() -> u64 {
        120
    }
}
