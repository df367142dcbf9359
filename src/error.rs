//! Typed error handling for input delivery.
//!
//! This module provides the closed error taxonomy for the delivery engine,
//! distinguishing between:
//! - Validation failures - rejected before the engine runs, never retried
//! - Transient failures - absorbed by the recovery manager up to the retry ceiling
//! - Terminal failures - the only errors that cross the engine boundary

use std::time::Duration;

use thiserror::Error;

use crate::engine::recovery::RecoveryLevel;

/// Errors raised by the browser collaborator while driving the control surface.
///
/// These originate outside the engine; the engine classifies them into its
/// own taxonomy (`SessionUnavailable` for surface acquisition, transient
/// attempt failures for mid-delivery interaction errors).
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// The input field could not be located within the allotted time.
    #[error("Input field not found after {0:?}")]
    ElementNotFound(Duration),

    /// An interaction with the surface failed (keystrokes, clear, submit).
    #[error("Surface interaction failed: {0}")]
    Interaction(String),

    /// The underlying browser session is gone or in an unknown state.
    #[error("Browser session lost: {0}")]
    SessionLost(String),
}

/// Top-level error type for the input delivery engine.
///
/// Only `Validation`, `GateTimeout`, `StrategyExhausted`, and
/// `SessionUnavailable` are ever observed by callers; `CleanupFailed` and
/// `SendVerificationFailed` are absorbed by the recovery manager until the
/// retry ceiling is reached.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The request was malformed or oversized. Rejected before any
    /// processing, never retried.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The caller was not admitted to the delivery gate within the bound.
    /// Surfaced immediately; the caller may retry later.
    #[error("Delivery gate not acquired within {waited:?}")]
    GateTimeout { waited: Duration },

    /// Cleanup could not produce an empty surface. Any captured residual is
    /// masked (length + digest) before it is carried here.
    #[error("Cleanup failed: {residual}")]
    CleanupFailed { residual: String },

    /// A send attempt could not be confirmed: either the submission did not
    /// consume the input within the verification window, or an interaction
    /// failed mid-delivery.
    #[error("Send verification failed: {reason}")]
    SendVerificationFailed { reason: String },

    /// All recovery levels were exhausted. Terminal; carries the final
    /// recovery level reached and the total attempt count.
    #[error("Delivery abandoned after {attempts} attempts at recovery level {level}")]
    StrategyExhausted { level: RecoveryLevel, attempts: u32 },

    /// The collaborator failed to provide a control surface. Propagated
    /// without retrying at this layer.
    #[error("Browser session unavailable: {0}")]
    SessionUnavailable(#[from] SurfaceError),
}

impl EngineError {
    /// Returns `true` if the recovery manager may absorb this error.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::CleanupFailed { .. } | Self::SendVerificationFailed { .. }
        )
    }

    /// Returns `true` if the error crosses the engine boundary unchanged.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !self.is_transient()
    }
}

/// Errors that can occur while loading or updating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration value violates an invariant.
    #[error("Invalid configuration for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },

    /// The configuration file could not be read.
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

impl From<ConfigError> for EngineError {
    fn from(error: ConfigError) -> Self {
        Self::Validation(error.to_string())
    }
}
