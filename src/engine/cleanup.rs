//! Staged cleanup of the control surface.
//!
//! Stage 1 invokes the element's standard clear and waits for the UI to
//! settle. Stage 2 (when residual cleanup is enabled) reads the surface
//! back; leftover content here is an expected, handled condition. Stage 3
//! escalates to a select-all+delete keyboard sequence. Only a surface that
//! is still non-empty after stage 3 is a cleanup failure.

use std::{
    hash::{BuildHasher, Hasher},
    time::Duration,
};

use tracing::warn;

use crate::{
    config::InputConfig,
    error::{EngineError, SurfaceError},
    hooks::DelayPolicy,
    metrics::MetricsSnapshot,
    surface::{ControlSurface, KeyCombo},
};

/// Settle time after the forced select-all+delete sequence. A short, fixed
/// interval distinct from the configurable `cleanup_delay`.
pub(crate) const FORCED_CLEAR_SETTLE: Duration = Duration::from_millis(300);

/// What cleanup observed and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupOutcome {
    /// Residual content found after the standard clear; empty if none.
    /// Mask before exposing outside the engine.
    pub residual: String,
    /// Whether stage 3 forced clearing was invoked.
    pub forced: bool,
}

/// Read the current surface value verbatim.
///
/// A direct query of the element, side-effect-free. This is the engine's
/// single source of truth for residual detection.
pub(crate) async fn read_residual(surface: &dyn ControlSurface) -> Result<String, SurfaceError> {
    surface.read().await
}

/// Mask captured surface content before it reaches logs, errors, or metrics.
///
/// The original text never leaves the engine; only its length and a short
/// digest do.
#[must_use]
pub fn mask(text: &str) -> String {
    let mut hasher = ahash::RandomState::with_seeds(
        0x6c62_272e_07bb_0142,
        0x517c_c1b7_2722_0a95,
        0x2545_f491_4f6c_dd1d,
        0x9e37_79b9_7f4a_7c15,
    )
    .build_hasher();
    hasher.write(text.as_bytes());
    #[allow(clippy::cast_possible_truncation)]
    let digest = hasher.finish() as u32;
    format!("len={} digest={digest:08x}", text.chars().count())
}

/// Drive the surface through the cleanup stages until empirically empty.
///
/// Returns the residual observed at stage 2 (empty string if none) and
/// whether forced clearing ran.
///
/// # Errors
/// `CleanupFailed` if the surface still holds content after stage 3; surface
/// interaction failures propagate as `SurfaceError`.
pub(crate) async fn clear_surface(
    surface: &dyn ControlSurface,
    config: &InputConfig,
    delay_policy: &dyn DelayPolicy,
    recent: &MetricsSnapshot,
) -> Result<CleanupOutcome, CleanupError> {
    // Stage 1: standard clear, then give the UI time to settle.
    surface.clear().await?;
    let delay = delay_policy.effective_delay(config.cleanup_delay(), recent);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    if !config.residual_cleanup {
        return Ok(CleanupOutcome {
            residual: String::new(),
            forced: false,
        });
    }

    // Stage 2: empirical check. Leftover content is handled, not an error.
    let residual = read_residual(surface).await?;
    if residual.is_empty() {
        return Ok(CleanupOutcome {
            residual,
            forced: false,
        });
    }

    warn!(
        residual = %mask(&residual),
        "Residual content survived standard clear; forcing select-all delete"
    );

    // Stage 3: forced clear.
    surface.send_key_combo(KeyCombo::SelectAllDelete).await?;
    tokio::time::sleep(FORCED_CLEAR_SETTLE).await;

    let remaining = read_residual(surface).await?;
    if remaining.is_empty() {
        crate::internal!(level = DEBUG, "Forced clear left the surface empty");
        Ok(CleanupOutcome {
            residual,
            forced: true,
        })
    } else {
        Err(CleanupError::StillDirty {
            residual_mask: mask(&remaining),
        })
    }
}

/// Internal cleanup failure carrier, folded into [`EngineError`] by the
/// engine loop.
#[derive(Debug)]
pub(crate) enum CleanupError {
    Surface(SurfaceError),
    StillDirty { residual_mask: String },
}

impl From<SurfaceError> for CleanupError {
    fn from(error: SurfaceError) -> Self {
        Self::Surface(error)
    }
}

impl From<CleanupError> for EngineError {
    fn from(error: CleanupError) -> Self {
        match error {
            CleanupError::StillDirty { residual_mask } => Self::CleanupFailed {
                residual: format!("surface not empty after forced clearing ({residual_mask})"),
            },
            CleanupError::Surface(source) => Self::CleanupFailed {
                residual: format!("surface interaction failed: {source}"),
            },
        }
    }
}
