//! Post-send verification.
//!
//! A submission that the UI accepted leaves the input field empty. The
//! verifier polls the surface until that holds or the deadline passes;
//! anything still in the field at the deadline means the send cannot be
//! trusted and recovery takes over.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::{error::EngineError, surface::ControlSurface};

/// Interval between verification reads.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Confirm that the submit action consumed the input.
///
/// # Errors
/// `SendVerificationFailed` if the surface is still non-empty at the
/// deadline or an interaction fails mid-verification.
pub(crate) async fn confirm_submission(
    surface: &dyn ControlSurface,
    timeout: Duration,
) -> Result<(), EngineError> {
    let deadline = Instant::now() + timeout;

    loop {
        let value = surface
            .read()
            .await
            .map_err(|error| EngineError::SendVerificationFailed {
                reason: format!("surface read failed during verification: {error}"),
            })?;

        if value.is_empty() {
            debug!("Submission consumed the input");
            return Ok(());
        }

        if Instant::now() >= deadline {
            return Err(EngineError::SendVerificationFailed {
                reason: format!(
                    "input not consumed within {}s ({})",
                    timeout.as_secs(),
                    crate::engine::cleanup::mask(&value)
                ),
            });
        }

        tokio::time::sleep(POLL_INTERVAL.min(timeout)).await;
    }
}
