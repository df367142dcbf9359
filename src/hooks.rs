//! Injectable extension points for the delivery pipeline.
//!
//! Hooks are composed at engine construction; there is no dynamic
//! registration. Every method has a no-op default, so implementors override
//! only the capabilities they need.

use std::time::Duration;

use async_trait::async_trait;

use crate::{
    error::SurfaceError, metrics::MetricsSnapshot, surface::ControlSurface,
};

/// Pre/post-cleanup and custom-send extension points.
#[async_trait]
pub trait DeliveryHooks: Send + Sync {
    /// Runs before the cleanup stages.
    async fn before_cleanup(&self, _surface: &dyn ControlSurface) -> Result<(), SurfaceError> {
        Ok(())
    }

    /// Runs after cleanup has verified an empty surface.
    async fn after_cleanup(&self, _surface: &dyn ControlSurface) -> Result<(), SurfaceError> {
        Ok(())
    }

    /// Optionally take over injection and submission for a message.
    ///
    /// Returning `Ok(true)` marks the send as handled; the engine skips the
    /// built-in strategy execution but still runs post-send verification.
    async fn custom_send(
        &self,
        _surface: &dyn ControlSurface,
        _message: &str,
    ) -> Result<bool, SurfaceError> {
        Ok(false)
    }
}

/// Default hook set: every capability is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl DeliveryHooks for NoopHooks {}

/// Policy for the timed waits inside cleanup and chunk pacing.
///
/// A pure function of the configured delay and recent metrics; adaptive
/// implementations tune delays from observed latencies without any hidden
/// global state.
pub trait DelayPolicy: Send + Sync {
    /// Effective delay to observe in place of `configured`.
    fn effective_delay(&self, configured: Duration, recent: &MetricsSnapshot) -> Duration;
}

/// Default policy: use the configured delay unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedDelay;

impl DelayPolicy for FixedDelay {
    fn effective_delay(&self, configured: Duration, _recent: &MetricsSnapshot) -> Duration {
        configured
    }
}

#[cfg(test)]
mod tests {
    use crate::metrics::InputMetrics;

    use super::*;

    #[test]
    fn fixed_delay_passes_through() {
        let metrics = InputMetrics::new();
        let policy = FixedDelay;
        let configured = Duration::from_millis(800);
        assert_eq!(
            policy.effective_delay(configured, &metrics.snapshot()),
            configured
        );
    }
}
