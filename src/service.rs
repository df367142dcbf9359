//! Service facade exposed to the API layer.
//!
//! This is the narrow interface the chat-completion service consumes:
//! optimized message delivery, live reconfiguration, and metrics access.
//! It decouples the API layer from the engine internals.

use std::sync::Arc;

use tracing::debug;

use crate::{
    config::{ConfigUpdate, InputConfig},
    engine::{DeliveryReport, InputEngine},
    error::EngineError,
    metrics::MetricsSnapshot,
    surface::SessionDriver,
};

/// Facade over the delivery engine for the API/service layer.
#[derive(Clone)]
pub struct InputService {
    engine: InputEngine,
    driver: Arc<dyn SessionDriver>,
}

impl InputService {
    #[must_use]
    pub fn new(engine: InputEngine, driver: Arc<dyn SessionDriver>) -> Self {
        Self { engine, driver }
    }

    /// Convenience constructor wiring an engine with default hooks around
    /// the driver.
    #[must_use]
    pub fn with_config(driver: Arc<dyn SessionDriver>, config: InputConfig) -> Self {
        let engine = InputEngine::new(Arc::clone(&driver), config);
        Self::new(engine, driver)
    }

    /// Deliver a message and wait for the remote agent's reply text.
    ///
    /// # Errors
    /// Every engine error crosses unchanged; a reply that never arrives
    /// surfaces as `SessionUnavailable`.
    pub async fn send_message_optimized(&self, message: &str) -> Result<String, EngineError> {
        let report = self.engine.send(message).await?;
        debug!(
            request_id = %report.request_id,
            delivered_by = %report.delivered_by,
            "Delivery confirmed; waiting for reply"
        );

        let reply = self
            .driver
            .await_reply(self.engine.config().reply_timeout())
            .await?;
        Ok(reply)
    }

    /// Deliver a message and return the full delivery report without
    /// waiting for a reply.
    ///
    /// # Errors
    /// Same terminal errors as [`InputEngine::send`].
    pub async fn deliver(&self, message: &str) -> Result<DeliveryReport, EngineError> {
        self.engine.send(message).await
    }

    /// Validate and apply a partial configuration update.
    ///
    /// Invalid combinations are rejected without partial mutation; requests
    /// admitted after a successful call see the new snapshot.
    ///
    /// # Errors
    /// `Validation` carrying the violated invariant.
    pub fn configure_input_optimization(&self, update: &ConfigUpdate) -> Result<(), EngineError> {
        self.engine.reconfigure(update)?;
        Ok(())
    }

    /// Point-in-time metrics snapshot.
    #[must_use]
    pub fn get_input_performance_metrics(&self) -> MetricsSnapshot {
        self.engine.metrics().snapshot()
    }

    /// Administrative metrics reset.
    pub fn reset_input_performance_metrics(&self) {
        self.engine.metrics().reset();
    }

    /// The underlying engine, for callers composing their own hooks.
    #[must_use]
    pub const fn engine(&self) -> &InputEngine {
        &self.engine
    }
}
