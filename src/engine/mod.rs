//! The input delivery engine.
//!
//! Drives one message at a time into the shared control surface:
//! admission through the session gate, staged cleanup, strategy selection,
//! delivery (single-shot or chunked), post-send verification, and escalating
//! recovery when an attempt cannot be confirmed.
//!
//! All phases of a request run sequentially inside the gate holder; no phase
//! of another request runs until the gate is released.

pub mod chunker;
pub mod cleanup;
pub mod recovery;
pub mod strategy;
pub(crate) mod verify;

use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

use parking_lot::RwLock;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::{
    config::{ConfigUpdate, InputConfig, MAX_MESSAGE_LEN},
    error::{EngineError, SurfaceError},
    gate::SessionGate,
    hooks::{DelayPolicy, DeliveryHooks, FixedDelay, NoopHooks},
    metrics::InputMetrics,
    surface::{ControlSurface, SessionDriver},
};

use self::{
    chunker::ChunkedSender,
    recovery::{RecoveryDirective, RecoveryLevel, RecoveryManager},
    strategy::Strategy,
};

/// A single message accepted for delivery.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    /// Unique request identifier.
    pub id: Ulid,
    /// The raw message text.
    pub message: String,
    /// When the request entered the engine.
    pub created_at: SystemTime,
}

impl DeliveryRequest {
    fn new(message: &str) -> Self {
        Self {
            id: Ulid::new(),
            message: message.to_owned(),
            created_at: SystemTime::now(),
        }
    }
}

/// Wall-clock spent in each delivery phase. Send time includes post-send
/// verification; retries accumulate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    pub cleanup: Duration,
    pub send: Duration,
    pub total: Duration,
}

/// Outcome of a successful delivery.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub request_id: Ulid,
    /// Strategy selected from message length.
    pub strategy: Strategy,
    /// Strategy that actually landed the message (differs from `strategy`
    /// after an in-strategy fallback or a forced-chunking recovery level).
    pub delivered_by: Strategy,
    /// Final recovery level; 0 when the first attempt succeeded.
    pub recovery_level: RecoveryLevel,
    /// Attempts consumed, including the successful one.
    pub attempts: u32,
    /// Residual content found during cleanup, masked. `None` if the surface
    /// was already clean.
    pub residual: Option<String>,
    /// Whether forced clearing ran during any attempt.
    pub forced_cleanup: bool,
    /// Whether `TrySingleThenChunk` fell back to chunked delivery.
    pub chunk_fallback: bool,
    pub timings: PhaseTimings,
}

/// Per-request mutable state, owned by the processing task.
#[derive(Debug)]
struct ProcessingState {
    cleanup_performed: bool,
    residual_observed: Option<String>,
    forced_cleanup: bool,
    chunk_fallback: bool,
    cleanup_elapsed: Duration,
    send_elapsed: Duration,
}

impl ProcessingState {
    const fn new() -> Self {
        Self {
            cleanup_performed: false,
            residual_observed: None,
            forced_cleanup: false,
            chunk_fallback: false,
            cleanup_elapsed: Duration::ZERO,
            send_elapsed: Duration::ZERO,
        }
    }
}

struct EngineInner {
    driver: Arc<dyn SessionDriver>,
    gate: SessionGate,
    config: RwLock<Arc<InputConfig>>,
    metrics: Arc<InputMetrics>,
    hooks: Arc<dyn DeliveryHooks>,
    delay_policy: Arc<dyn DelayPolicy>,
}

/// Serialized, recovering delivery of messages into the control surface.
///
/// Cheap to clone; all clones share the gate, configuration, and metrics.
#[derive(Clone)]
pub struct InputEngine {
    inner: Arc<EngineInner>,
}

/// Builder for [`InputEngine`]; hooks and policies are composed here, at
/// construction, never registered dynamically.
pub struct InputEngineBuilder {
    driver: Arc<dyn SessionDriver>,
    config: InputConfig,
    metrics: Arc<InputMetrics>,
    hooks: Arc<dyn DeliveryHooks>,
    delay_policy: Arc<dyn DelayPolicy>,
}

impl InputEngineBuilder {
    #[must_use]
    pub fn config(mut self, config: InputConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn hooks(mut self, hooks: Arc<dyn DeliveryHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub fn delay_policy(mut self, policy: Arc<dyn DelayPolicy>) -> Self {
        self.delay_policy = policy;
        self
    }

    #[must_use]
    pub fn metrics(mut self, metrics: Arc<InputMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    #[must_use]
    pub fn build(self) -> InputEngine {
        InputEngine {
            inner: Arc::new(EngineInner {
                driver: self.driver,
                gate: SessionGate::new(),
                config: RwLock::new(Arc::new(self.config)),
                metrics: self.metrics,
                hooks: self.hooks,
                delay_policy: self.delay_policy,
            }),
        }
    }
}

impl InputEngine {
    /// Start building an engine around the given session driver.
    #[must_use]
    pub fn builder(driver: Arc<dyn SessionDriver>) -> InputEngineBuilder {
        InputEngineBuilder {
            driver,
            config: InputConfig::default(),
            metrics: Arc::new(InputMetrics::new()),
            hooks: Arc::new(NoopHooks),
            delay_policy: Arc::new(FixedDelay),
        }
    }

    /// Engine with the given configuration and default hooks/policies.
    #[must_use]
    pub fn new(driver: Arc<dyn SessionDriver>, config: InputConfig) -> Self {
        Self::builder(driver).config(config).build()
    }

    /// Current configuration snapshot.
    #[must_use]
    pub fn config(&self) -> Arc<InputConfig> {
        Arc::clone(&self.inner.config.read())
    }

    /// Shared metrics collector.
    #[must_use]
    pub fn metrics(&self) -> Arc<InputMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    /// Install a new configuration snapshot built from `update`.
    ///
    /// Validation happens on the candidate; on failure the active snapshot
    /// is untouched. Requests already admitted keep the snapshot they were
    /// admitted with.
    ///
    /// # Errors
    /// Returns the violated invariant without applying anything.
    pub fn reconfigure(
        &self,
        update: &ConfigUpdate,
    ) -> Result<Arc<InputConfig>, crate::error::ConfigError> {
        let next = Arc::new(self.config().apply(update)?);
        *self.inner.config.write() = Arc::clone(&next);
        info!(config = ?next, "Input configuration updated");
        Ok(next)
    }

    /// Deliver one message to the control surface, returning once the
    /// submission is confirmed (or a terminal error is reached).
    ///
    /// Concurrent callers queue on the session gate in arrival order. A
    /// caller that stops waiting while queued has no effect on the surface;
    /// once admitted, the delivery runs to a terminal state on its own task
    /// even if the caller goes away.
    ///
    /// # Errors
    /// `Validation` for oversized or empty messages, `GateTimeout` if never
    /// admitted, `SessionUnavailable` if the collaborator cannot produce a
    /// surface, and `StrategyExhausted` once recovery is spent.
    pub async fn send(&self, message: &str) -> Result<DeliveryReport, EngineError> {
        let config = self.config();

        if let Err(reason) = validate_message(message) {
            self.inner.metrics.record_validation_rejected();
            return Err(EngineError::Validation(reason));
        }

        let permit = match self.inner.gate.acquire(config.gate_timeout()).await {
            Ok(permit) => permit,
            Err(error) => {
                self.inner.metrics.record_gate_timeout();
                return Err(error);
            }
        };

        // The request is admitted now: re-snapshot so a reconfiguration
        // that landed while this caller was queued takes effect here.
        let config = self.config();

        // Once admitted, the delivery must reach a terminal state even if
        // the caller stops waiting; the surface is never abandoned
        // mid-sequence.
        let engine = self.clone();
        let request = DeliveryRequest::new(message);
        let handle = tokio::spawn(async move {
            let _permit = permit;
            engine.process(&request, &config).await
        });

        match handle.await {
            Ok(result) => result,
            Err(join_error) => Err(EngineError::SessionUnavailable(SurfaceError::SessionLost(
                format!("delivery task failed: {join_error}"),
            ))),
        }
    }

    async fn process(
        &self,
        request: &DeliveryRequest,
        config: &InputConfig,
    ) -> Result<DeliveryReport, EngineError> {
        let started = Instant::now();
        let length = request.message.chars().count();

        let mut surface = self
            .inner
            .driver
            .locate_input_field(config.init_timeout())
            .await?;

        let chosen = strategy::select(length, config);
        self.inner.metrics.record_strategy(chosen);
        debug!(
            request_id = %request.id,
            length,
            strategy = %chosen,
            "Processing delivery request"
        );

        let mut state = ProcessingState::new();
        let mut recovery = RecoveryManager::new(config.max_retries);
        let mut active = chosen;

        loop {
            let attempt = self
                .attempt(surface.as_ref(), request, active, config, &mut state)
                .await;

            match attempt {
                Ok(()) => {
                    debug_assert!(
                        state.cleanup_performed,
                        "cleanup always precedes a confirmed send"
                    );
                    let timings = PhaseTimings {
                        cleanup: state.cleanup_elapsed,
                        send: state.send_elapsed,
                        total: started.elapsed(),
                    };
                    self.inner
                        .metrics
                        .record_success(timings.cleanup, timings.send, timings.total);

                    let delivered_by = if state.chunk_fallback {
                        Strategy::SmartChunking
                    } else {
                        active
                    };
                    info!(
                        request_id = %request.id,
                        strategy = %chosen,
                        delivered_by = %delivered_by,
                        level = %recovery.level(),
                        attempts = recovery.attempts(),
                        elapsed_ms = timings.total.as_millis(),
                        "Message delivered"
                    );
                    return Ok(DeliveryReport {
                        request_id: request.id,
                        strategy: chosen,
                        delivered_by,
                        recovery_level: recovery.level(),
                        attempts: recovery.attempts(),
                        residual: state.residual_observed.as_deref().map(cleanup::mask),
                        forced_cleanup: state.forced_cleanup,
                        chunk_fallback: state.chunk_fallback,
                        timings,
                    });
                }
                Err(error) if error.is_transient() => {
                    warn!(
                        request_id = %request.id,
                        error = %error,
                        level = %recovery.level(),
                        "Delivery attempt failed"
                    );
                    match recovery.escalate() {
                        RecoveryDirective::Exhausted => {
                            self.inner.metrics.record_exhausted(started.elapsed());
                            return Err(EngineError::StrategyExhausted {
                                level: recovery.level(),
                                attempts: recovery.attempts(),
                            });
                        }
                        RecoveryDirective::Retry(level) => {
                            self.inner.metrics.record_recovery_retry();
                            info!(
                                request_id = %request.id,
                                level = %level,
                                "Escalating recovery"
                            );
                            match level {
                                RecoveryLevel::Initial | RecoveryLevel::RetrySameStrategy => {}
                                RecoveryLevel::ForceChunking => {
                                    active = Strategy::SmartChunking;
                                }
                                RecoveryLevel::SessionReload => {
                                    self.inner.driver.reload().await?;
                                    surface = self
                                        .inner
                                        .driver
                                        .locate_input_field(config.init_timeout())
                                        .await?;
                                }
                            }
                        }
                    }
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// One full attempt: cleanup, strategy execution, verification.
    async fn attempt(
        &self,
        surface: &dyn ControlSurface,
        request: &DeliveryRequest,
        strategy: Strategy,
        config: &InputConfig,
        state: &mut ProcessingState,
    ) -> Result<(), EngineError> {
        let phase = Instant::now();
        self.inner
            .hooks
            .before_cleanup(surface)
            .await
            .map_err(|error| EngineError::CleanupFailed {
                residual: format!("before-cleanup hook failed: {error}"),
            })?;

        let outcome = cleanup::clear_surface(
            surface,
            config,
            self.inner.delay_policy.as_ref(),
            &self.inner.metrics.snapshot(),
        )
        .await;
        state.cleanup_performed = true;
        state.cleanup_elapsed += phase.elapsed();
        let outcome = outcome.map_err(EngineError::from)?;

        if !outcome.residual.is_empty() {
            self.inner.metrics.record_residual_detected();
            state.residual_observed = Some(outcome.residual);
        }
        if outcome.forced {
            self.inner.metrics.record_forced_cleanup();
            state.forced_cleanup = true;
        }

        self.inner
            .hooks
            .after_cleanup(surface)
            .await
            .map_err(|error| EngineError::CleanupFailed {
                residual: format!("after-cleanup hook failed: {error}"),
            })?;

        let phase = Instant::now();
        let result = self
            .execute_strategy(surface, request, strategy, config, state)
            .await;
        state.send_elapsed += phase.elapsed();
        result
    }

    async fn execute_strategy(
        &self,
        surface: &dyn ControlSurface,
        request: &DeliveryRequest,
        strategy: Strategy,
        config: &InputConfig,
        state: &mut ProcessingState,
    ) -> Result<(), EngineError> {
        let handled = self
            .inner
            .hooks
            .custom_send(surface, &request.message)
            .await
            .map_err(|error| send_failure("custom send hook", &error))?;
        if handled {
            return verify::confirm_submission(surface, config.init_timeout()).await;
        }

        match strategy {
            Strategy::SafeSingle => {
                self.single_shot(surface, &request.message).await?;
                verify::confirm_submission(surface, config.init_timeout()).await
            }
            Strategy::SmartChunking => {
                self.chunked(surface, &request.message, config).await?;
                verify::confirm_submission(surface, config.init_timeout()).await
            }
            Strategy::TrySingleThenChunk => {
                self.single_shot(surface, &request.message).await?;
                match verify::confirm_submission(surface, config.init_timeout()).await {
                    Ok(()) => Ok(()),
                    Err(error) if error.is_transient() => {
                        // The one permitted mid-request strategy change:
                        // fall back to chunked delivery of the same message.
                        // Deliberately invisible to the recovery manager.
                        info!(
                            request_id = %request.id,
                            error = %error,
                            "Single-shot not confirmed; falling back to chunked delivery"
                        );
                        self.inner.metrics.record_chunk_fallback();
                        state.chunk_fallback = true;

                        cleanup::clear_surface(
                            surface,
                            config,
                            self.inner.delay_policy.as_ref(),
                            &self.inner.metrics.snapshot(),
                        )
                        .await
                        .map_err(EngineError::from)?;

                        self.chunked(surface, &request.message, config).await?;
                        verify::confirm_submission(surface, config.init_timeout()).await
                    }
                    Err(error) => Err(error),
                }
            }
        }
    }

    async fn single_shot(
        &self,
        surface: &dyn ControlSurface,
        message: &str,
    ) -> Result<(), EngineError> {
        surface
            .send_keys(message)
            .await
            .map_err(|error| send_failure("injection", &error))?;
        surface
            .submit()
            .await
            .map_err(|error| send_failure("submit", &error))
    }

    async fn chunked(
        &self,
        surface: &dyn ControlSurface,
        message: &str,
        config: &InputConfig,
    ) -> Result<(), EngineError> {
        let pacing = self
            .inner
            .delay_policy
            .effective_delay(config.chunk_pacing_delay(), &self.inner.metrics.snapshot());
        ChunkedSender::new(surface, pacing)
            .deliver(message, config.chunk_size)
            .await
            .map_err(|error| send_failure("chunked delivery", &error))
    }
}

/// Classify a mid-delivery interaction failure as a failed (retryable) send.
fn send_failure(stage: &str, error: &SurfaceError) -> EngineError {
    EngineError::SendVerificationFailed {
        reason: format!("{stage} failed: {error}"),
    }
}

fn validate_message(message: &str) -> Result<(), String> {
    if message.is_empty() {
        return Err("message is empty".into());
    }
    let length = message.chars().count();
    if length > MAX_MESSAGE_LEN {
        return Err(format!(
            "message length {length} exceeds the {MAX_MESSAGE_LEN} character cap"
        ));
    }
    Ok(())
}
