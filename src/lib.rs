//! Resilient input delivery for a shared, browser-controlled chat input.
//!
//! `quill` drives text into a single stateful UI text field reliably despite
//! flaky rendering, leftover content from prior turns, and UI limits on
//! paste volume. It provides:
//!
//! - serialized access to the surface (one delivery in flight, ever),
//! - staged cleanup with residual detection and forced clearing,
//! - length-based send strategies with chunked delivery for long messages,
//! - post-send verification and escalating recovery,
//! - passive delivery metrics.
//!
//! Browser specifics stay behind the [`surface::ControlSurface`] and
//! [`surface::SessionDriver`] traits; the engine itself has no browser
//! dependency.

pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod hooks;
pub mod logging;
pub mod metrics;
pub mod service;
pub mod surface;

pub use config::{ConfigUpdate, InputConfig, MAX_MESSAGE_LEN};
pub use engine::{
    DeliveryReport, DeliveryRequest, InputEngine, InputEngineBuilder, PhaseTimings,
    chunker::{Chunk, chunk_message},
    recovery::{RecoveryDirective, RecoveryLevel, RecoveryManager},
    strategy::{Strategy, select},
};
pub use error::{ConfigError, EngineError, SurfaceError};
pub use gate::{GatePermit, SessionGate};
pub use hooks::{DelayPolicy, DeliveryHooks, FixedDelay, NoopHooks};
pub use metrics::{InputMetrics, MetricsSnapshot};
pub use service::InputService;
pub use surface::{ControlSurface, KeyCombo, SessionDriver};

pub use tracing;
