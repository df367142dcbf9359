//! Mock browser collaborator for delivery scenario tests.
//!
//! Provides a scripted control surface and session driver that can:
#![allow(dead_code)] // Test utility module - not all methods used in every test
//! - Leave residual content behind `clear()` calls
//! - Fail `submit()` a scripted number of times (verification then fails)
//! - Fail `send_keys()` a scripted number of times
//! - Refuse forced clearing
//! - Track every command, with timestamps, for verification

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use quill::{ControlSurface, KeyCombo, SessionDriver, SurfaceError};

/// One recorded interaction with the mock surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Read,
    Clear,
    SendKeys(String),
    Combo(KeyCombo),
    Submit,
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub command: Command,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct SurfaceState {
    buffer: String,
    /// Content the field holds after each upcoming `clear()`; empty once
    /// drained.
    clear_leaves: VecDeque<String>,
    /// Upcoming `submit()` calls that silently fail, leaving the buffer.
    failing_submits: usize,
    /// Upcoming `send_keys()` calls that error out.
    failing_send_keys: usize,
    /// Whether select-all+delete leaves the buffer untouched.
    forced_clear_fails: bool,
    /// Messages consumed by successful submits, in order.
    delivered: Vec<String>,
    log: Vec<Recorded>,
}

/// Scripted in-memory control surface.
#[derive(Debug, Default)]
pub struct MockSurface {
    state: Mutex<SurfaceState>,
}

impl MockSurface {
    pub fn builder() -> MockSurfaceBuilder {
        MockSurfaceBuilder::default()
    }

    fn record(&self, command: Command) {
        self.state.lock().log.push(Recorded {
            command,
            at: Instant::now(),
        });
    }

    /// Everything delivered by successful submits, in order.
    pub fn delivered(&self) -> Vec<String> {
        self.state.lock().delivered.clone()
    }

    /// Full command log.
    pub fn log(&self) -> Vec<Recorded> {
        self.state.lock().log.clone()
    }

    /// Commands only, without timestamps.
    pub fn commands(&self) -> Vec<Command> {
        self.state
            .lock()
            .log
            .iter()
            .map(|entry| entry.command.clone())
            .collect()
    }

    pub fn send_keys_count(&self) -> usize {
        self.state
            .lock()
            .log
            .iter()
            .filter(|entry| matches!(entry.command, Command::SendKeys(_)))
            .count()
    }

    pub fn submit_count(&self) -> usize {
        self.state
            .lock()
            .log
            .iter()
            .filter(|entry| entry.command == Command::Submit)
            .count()
    }

    pub fn combo_count(&self, combo: KeyCombo) -> usize {
        self.state
            .lock()
            .log
            .iter()
            .filter(|entry| entry.command == Command::Combo(combo))
            .count()
    }

    /// Current field content.
    pub fn buffer(&self) -> String {
        self.state.lock().buffer.clone()
    }
}

#[async_trait]
impl ControlSurface for MockSurface {
    async fn read(&self) -> Result<String, SurfaceError> {
        self.record(Command::Read);
        Ok(self.state.lock().buffer.clone())
    }

    async fn clear(&self) -> Result<(), SurfaceError> {
        self.record(Command::Clear);
        let mut state = self.state.lock();
        state.buffer = state.clear_leaves.pop_front().unwrap_or_default();
        Ok(())
    }

    async fn send_keys(&self, text: &str) -> Result<(), SurfaceError> {
        self.record(Command::SendKeys(text.to_owned()));
        let mut state = self.state.lock();
        if state.failing_send_keys > 0 {
            state.failing_send_keys -= 1;
            return Err(SurfaceError::Interaction("keystrokes dropped".into()));
        }
        state.buffer.push_str(text);
        Ok(())
    }

    async fn send_key_combo(&self, combo: KeyCombo) -> Result<(), SurfaceError> {
        self.record(Command::Combo(combo));
        let mut state = self.state.lock();
        if combo == KeyCombo::SelectAllDelete && !state.forced_clear_fails {
            state.buffer.clear();
        }
        Ok(())
    }

    async fn submit(&self) -> Result<(), SurfaceError> {
        self.record(Command::Submit);
        let mut state = self.state.lock();
        if state.failing_submits > 0 {
            state.failing_submits -= 1;
            // The UI swallowed the submit; the text stays in the field.
            return Ok(());
        }
        let message = std::mem::take(&mut state.buffer);
        state.delivered.push(message);
        Ok(())
    }
}

/// Builder mirroring the failure-injection knobs.
#[derive(Debug, Default)]
pub struct MockSurfaceBuilder {
    clear_leaves: VecDeque<String>,
    failing_submits: usize,
    failing_send_keys: usize,
    forced_clear_fails: bool,
    initial_buffer: String,
}

impl MockSurfaceBuilder {
    /// The next `clear()` leaves this content in the field.
    pub fn leave_after_clear(mut self, residual: impl Into<String>) -> Self {
        self.clear_leaves.push_back(residual.into());
        self
    }

    pub fn failing_submits(mut self, count: usize) -> Self {
        self.failing_submits = count;
        self
    }

    pub fn failing_send_keys(mut self, count: usize) -> Self {
        self.failing_send_keys = count;
        self
    }

    pub fn forced_clear_fails(mut self) -> Self {
        self.forced_clear_fails = true;
        self
    }

    pub fn initial_buffer(mut self, content: impl Into<String>) -> Self {
        self.initial_buffer = content.into();
        self
    }

    pub fn build(self) -> Arc<MockSurface> {
        Arc::new(MockSurface {
            state: Mutex::new(SurfaceState {
                buffer: self.initial_buffer,
                clear_leaves: self.clear_leaves,
                failing_submits: self.failing_submits,
                failing_send_keys: self.failing_send_keys,
                forced_clear_fails: self.forced_clear_fails,
                delivered: Vec::new(),
                log: Vec::new(),
            }),
        })
    }
}

/// Scripted session driver wrapping a [`MockSurface`].
pub struct MockDriver {
    surface: Mutex<Arc<MockSurface>>,
    reply: Mutex<Option<String>>,
    locate_failures: AtomicUsize,
    reload_count: AtomicUsize,
    reload_fails: bool,
}

impl MockDriver {
    pub fn new(surface: Arc<MockSurface>) -> Arc<Self> {
        Arc::new(Self {
            surface: Mutex::new(surface),
            reply: Mutex::new(None),
            locate_failures: AtomicUsize::new(0),
            reload_count: AtomicUsize::new(0),
            reload_fails: false,
        })
    }

    pub fn with_reply(surface: Arc<MockSurface>, reply: impl Into<String>) -> Arc<Self> {
        let driver = Self::new(surface);
        *driver.reply.lock() = Some(reply.into());
        driver
    }

    pub fn failing_locates(surface: Arc<MockSurface>, failures: usize) -> Arc<Self> {
        let driver = Self::new(surface);
        driver.locate_failures.store(failures, Ordering::SeqCst);
        driver
    }

    pub fn with_failing_reload(surface: Arc<MockSurface>) -> Arc<Self> {
        Arc::new(Self {
            surface: Mutex::new(surface),
            reply: Mutex::new(None),
            locate_failures: AtomicUsize::new(0),
            reload_count: AtomicUsize::new(0),
            reload_fails: true,
        })
    }

    pub fn reload_count(&self) -> usize {
        self.reload_count.load(Ordering::SeqCst)
    }

    /// Swap in a fresh surface, returned by subsequent locates.
    pub fn replace_surface(&self, surface: Arc<MockSurface>) {
        *self.surface.lock() = surface;
    }

    pub fn surface(&self) -> Arc<MockSurface> {
        Arc::clone(&self.surface.lock())
    }
}

#[async_trait]
impl SessionDriver for MockDriver {
    async fn locate_input_field(
        &self,
        timeout: Duration,
    ) -> Result<Arc<dyn ControlSurface>, SurfaceError> {
        if self.locate_failures.load(Ordering::SeqCst) > 0 {
            self.locate_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(SurfaceError::ElementNotFound(timeout));
        }
        Ok(self.surface())
    }

    async fn reload(&self) -> Result<(), SurfaceError> {
        self.reload_count.fetch_add(1, Ordering::SeqCst);
        if self.reload_fails {
            return Err(SurfaceError::SessionLost("reload failed".into()));
        }
        Ok(())
    }

    async fn await_reply(&self, _timeout: Duration) -> Result<String, SurfaceError> {
        self.reply
            .lock()
            .clone()
            .ok_or_else(|| SurfaceError::SessionLost("no reply scripted".into()))
    }
}
