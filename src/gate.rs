//! Single-slot admission gate for the shared control surface.
//!
//! The underlying UI has no notion of interleaved sessions, so the engine
//! serializes every delivery behind this gate: at most one request holds
//! delivery access at a time, waiters are admitted in arrival order, and the
//! permit releases on every exit path, including failure.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::EngineError;

/// Single-slot mutual exclusion over the control surface.
///
/// Backed by a `tokio::sync::Mutex`, whose wait queue admits lock futures in
/// FIFO order and wakes at most one waiter per release. Dropping an
/// `acquire` future while still queued has no side effect.
#[derive(Debug, Clone, Default)]
pub struct SessionGate {
    slot: Arc<Mutex<()>>,
}

/// Scoped proof of sole delivery access.
///
/// Releasing is automatic when the permit drops, waking at most one queued
/// caller.
#[derive(Debug)]
pub struct GatePermit {
    _guard: OwnedMutexGuard<()>,
    admitted_at: Instant,
}

impl GatePermit {
    /// Instant at which this permit was granted. Used by the engine for
    /// phase timing and by tests to check that admitted intervals never
    /// overlap.
    #[must_use]
    pub const fn admitted_at(&self) -> Instant {
        self.admitted_at
    }
}

impl SessionGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until this caller is the sole holder of delivery access.
    ///
    /// # Errors
    /// Returns `GateTimeout` if not admitted within `timeout`, preventing
    /// unbounded queuing behind a stuck delivery.
    pub async fn acquire(&self, timeout: Duration) -> Result<GatePermit, EngineError> {
        match tokio::time::timeout(timeout, Arc::clone(&self.slot).lock_owned()).await {
            Ok(guard) => Ok(GatePermit {
                _guard: guard,
                admitted_at: Instant::now(),
            }),
            Err(_) => Err(EngineError::GateTimeout { waited: timeout }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn permit_releases_on_drop() {
        let gate = SessionGate::new();

        let permit = gate.acquire(Duration::from_millis(100)).await.unwrap();
        drop(permit);

        // A second acquire succeeds once the first permit is gone.
        let permit = gate.acquire(Duration::from_millis(100)).await.unwrap();
        drop(permit);
    }

    #[tokio::test]
    async fn acquire_times_out_while_held() {
        let gate = SessionGate::new();
        let _held = gate.acquire(Duration::from_millis(100)).await.unwrap();

        let result = gate.acquire(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(EngineError::GateTimeout { .. })));
    }

    #[tokio::test]
    async fn admitted_intervals_never_overlap() {
        let gate = SessionGate::new();
        let intervals = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let gate = gate.clone();
            let intervals = Arc::clone(&intervals);
            handles.push(tokio::spawn(async move {
                let permit = gate.acquire(Duration::from_secs(5)).await.unwrap();
                let entered = permit.admitted_at();
                tokio::time::sleep(Duration::from_millis(5)).await;
                let exited = Instant::now();
                drop(permit);
                intervals.lock().push((entered, exited));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut intervals = intervals.lock().clone();
        intervals.sort_by_key(|(entered, _)| *entered);
        for window in intervals.windows(2) {
            let (_, first_exit) = window[0];
            let (second_enter, _) = window[1];
            assert!(
                first_exit <= second_enter,
                "two requests held the gate at once"
            );
        }
    }

    #[tokio::test]
    async fn queued_acquire_is_cancellable() {
        let gate = SessionGate::new();
        let _held = gate.acquire(Duration::from_millis(100)).await.unwrap();

        // Drop a queued acquire before admission; the gate must stay usable.
        let queued = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        queued.abort();
        let _ = queued.await;

        drop(_held);
        let permit = gate.acquire(Duration::from_millis(100)).await;
        assert!(permit.is_ok());
    }
}
