//! Delivery metrics.
//!
//! Process-wide, append-only counters and latency histograms for the input
//! delivery engine. Recording is lock-free (`AtomicU64` at counter
//! granularity), never blocks the request path, and cannot fail a request.
//! Counters reset only through the explicit administrative [`InputMetrics::reset`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::engine::strategy::Strategy;

/// Upper bounds (milliseconds) of the latency histogram buckets. The last
/// bucket is unbounded.
const BUCKET_BOUNDS_MS: [u64; 9] = [25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 15_000];

/// Fixed-bucket latency histogram with atomic recording.
#[derive(Debug, Default)]
struct LatencyHistogram {
    buckets: [AtomicU64; BUCKET_BOUNDS_MS.len() + 1],
    count: AtomicU64,
    sum_ms: AtomicU64,
}

impl LatencyHistogram {
    fn record(&self, elapsed: Duration) {
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let index = BUCKET_BOUNDS_MS
            .iter()
            .position(|bound| ms <= *bound)
            .unwrap_or(BUCKET_BOUNDS_MS.len());
        self.buckets[index].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_ms.fetch_add(ms, Ordering::Relaxed);
    }

    fn reset(&self) {
        for bucket in &self.buckets {
            bucket.store(0, Ordering::Relaxed);
        }
        self.count.store(0, Ordering::Relaxed);
        self.sum_ms.store(0, Ordering::Relaxed);
    }

    fn snapshot(&self) -> HistogramSnapshot {
        let count = self.count.load(Ordering::Relaxed);
        let sum_ms = self.sum_ms.load(Ordering::Relaxed);
        HistogramSnapshot {
            buckets: self
                .buckets
                .iter()
                .enumerate()
                .map(|(index, bucket)| BucketSnapshot {
                    le_ms: BUCKET_BOUNDS_MS.get(index).copied(),
                    count: bucket.load(Ordering::Relaxed),
                })
                .collect(),
            count,
            sum_ms,
            mean_ms: if count == 0 {
                0.0
            } else {
                #[allow(clippy::cast_precision_loss)]
                {
                    sum_ms as f64 / count as f64
                }
            },
        }
    }
}

/// One histogram bucket; `le_ms` is `None` for the unbounded tail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketSnapshot {
    pub le_ms: Option<u64>,
    pub count: u64,
}

/// Point-in-time view of a latency histogram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramSnapshot {
    pub buckets: Vec<BucketSnapshot>,
    pub count: u64,
    pub sum_ms: u64,
    pub mean_ms: f64,
}

/// Metrics collector for the input delivery engine.
///
/// Shared across all requests; increments are atomic so concurrent requests
/// never lose updates.
#[derive(Debug, Default)]
pub struct InputMetrics {
    success_total: AtomicU64,
    exhausted_total: AtomicU64,
    validation_rejected_total: AtomicU64,
    gate_timeout_total: AtomicU64,
    residual_detected_total: AtomicU64,
    forced_cleanup_total: AtomicU64,
    recovery_retries_total: AtomicU64,
    chunk_fallback_total: AtomicU64,
    strategy_safe_single: AtomicU64,
    strategy_try_single_then_chunk: AtomicU64,
    strategy_smart_chunking: AtomicU64,
    cleanup_latency: LatencyHistogram,
    send_latency: LatencyHistogram,
    total_latency: LatencyHistogram,
}

impl InputMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record which strategy was chosen for a request.
    pub fn record_strategy(&self, strategy: Strategy) {
        let counter = match strategy {
            Strategy::SafeSingle => &self.strategy_safe_single,
            Strategy::TrySingleThenChunk => &self.strategy_try_single_then_chunk,
            Strategy::SmartChunking => &self.strategy_smart_chunking,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successfully delivered request with its phase timings.
    pub fn record_success(&self, cleanup: Duration, send: Duration, total: Duration) {
        self.success_total.fetch_add(1, Ordering::Relaxed);
        self.cleanup_latency.record(cleanup);
        self.send_latency.record(send);
        self.total_latency.record(total);
    }

    /// Record a request abandoned after recovery exhaustion.
    pub fn record_exhausted(&self, total: Duration) {
        self.exhausted_total.fetch_add(1, Ordering::Relaxed);
        self.total_latency.record(total);
    }

    /// Record a request rejected before engine entry.
    pub fn record_validation_rejected(&self) {
        self.validation_rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a caller that was never admitted to the gate.
    pub fn record_gate_timeout(&self) {
        self.gate_timeout_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record residual content found during cleanup.
    pub fn record_residual_detected(&self) {
        self.residual_detected_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an escalation to forced clearing.
    pub fn record_forced_cleanup(&self) {
        self.forced_cleanup_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one recovery retry.
    pub fn record_recovery_retry(&self) {
        self.recovery_retries_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an in-strategy fallback from single injection to chunking.
    pub fn record_chunk_fallback(&self) {
        self.chunk_fallback_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Produce a point-in-time snapshot of all counters and histograms.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            success_total: self.success_total.load(Ordering::Relaxed),
            exhausted_total: self.exhausted_total.load(Ordering::Relaxed),
            validation_rejected_total: self.validation_rejected_total.load(Ordering::Relaxed),
            gate_timeout_total: self.gate_timeout_total.load(Ordering::Relaxed),
            residual_detected_total: self.residual_detected_total.load(Ordering::Relaxed),
            forced_cleanup_total: self.forced_cleanup_total.load(Ordering::Relaxed),
            recovery_retries_total: self.recovery_retries_total.load(Ordering::Relaxed),
            chunk_fallback_total: self.chunk_fallback_total.load(Ordering::Relaxed),
            strategy_counts: StrategyCounts {
                safe_single: self.strategy_safe_single.load(Ordering::Relaxed),
                try_single_then_chunk: self
                    .strategy_try_single_then_chunk
                    .load(Ordering::Relaxed),
                smart_chunking: self.strategy_smart_chunking.load(Ordering::Relaxed),
            },
            cleanup_latency: self.cleanup_latency.snapshot(),
            send_latency: self.send_latency.snapshot(),
            total_latency: self.total_latency.snapshot(),
        }
    }

    /// Administrative reset. Metrics never reset implicitly.
    pub fn reset(&self) {
        self.success_total.store(0, Ordering::Relaxed);
        self.exhausted_total.store(0, Ordering::Relaxed);
        self.validation_rejected_total.store(0, Ordering::Relaxed);
        self.gate_timeout_total.store(0, Ordering::Relaxed);
        self.residual_detected_total.store(0, Ordering::Relaxed);
        self.forced_cleanup_total.store(0, Ordering::Relaxed);
        self.recovery_retries_total.store(0, Ordering::Relaxed);
        self.chunk_fallback_total.store(0, Ordering::Relaxed);
        self.strategy_safe_single.store(0, Ordering::Relaxed);
        self.strategy_try_single_then_chunk.store(0, Ordering::Relaxed);
        self.strategy_smart_chunking.store(0, Ordering::Relaxed);
        self.cleanup_latency.reset();
        self.send_latency.reset();
        self.total_latency.reset();
    }
}

/// Per-strategy request counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyCounts {
    pub safe_single: u64,
    pub try_single_then_chunk: u64,
    pub smart_chunking: u64,
}

/// Point-in-time view of all delivery metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub success_total: u64,
    pub exhausted_total: u64,
    pub validation_rejected_total: u64,
    pub gate_timeout_total: u64,
    pub residual_detected_total: u64,
    pub forced_cleanup_total: u64,
    pub recovery_retries_total: u64,
    pub chunk_fallback_total: u64,
    pub strategy_counts: StrategyCounts,
    pub cleanup_latency: HistogramSnapshot,
    pub send_latency: HistogramSnapshot,
    pub total_latency: HistogramSnapshot,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_histogram_bucketing() {
        let histogram = LatencyHistogram::default();
        histogram.record(Duration::from_millis(10)); // <= 25
        histogram.record(Duration::from_millis(25)); // <= 25
        histogram.record(Duration::from_millis(400)); // <= 500
        histogram.record(Duration::from_secs(60)); // unbounded tail

        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.count, 4);
        assert_eq!(snapshot.buckets[0].count, 2);
        assert_eq!(snapshot.buckets[4].count, 1);
        assert_eq!(snapshot.buckets.last().unwrap().count, 1);
        assert_eq!(snapshot.buckets.last().unwrap().le_ms, None);
    }

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = InputMetrics::new();
        metrics.record_strategy(Strategy::SafeSingle);
        metrics.record_strategy(Strategy::SmartChunking);
        metrics.record_residual_detected();
        metrics.record_success(
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(350),
        );

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.success_total, 1);
        assert_eq!(snapshot.residual_detected_total, 1);
        assert_eq!(snapshot.strategy_counts.safe_single, 1);
        assert_eq!(snapshot.strategy_counts.smart_chunking, 1);
        assert_eq!(snapshot.strategy_counts.try_single_then_chunk, 0);
        assert_eq!(snapshot.total_latency.count, 1);

        metrics.reset();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.success_total, 0);
        assert_eq!(snapshot.strategy_counts.safe_single, 0);
        assert_eq!(snapshot.total_latency.count, 0);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let metrics = Arc::new(InputMetrics::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let metrics = Arc::clone(&metrics);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    metrics.record_residual_detected();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.snapshot().residual_detected_total, 8000);
    }
}
