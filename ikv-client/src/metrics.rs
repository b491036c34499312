//! # Client Metrics
//!
//! Purpose: Count commands, classify failures, time round trips and keep a
//! gauge of live batches so resource release can be verified.
//!
//! ## Design Principles
//! 1. **Accumulator Pattern**: Atomic counters aggregate events cheaply.
//! 2. **Fixed Buckets**: Histogram buckets live in one contiguous array.
//! 3. **Plain Snapshots**: Readers get owned structs, never live references.
//!
//! ## Notes
//! - `live_batches` rises when a tracked `Batch` is created and falls when it
//!   is dropped. After every call returns it must be back to zero.
//! - Bucket boundaries are expressed in microseconds.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use ikv_common::ClientError;

/// Default latency bucket boundaries in microseconds.
pub const DEFAULT_LATENCY_BUCKETS_US: [u64; 12] = [
    50, 100, 200, 500, 1_000, 2_000, 5_000, 10_000, 20_000, 50_000, 100_000, 500_000,
];

/// Snapshot of all client metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Commands submitted to the server (pipelined commands count one each).
    pub commands_total: u64,
    /// Executions that failed at the transport level.
    pub connection_errors: u64,
    /// Error replies raised as command errors.
    pub command_errors: u64,
    /// Replies whose shape did not match the command contract.
    pub protocol_errors: u64,
    /// Batches currently alive.
    pub live_batches: u64,
    /// Execution latency histogram.
    pub latency: LatencySnapshot,
}

/// Snapshot of the latency histogram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencySnapshot {
    /// Bucket boundaries in microseconds.
    pub bounds_us: Vec<u64>,
    /// Bucket counts, including the overflow bucket at the end.
    pub buckets: Vec<u64>,
    /// Total number of samples.
    pub samples: u64,
    /// Sum of latencies in microseconds.
    pub sum_us: u64,
}

/// Thread-safe metrics aggregator for one client.
///
/// `Ordering::Relaxed` is enough: no reader relies on cross-field ordering.
#[derive(Debug)]
pub struct ClientMetrics {
    commands_total: AtomicU64,
    connection_errors: AtomicU64,
    command_errors: AtomicU64,
    protocol_errors: AtomicU64,
    live_batches: AtomicU64,
    latency: LatencyHistogram,
}

impl Default for ClientMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientMetrics {
    /// Creates a metrics aggregator with the default latency buckets.
    pub fn new() -> Self {
        ClientMetrics {
            commands_total: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            command_errors: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            live_batches: AtomicU64::new(0),
            latency: LatencyHistogram::new(DEFAULT_LATENCY_BUCKETS_US.to_vec()),
        }
    }

    pub(crate) fn record_batch_created(&self) {
        self.live_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch_released(&self) {
        self.live_batches.fetch_sub(1, Ordering::Relaxed);
    }

    /// Records one execution of `commands` commands and its latency.
    pub(crate) fn record_execute(&self, commands: usize, latency: Duration) {
        self.commands_total
            .fetch_add(commands as u64, Ordering::Relaxed);
        self.latency.record(latency);
    }

    /// Buckets an error into its class counter.
    pub(crate) fn record_error(&self, err: &ClientError) {
        let counter = match err {
            ClientError::Connection(_) => &self.connection_errors,
            ClientError::Command { .. } => &self.command_errors,
            ClientError::Protocol(_) => &self.protocol_errors,
            ClientError::Argument(_) | ClientError::Config(_) => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters and histogram buckets.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commands_total: self.commands_total.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            command_errors: self.command_errors.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            live_batches: self.live_batches.load(Ordering::Relaxed),
            latency: self.latency.snapshot(),
        }
    }
}

/// Fixed-bucket latency histogram.
///
/// Bucket selection is a linear scan; the list is short and stays hot.
#[derive(Debug)]
pub struct LatencyHistogram {
    bounds_us: Vec<u64>,
    buckets: Vec<AtomicU64>,
    sum_us: AtomicU64,
    samples: AtomicU64,
}

impl LatencyHistogram {
    /// Creates a histogram with `bounds_us.len() + 1` buckets (last is overflow).
    pub fn new(bounds_us: Vec<u64>) -> Self {
        let buckets = (0..=bounds_us.len()).map(|_| AtomicU64::new(0)).collect();
        LatencyHistogram {
            bounds_us,
            buckets,
            sum_us: AtomicU64::new(0),
            samples: AtomicU64::new(0),
        }
    }

    /// Records one latency measurement.
    pub fn record(&self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.samples.fetch_add(1, Ordering::Relaxed);
        self.sum_us.fetch_add(micros, Ordering::Relaxed);

        let idx = self
            .bounds_us
            .iter()
            .position(|&bound| micros <= bound)
            .unwrap_or(self.bounds_us.len());
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of the histogram.
    pub fn snapshot(&self) -> LatencySnapshot {
        LatencySnapshot {
            bounds_us: self.bounds_us.clone(),
            buckets: self
                .buckets
                .iter()
                .map(|bucket| bucket.load(Ordering::Relaxed))
                .collect(),
            samples: self.samples.load(Ordering::Relaxed),
            sum_us: self.sum_us.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_picks_first_matching_bucket() {
        let histogram = LatencyHistogram::new(vec![10, 100]);
        histogram.record(Duration::from_micros(5));
        histogram.record(Duration::from_micros(10));
        histogram.record(Duration::from_micros(50));
        histogram.record(Duration::from_millis(1));

        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.buckets, vec![2, 1, 1]);
        assert_eq!(snapshot.samples, 4);
        assert_eq!(snapshot.sum_us, 5 + 10 + 50 + 1_000);
    }

    #[test]
    fn errors_are_classified() {
        let metrics = ClientMetrics::new();
        metrics.record_error(&ClientError::Connection("down".into()));
        metrics.record_error(&ClientError::command(&b"ERR"[..]));
        metrics.record_error(&ClientError::protocol("bad kind"));
        metrics.record_error(&ClientError::Argument("arity".into()));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connection_errors, 1);
        assert_eq!(snapshot.command_errors, 1);
        assert_eq!(snapshot.protocol_errors, 1);
    }

    #[test]
    fn batch_gauge_tracks_create_and_release() {
        let metrics = ClientMetrics::new();
        metrics.record_batch_created();
        metrics.record_batch_created();
        metrics.record_batch_released();
        assert_eq!(metrics.snapshot().live_batches, 1);
    }
}
