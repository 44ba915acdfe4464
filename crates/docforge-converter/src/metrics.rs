//! Job counters for the health endpoint.
//!
//! Counters are atomics; per-code failure counts and the recent duration
//! window sit behind a mutex.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Duration samples kept for percentile estimates.
const MAX_DURATION_SAMPLES: usize = 1000;

/// Job metrics collector, shared by every request.
#[derive(Debug, Default)]
pub struct ConversionMetrics {
    jobs_started: AtomicU64,
    jobs_succeeded: AtomicU64,
    jobs_failed: AtomicU64,
    deliveries_failed: AtomicU64,
    total_input_bytes: AtomicU64,
    total_output_bytes: AtomicU64,
    failures_by_code: Mutex<BTreeMap<&'static str, u64>>,
    durations_ms: Mutex<VecDeque<u64>>,
}

impl ConversionMetrics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// A job was accepted by the orchestrator.
    pub fn record_started(&self, input_bytes: u64) {
        self.jobs_started.fetch_add(1, Ordering::Relaxed);
        self.total_input_bytes
            .fetch_add(input_bytes, Ordering::Relaxed);
    }

    /// A job produced a verified output.
    pub fn record_success(&self, duration: Duration, output_bytes: u64) {
        self.jobs_succeeded.fetch_add(1, Ordering::Relaxed);
        self.total_output_bytes
            .fetch_add(output_bytes, Ordering::Relaxed);

        if let Ok(mut samples) = self.durations_ms.lock() {
            if samples.len() >= MAX_DURATION_SAMPLES {
                samples.pop_front();
            }
            samples.push_back(duration.as_millis() as u64);
        }
    }

    /// A job ended in failure with the given error code.
    pub fn record_failure(&self, code: &'static str) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut by_code) = self.failures_by_code.lock() {
            *by_code.entry(code).or_insert(0) += 1;
        }
    }

    /// Handing a verified output to the caller failed.
    pub fn record_delivery_failure(&self) {
        self.deliveries_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut durations: Vec<u64> = self
            .durations_ms
            .lock()
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        durations.sort_unstable();

        let percentile = |p: usize| -> Option<u64> {
            if durations.is_empty() {
                return None;
            }
            let idx = ((durations.len() - 1) * p) / 100;
            durations.get(idx).copied()
        };

        MetricsSnapshot {
            jobs_started: self.jobs_started.load(Ordering::Relaxed),
            jobs_succeeded: self.jobs_succeeded.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            deliveries_failed: self.deliveries_failed.load(Ordering::Relaxed),
            total_input_bytes: self.total_input_bytes.load(Ordering::Relaxed),
            total_output_bytes: self.total_output_bytes.load(Ordering::Relaxed),
            failures_by_code: self
                .failures_by_code
                .lock()
                .map(|m| m.iter().map(|(k, v)| (k.to_string(), *v)).collect())
                .unwrap_or_default(),
            duration_p50_ms: percentile(50),
            duration_p95_ms: percentile(95),
            sample_count: durations.len() as u64,
        }
    }
}

/// Serializable view of [`ConversionMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Jobs accepted.
    pub jobs_started: u64,
    /// Jobs with a verified output.
    pub jobs_succeeded: u64,
    /// Jobs that ended in failure.
    pub jobs_failed: u64,
    /// Successful jobs whose output could not be handed over.
    pub deliveries_failed: u64,
    /// Bytes of uploaded input.
    pub total_input_bytes: u64,
    /// Bytes of produced output.
    pub total_output_bytes: u64,
    /// Failure counts keyed by error code.
    pub failures_by_code: BTreeMap<String, u64>,
    /// Median job duration over the recent window.
    pub duration_p50_ms: Option<u64>,
    /// 95th percentile job duration over the recent window.
    pub duration_p95_ms: Option<u64>,
    /// Samples in the window.
    pub sample_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_failure_codes() {
        let m = ConversionMetrics::new();
        m.record_started(10);
        m.record_started(20);
        m.record_started(30);
        m.record_success(Duration::from_millis(40), 7);
        m.record_failure("EXECUTION_FAILED");
        m.record_failure("EXECUTION_FAILED");
        m.record_delivery_failure();

        let snap = m.snapshot();
        assert_eq!(snap.jobs_started, 3);
        assert_eq!(snap.jobs_succeeded, 1);
        assert_eq!(snap.jobs_failed, 2);
        assert_eq!(snap.deliveries_failed, 1);
        assert_eq!(snap.total_input_bytes, 60);
        assert_eq!(snap.total_output_bytes, 7);
        assert_eq!(snap.failures_by_code.get("EXECUTION_FAILED"), Some(&2));
    }

    #[test]
    fn test_percentiles() {
        let m = ConversionMetrics::new();
        assert_eq!(m.snapshot().duration_p50_ms, None);

        for i in 1..=100 {
            m.record_success(Duration::from_millis(i * 10), 1);
        }
        let snap = m.snapshot();
        assert_eq!(snap.sample_count, 100);
        assert_eq!(snap.duration_p50_ms, Some(500));
        assert_eq!(snap.duration_p95_ms, Some(950));
    }

    #[test]
    fn test_window_is_bounded() {
        let m = ConversionMetrics::new();
        for _ in 0..(MAX_DURATION_SAMPLES + 5) {
            m.record_success(Duration::from_millis(1), 0);
        }
        assert_eq!(m.snapshot().sample_count, MAX_DURATION_SAMPLES as u64);
    }
}
