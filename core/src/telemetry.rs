// Telemetry: tracing setup and in-process broadcast counters
use crate::content::{BroadcastOutcome, Stage};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` wins over `default_filter`.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub runs: u64,
    pub delivered: u64,
    pub failed: u64,
    pub failures_by_stage: BTreeMap<String, u64>,
    pub avg_latency_ms: f64,
    pub uptime_secs: u64,
}

/// Broadcast counters. Nothing is persisted.
pub struct BroadcastStats {
    runs: AtomicU64,
    delivered: AtomicU64,
    total_latency_ms: AtomicU64,
    failures: DashMap<Stage, u64>,
    start_time: Instant,
}

impl BroadcastStats {
    pub fn new() -> Self {
        Self {
            runs: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            failures: DashMap::new(),
            start_time: Instant::now(),
        }
    }

    pub fn record(&self, outcome: &BroadcastOutcome, latency: Duration) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms
            .fetch_add(latency.as_millis() as u64, Ordering::Relaxed);
        if outcome.success() {
            self.delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            *self.failures.entry(outcome.stage_reached()).or_insert(0) += 1;
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let runs = self.runs.load(Ordering::Relaxed);
        let delivered = self.delivered.load(Ordering::Relaxed);
        let failures_by_stage: BTreeMap<String, u64> = self
            .failures
            .iter()
            .map(|e| (e.key().as_str().to_string(), *e.value()))
            .collect();
        let avg_latency_ms = if runs == 0 {
            0.0
        } else {
            self.total_latency_ms.load(Ordering::Relaxed) as f64 / runs as f64
        };
        StatsSnapshot {
            runs,
            delivered,
            failed: failures_by_stage.values().sum(),
            failures_by_stage,
            avg_latency_ms,
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    pub fn log_summary(&self) {
        let s = self.snapshot();
        info!(
            target: "telemetry",
            runs = s.runs,
            delivered = s.delivered,
            failed = s.failed,
            avg_latency_ms = s.avg_latency_ms,
            failures = ?s.failures_by_stage,
            uptime_secs = s.uptime_secs,
            "Broadcast stats"
        );
    }
}

impl Default for BroadcastStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_stage() {
        let stats = BroadcastStats::new();
        stats.record(&BroadcastOutcome::delivered(), Duration::from_millis(300));
        stats.record(
            &BroadcastOutcome::aborted(Stage::TranslationQa, "pass-through"),
            Duration::from_millis(100),
        );
        stats.record(
            &BroadcastOutcome::aborted(Stage::TranslationQa, "too short"),
            Duration::from_millis(200),
        );

        let s = stats.snapshot();
        assert_eq!(s.runs, 3);
        assert_eq!(s.delivered, 1);
        assert_eq!(s.failed, 2);
        assert_eq!(s.failures_by_stage.get("translation-qa"), Some(&2));
        assert!((s.avg_latency_ms - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_snapshot() {
        let s = BroadcastStats::default().snapshot();
        assert_eq!(s.runs, 0);
        assert_eq!(s.avg_latency_ms, 0.0);
    }
}
