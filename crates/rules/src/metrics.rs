//! Per-stage evaluation metrics.
//!
//! The engine reports every rule evaluation (stage = rule id) and every
//! `evaluate` call (stage `evaluate`) to a [`MetricsSink`]. [`StageMetrics`]
//! is the in-memory sink behind `get_metrics`: counters, an incremental mean
//! latency, and p95/p99 over a rolling window of recent samples.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::evaluator::duration_ms;
use crate::history::RingBuffer;

/// Stage name used for whole-pass measurements.
pub const EVALUATE_STAGE: &str = "evaluate";

/// Stage name for one rule's measurements, kept apart from [`EVALUATE_STAGE`]
/// whatever the rule id.
pub fn rule_stage(rule_id: &str) -> String {
    format!("rule:{rule_id}")
}

/// Receiver for per-stage measurements.
pub trait MetricsSink: Send + Sync {
    fn record_stage_metric(&self, stage: &str, success: bool, latency: Duration);
}

/// Aggregated view of one stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageMetric {
    pub invocations: u64,
    pub successes: u64,
    pub failures: u64,
    #[serde(with = "duration_ms")]
    pub average_latency: Duration,
    #[serde(with = "duration_ms")]
    pub p95_latency: Duration,
    #[serde(with = "duration_ms")]
    pub p99_latency: Duration,
}

#[derive(Debug)]
struct StageStats {
    invocations: u64,
    successes: u64,
    failures: u64,
    average: Duration,
    recent: RingBuffer<Duration>,
}

impl StageStats {
    fn new(window: usize) -> Self {
        Self {
            invocations: 0,
            successes: 0,
            failures: 0,
            average: Duration::ZERO,
            recent: RingBuffer::new(window),
        }
    }

    fn record(&mut self, success: bool, latency: Duration) {
        self.invocations += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }

        // Incremental mean: avg += (x - avg) / n
        self.average = if self.invocations == 1 {
            latency
        } else {
            let prev = self.average.as_nanos() as f64;
            let cur = latency.as_nanos() as f64;
            Duration::from_nanos((prev + (cur - prev) / self.invocations as f64) as u64)
        };
        self.recent.push(latency);
    }

    fn snapshot(&self) -> StageMetric {
        let mut sorted: Vec<Duration> = self.recent.iter().copied().collect();
        sorted.sort_unstable();
        StageMetric {
            invocations: self.invocations,
            successes: self.successes,
            failures: self.failures,
            average_latency: self.average,
            p95_latency: percentile(&sorted, 95.0),
            p99_latency: percentile(&sorted, 99.0),
        }
    }
}

/// Nearest-rank percentile of an ascending slice.
fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = (p * sorted.len() as f64 / 100.0).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// In-memory [`MetricsSink`] keyed by stage name.
#[derive(Debug)]
pub struct StageMetrics {
    window: usize,
    stages: Mutex<HashMap<String, StageStats>>,
}

impl StageMetrics {
    /// `window` bounds the samples kept per stage for percentiles.
    pub fn new(window: usize) -> Self {
        Self {
            window,
            stages: Mutex::new(HashMap::new()),
        }
    }

    pub fn stage(&self, name: &str) -> Option<StageMetric> {
        self.stages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(StageStats::snapshot)
    }

    /// All stages, sorted by name.
    pub fn snapshot(&self) -> BTreeMap<String, StageMetric> {
        self.stages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, stats)| (name.clone(), stats.snapshot()))
            .collect()
    }

    pub fn reset(&self) {
        self.stages.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl MetricsSink for StageMetrics {
    fn record_stage_metric(&self, stage: &str, success: bool, latency: Duration) {
        let mut stages = self.stages.lock().unwrap_or_else(PoisonError::into_inner);
        stages
            .entry(stage.to_string())
            .or_insert_with(|| StageStats::new(self.window))
            .record(success, latency);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_average() {
        let m = StageMetrics::new(16);
        m.record_stage_metric("r1", true, Duration::from_millis(100));
        m.record_stage_metric("r1", false, Duration::from_millis(200));
        let s = m.stage("r1").unwrap();
        assert_eq!(s.invocations, 2);
        assert_eq!(s.successes, 1);
        assert_eq!(s.failures, 1);
        let avg = s.average_latency.as_millis();
        assert!((149..=151).contains(&avg), "expected ~150ms, got {avg}ms");
        assert!(m.stage("missing").is_none());
    }

    #[test]
    fn rule_stages_never_collide_with_pass_stage() {
        assert_eq!(rule_stage("r10"), "rule:r10");
        assert_ne!(rule_stage(EVALUATE_STAGE), EVALUATE_STAGE);
    }

    #[test]
    fn percentiles_use_nearest_rank() {
        let m = StageMetrics::new(1000);
        for ms in 1..=100 {
            m.record_stage_metric(EVALUATE_STAGE, true, Duration::from_millis(ms));
        }
        let s = m.stage(EVALUATE_STAGE).unwrap();
        assert_eq!(s.p95_latency, Duration::from_millis(95));
        assert_eq!(s.p99_latency, Duration::from_millis(99));
    }

    #[test]
    fn window_bounds_percentile_samples() {
        let m = StageMetrics::new(2);
        m.record_stage_metric("s", true, Duration::from_secs(10));
        m.record_stage_metric("s", true, Duration::from_millis(1));
        m.record_stage_metric("s", true, Duration::from_millis(2));
        let s = m.stage("s").unwrap();
        assert_eq!(s.invocations, 3);
        assert_eq!(s.p99_latency, Duration::from_millis(2));
    }

    #[test]
    fn serializes_camel_case_millis() {
        let m = StageMetrics::new(4);
        m.record_stage_metric("s", true, Duration::from_millis(5));
        let v = serde_json::to_value(m.snapshot()).unwrap();
        assert_eq!(v["s"]["invocations"], 1);
        assert_eq!(v["s"]["averageLatency"], 5.0);
        assert!(v["s"].get("p95Latency").is_some());
    }
}
