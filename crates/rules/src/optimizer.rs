//! History-driven priority and signal-weight optimization.
//!
//! For every rule with history:
//!
//! ```text
//! successRate = matches / evaluations
//! efficiency  = min(1 / avgSeconds, MAX_EFFICIENCY)
//! priority    = round(successRate * 50 + efficiency * 50)
//! weight      = (1 - successRate) * (1 - min(efficiency / 10, 1) * 0.3)
//! ```

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::evaluator::{duration_ms, EvaluationResult};

/// Ceiling for `1 / avgSeconds`; also used when the average is zero.
pub const MAX_EFFICIENCY: f64 = 10.0;

/// Aggregated history of one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleStats {
    pub rule_id: String,
    pub evaluations: u64,
    pub matches: u64,
    pub success_rate: f64,
    #[serde(with = "duration_ms")]
    pub average_processing_time: Duration,
    pub efficiency: f64,
}

/// One applied change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Optimization {
    pub rule_id: String,
    pub old_priority: i64,
    pub new_priority: i64,
    pub signal_weight: f64,
    pub stats: RuleStats,
}

pub struct HistoryOptimizer;

impl HistoryOptimizer {
    /// Group `history` by rule id, in first-seen order.
    pub fn stats<'a>(history: impl IntoIterator<Item = &'a EvaluationResult>) -> Vec<RuleStats> {
        let mut groups: IndexMap<&str, (u64, u64, Duration)> = IndexMap::new();
        for result in history {
            let entry = groups
                .entry(result.rule_id.as_str())
                .or_insert((0, 0, Duration::ZERO));
            entry.0 += 1;
            if result.matched {
                entry.1 += 1;
            }
            entry.2 += result.processing_time;
        }

        groups
            .into_iter()
            .map(|(rule_id, (evaluations, matches, total))| {
                let nanos = total.as_nanos() / evaluations as u128;
                let average = Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX));
                RuleStats {
                    rule_id: rule_id.to_string(),
                    evaluations,
                    matches,
                    success_rate: matches as f64 / evaluations as f64,
                    average_processing_time: average,
                    efficiency: Self::efficiency(average),
                }
            })
            .collect()
    }

    pub fn efficiency(average: Duration) -> f64 {
        let secs = average.as_secs_f64();
        if secs <= 0.0 {
            MAX_EFFICIENCY
        } else {
            (1.0 / secs).min(MAX_EFFICIENCY)
        }
    }

    /// New `(priority, signalWeight)` for a rule.
    pub fn plan(stats: &RuleStats) -> (i64, f64) {
        let priority = (stats.success_rate * 50.0 + stats.efficiency * 50.0).round() as i64;
        let speed = (stats.efficiency / 10.0).min(1.0);
        let weight = (1.0 - stats.success_rate) * (1.0 - speed * 0.3);
        (priority, weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, matched: bool, ms: u64) -> EvaluationResult {
        EvaluationResult {
            rule_id: id.into(),
            matched,
            score: if matched { 1.0 } else { 0.0 },
            confidence: 0.0,
            executed_actions: vec![],
            suppressed_actions: vec![],
            processing_time: Duration::from_millis(ms),
            activation: vec![],
            error: None,
        }
    }

    #[test]
    fn groups_by_rule_in_first_seen_order() {
        let history = vec![
            result("b", true, 100),
            result("a", false, 300),
            result("b", false, 300),
        ];
        let stats = HistoryOptimizer::stats(&history);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].rule_id, "b");
        assert_eq!(stats[0].evaluations, 2);
        assert_eq!(stats[0].success_rate, 0.5);
        assert_eq!(stats[0].average_processing_time, Duration::from_millis(200));
        assert_eq!(stats[1].rule_id, "a");
        assert_eq!(stats[1].success_rate, 0.0);
    }

    #[test]
    fn average_divides_in_nanoseconds() {
        let history = vec![result("a", true, 100), result("a", true, 100), result("a", true, 101)];
        let stats = HistoryOptimizer::stats(&history);
        assert_eq!(stats[0].average_processing_time, Duration::from_nanos(100_333_333));
    }

    #[test]
    fn efficiency_is_capped() {
        assert_eq!(HistoryOptimizer::efficiency(Duration::ZERO), MAX_EFFICIENCY);
        assert_eq!(HistoryOptimizer::efficiency(Duration::from_micros(10)), MAX_EFFICIENCY);
        assert_eq!(HistoryOptimizer::efficiency(Duration::from_millis(500)), 2.0);
    }

    #[test]
    fn plan_follows_formula() {
        let stats = HistoryOptimizer::stats(&[result("r", true, 500), result("r", false, 500)]);
        let (priority, weight) = HistoryOptimizer::plan(&stats[0]);
        // 0.5 * 50 + 2 * 50
        assert_eq!(priority, 125);
        // 0.5 * (1 - 0.2 * 0.3)
        assert!((weight - 0.47).abs() < 1e-9);
    }

    #[test]
    fn always_matching_fast_rule_gets_zero_weight() {
        let stats = HistoryOptimizer::stats(&[result("r", true, 0)]);
        let (priority, weight) = HistoryOptimizer::plan(&stats[0]);
        assert_eq!(priority, 550);
        assert_eq!(weight, 0.0);
    }
}
