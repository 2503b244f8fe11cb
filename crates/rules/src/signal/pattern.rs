//! Fixed-length numeric patterns for rules and evaluation contexts.
//!
//! Rule pattern layout (all features in `[0, 1]`):
//!
//! | index | feature |
//! |---|---|
//! | 0 | priority / 100 |
//! | 1 | condition count / 10 |
//! | 2 | action count / 10 |
//! | 3..8 | share of conditions per type (equals, contains, regex, llm_evaluate, custom) |
//!
//! Context patterns fill the first four slots with key count, match rate,
//! average processing time and average score, and pad the rest with zeros
//! so both kinds compare under cosine similarity.

use ruleweave_core::{get_path, Context};

use crate::evaluator::EvaluationResult;
use crate::schema::{ConditionKind, Rule};

/// Length of every pattern vector.
pub const PATTERN_DIM: usize = 3 + ConditionKind::ALL.len();

const PRIORITY_SCALE: f64 = 100.0;
const COUNT_SCALE: f64 = 10.0;
const KEY_SCALE: f64 = 100.0;
const LATENCY_SCALE_MS: f64 = 1000.0;

fn unit(value: f64, scale: f64) -> f64 {
    (value / scale).clamp(0.0, 1.0)
}

pub struct PatternExtractor;

impl PatternExtractor {
    /// Structural pattern of a rule.
    pub fn rule_pattern(rule: &Rule) -> Vec<f64> {
        let mut pattern = vec![0.0; PATTERN_DIM];
        pattern[0] = unit(rule.priority as f64, PRIORITY_SCALE);
        pattern[1] = unit(rule.conditions.len() as f64, COUNT_SCALE);
        pattern[2] = unit(rule.actions.len() as f64, COUNT_SCALE);

        if !rule.conditions.is_empty() {
            let share = 1.0 / rule.conditions.len() as f64;
            for condition in &rule.conditions {
                pattern[3 + condition.kind().index()] += share;
            }
        }
        pattern
    }

    /// Pattern of an evaluation pass, padded to [`PATTERN_DIM`].
    pub fn context_pattern(context: &Context, results: &[EvaluationResult]) -> Vec<f64> {
        let mut pattern = vec![0.0; PATTERN_DIM];
        pattern[0] = unit(context.len() as f64, KEY_SCALE);

        if !results.is_empty() {
            let n = results.len() as f64;
            let matched = results.iter().filter(|r| r.matched).count() as f64;
            let total_ms: f64 = results
                .iter()
                .map(|r| r.processing_time.as_secs_f64() * 1000.0)
                .sum();
            let total_score: f64 = results.iter().map(|r| r.score).sum();

            pattern[1] = matched / n;
            pattern[2] = unit(total_ms / n, LATENCY_SCALE_MS);
            pattern[3] = (total_score / n).clamp(0.0, 1.0);
        }
        pattern
    }

    /// Fraction of the rule's condition fields present in `context`.
    ///
    /// A rule without conditions has full coverage.
    pub fn field_coverage(rule: &Rule, context: &Context) -> f64 {
        if rule.conditions.is_empty() {
            return 1.0;
        }
        let present = rule
            .conditions
            .iter()
            .filter(|c| get_path(context, &c.field).is_some())
            .count();
        present as f64 / rule.conditions.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Action, Condition, ConditionTest};
    use serde_json::json;
    use std::time::Duration;

    fn rule() -> Rule {
        Rule::new("r", 50)
            .with_condition(Condition::new("a", ConditionTest::Equals { value: json!(1) }))
            .with_condition(Condition::new("b.c", ConditionTest::Regex { value: "x".into() }))
            .with_action(Action::Set { target: "t".into(), value: json!(true) })
    }

    #[test]
    fn rule_pattern_layout() {
        let p = PatternExtractor::rule_pattern(&rule());
        assert_eq!(p.len(), PATTERN_DIM);
        assert_eq!(p[0], 0.5);
        assert_eq!(p[1], 0.2);
        assert_eq!(p[2], 0.1);
        assert_eq!(p[3 + ConditionKind::Equals.index()], 0.5);
        assert_eq!(p[3 + ConditionKind::Regex.index()], 0.5);
        assert_eq!(p[3 + ConditionKind::Custom.index()], 0.0);
    }

    #[test]
    fn priority_is_clamped() {
        assert_eq!(PatternExtractor::rule_pattern(&Rule::new("hi", 900))[0], 1.0);
        assert_eq!(PatternExtractor::rule_pattern(&Rule::new("lo", -5))[0], 0.0);
    }

    #[test]
    fn context_pattern_is_padded() {
        let mut ctx = Context::new();
        ctx.insert("k".into(), json!(1));
        let results = vec![
            EvaluationResult {
                rule_id: "a".into(),
                matched: true,
                score: 1.0,
                confidence: 0.0,
                executed_actions: vec![],
                suppressed_actions: vec![],
                processing_time: Duration::from_millis(100),
                activation: vec![],
                error: None,
            },
            EvaluationResult {
                rule_id: "b".into(),
                matched: false,
                score: 0.0,
                confidence: 0.0,
                executed_actions: vec![],
                suppressed_actions: vec![],
                processing_time: Duration::from_millis(300),
                activation: vec![],
                error: None,
            },
        ];
        let p = PatternExtractor::context_pattern(&ctx, &results);
        assert_eq!(p.len(), PATTERN_DIM);
        assert_eq!(p[0], 0.01);
        assert_eq!(p[1], 0.5);
        assert!((p[2] - 0.2).abs() < 1e-9);
        assert_eq!(p[3], 0.5);
        assert!(p[4..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn coverage_counts_present_fields() {
        let mut ctx = Context::new();
        ctx.insert("a".into(), json!(1));
        assert_eq!(PatternExtractor::field_coverage(&rule(), &ctx), 0.5);
        assert_eq!(PatternExtractor::field_coverage(&Rule::new("e", 0), &ctx), 1.0);
    }
}
