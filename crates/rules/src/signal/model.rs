//! Learned relevance signal: a single-layer logistic model over rule patterns.
//!
//! Scoring is a pure function of the model, the rule and the context, so it
//! can run on any worker. Training mutates the model and is only called
//! from the engine's write paths (load, update).

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ruleweave_core::Context;

use crate::schema::{NeuralConfig, Rule};

use super::pattern::{PatternExtractor, PATTERN_DIM};

const LEARNING_RATE: f64 = 0.1;

/// Output of the scoring phase for one rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Learned relevance in `[0, 1]`.
    pub confidence: f64,
    /// Per-feature contribution `pattern ⊙ weights`.
    pub activation: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct SignalModel {
    weights: Vec<f64>,
    bias: f64,
    layer_depth: usize,
    learning_enabled: bool,
    /// Trained rule patterns, in first-trained order.
    patterns: IndexMap<String, Vec<f64>>,
    /// Match counts per rule id.
    usage: HashMap<String, u64>,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl SignalModel {
    pub fn new(config: &NeuralConfig) -> Self {
        Self {
            weights: vec![0.0; PATTERN_DIM],
            bias: 0.0,
            layer_depth: config.layer_depth,
            learning_enabled: config.learning_enabled,
            patterns: IndexMap::new(),
            usage: HashMap::new(),
        }
    }

    pub fn learning_enabled(&self) -> bool {
        self.learning_enabled
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    fn forward(&self, pattern: &[f64]) -> f64 {
        let z: f64 = pattern
            .iter()
            .zip(&self.weights)
            .map(|(p, w)| p * w)
            .sum::<f64>()
            + self.bias;
        sigmoid(z)
    }

    /// Score `rule` against `context`.
    ///
    /// `confidence = σ(w·p + b) × (0.5 + 0.5 × fieldCoverage)`.
    pub fn score(&self, rule: &Rule, context: &Context) -> Signal {
        let pattern = PatternExtractor::rule_pattern(rule);
        let coverage = PatternExtractor::field_coverage(rule, context);
        let confidence = self.forward(&pattern) * (0.5 + 0.5 * coverage);
        let activation = pattern
            .iter()
            .zip(&self.weights)
            .map(|(p, w)| p * w)
            .collect();

        Signal {
            confidence: confidence.clamp(0.0, 1.0),
            activation,
        }
    }

    /// Record the rule's pattern and pull its output toward
    /// `targetPriority / 100` for `layerDepth` delta-rule steps.
    ///
    /// Returns `false` without touching the model when learning is disabled.
    pub fn train(&mut self, rule: &Rule, target_priority: f64) -> bool {
        if !self.learning_enabled {
            return false;
        }

        let pattern = PatternExtractor::rule_pattern(rule);
        let target = (target_priority / 100.0).clamp(0.0, 1.0);

        for _ in 0..self.layer_depth {
            let y = self.forward(&pattern);
            let delta = (target - y) * y * (1.0 - y);
            for (w, p) in self.weights.iter_mut().zip(&pattern) {
                *w += LEARNING_RATE * delta * p;
            }
            self.bias += LEARNING_RATE * delta;
        }

        debug!(rule_id = %rule.id, target, steps = self.layer_depth, "signal model trained");
        self.patterns.insert(rule.id.clone(), pattern);
        true
    }

    pub fn patterns(&self) -> &IndexMap<String, Vec<f64>> {
        &self.patterns
    }

    pub fn record_usage(&mut self, rule_id: &str) {
        *self.usage.entry(rule_id.to_string()).or_insert(0) += 1;
    }

    pub fn usage(&self, rule_id: &str) -> u64 {
        self.usage.get(rule_id).copied().unwrap_or(0)
    }

    pub fn usage_map(&self) -> &HashMap<String, u64> {
        &self.usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Condition, ConditionTest};
    use serde_json::json;

    fn learning() -> NeuralConfig {
        NeuralConfig {
            learning_enabled: true,
            ..NeuralConfig::default()
        }
    }

    fn rule(priority: i64) -> Rule {
        Rule::new("r", priority)
            .with_condition(Condition::new("a", ConditionTest::Equals { value: json!(1) }))
    }

    #[test]
    fn untrained_model_is_neutral() {
        let model = SignalModel::new(&NeuralConfig::default());
        let mut ctx = Context::new();
        ctx.insert("a".into(), json!(1));

        let signal = model.score(&rule(10), &ctx);
        assert_eq!(signal.confidence, 0.5);
        assert_eq!(signal.activation, vec![0.0; PATTERN_DIM]);

        // missing field halves the coverage term
        let signal = model.score(&rule(10), &Context::new());
        assert_eq!(signal.confidence, 0.25);
    }

    #[test]
    fn training_disabled_is_noop() {
        let mut model = SignalModel::new(&NeuralConfig::default());
        assert!(!model.train(&rule(90), 90.0));
        assert!(model.patterns().is_empty());
        assert_eq!(model.weights(), &[0.0; PATTERN_DIM][..]);
    }

    #[test]
    fn training_moves_toward_target() {
        let mut model = SignalModel::new(&learning());
        let ctx = Context::new();
        let high = rule(90);
        let before = model.score(&high, &ctx).confidence;
        assert!(model.train(&high, 100.0));
        let after = model.score(&high, &ctx).confidence;
        assert!(after > before);
        assert!(model.patterns().contains_key("r"));

        let mut model = SignalModel::new(&learning());
        model.train(&high, 0.0);
        assert!(model.score(&high, &ctx).confidence < before);
    }

    #[test]
    fn layer_depth_scales_steps() {
        let shallow = NeuralConfig { layer_depth: 1, ..learning() };
        let deep = NeuralConfig { layer_depth: 10, ..learning() };
        let mut a = SignalModel::new(&shallow);
        let mut b = SignalModel::new(&deep);
        a.train(&rule(90), 100.0);
        b.train(&rule(90), 100.0);
        assert!(b.bias() > a.bias());
    }

    #[test]
    fn usage_counts() {
        let mut model = SignalModel::new(&NeuralConfig::default());
        model.record_usage("x");
        model.record_usage("x");
        assert_eq!(model.usage("x"), 2);
        assert_eq!(model.usage("y"), 0);
    }
}
