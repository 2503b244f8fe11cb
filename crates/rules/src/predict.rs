//! Predictive preload: rank trained rules by similarity to the last pass.
//!
//! `rank = similarity * 0.7 + (usage / maxUsage) * 0.3`, keeping ranks
//! strictly above the activation threshold, best first, at most
//! [`MAX_PREDICTIONS`].

use serde::{Deserialize, Serialize};

use ruleweave_core::Context;

use crate::evaluator::EvaluationResult;
use crate::signal::{cosine_similarity, PatternExtractor, SignalModel};

pub const MAX_PREDICTIONS: usize = 5;

const SIMILARITY_WEIGHT: f64 = 0.7;
const USAGE_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub rule_id: String,
    pub similarity: f64,
    pub usage: u64,
    pub rank: f64,
}

pub fn predict(
    model: &SignalModel,
    context: &Context,
    results: &[EvaluationResult],
    threshold: f64,
) -> Vec<Prediction> {
    let current = PatternExtractor::context_pattern(context, results);
    let max_usage = model.usage_map().values().copied().max().unwrap_or(0);

    let mut ranked: Vec<Prediction> = model
        .patterns()
        .iter()
        .map(|(rule_id, pattern)| {
            let similarity = cosine_similarity(&current, pattern);
            let usage = model.usage(rule_id);
            let usage_term = if max_usage == 0 {
                0.0
            } else {
                usage as f64 / max_usage as f64
            };
            Prediction {
                rule_id: rule_id.clone(),
                similarity,
                usage,
                rank: similarity * SIMILARITY_WEIGHT + usage_term * USAGE_WEIGHT,
            }
        })
        .filter(|p| p.rank > threshold)
        .collect();

    ranked.sort_by(|a, b| b.rank.total_cmp(&a.rank));
    ranked.truncate(MAX_PREDICTIONS);
    ranked
}
