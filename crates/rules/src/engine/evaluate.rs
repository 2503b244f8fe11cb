//! The evaluation pass: enrich, score, walk, record, predict.

use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use ruleweave_core::{deep_merge, Context};

use crate::evaluator::{CallBudget, EvaluationResult, TargetClaims};
use crate::events::EngineEvent;
use crate::metrics::{rule_stage, EVALUATE_STAGE};
use crate::predict::{predict, Prediction};
use crate::schema::{ConflictPolicy, Rule};
use crate::signal::Signal;

use super::RuleEngine;

/// Per-call evaluation settings.
#[derive(Debug, Clone, Default)]
pub struct EvaluateOptions {
    /// Deadline for the whole pass, relative to the call. Falls back to the
    /// configured evaluation timeout.
    pub timeout: Option<Duration>,
}

impl EvaluateOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

/// Everything one evaluation pass produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub evaluation_id: Uuid,
    /// One result per loaded rule, in evaluation order.
    pub results: Vec<EvaluationResult>,
    /// The enriched context after all actions ran.
    pub context: Context,
    pub predictions: Vec<Prediction>,
}

impl RuleEngine {
    /// Evaluate every loaded rule against `context`.
    ///
    /// Never fails: per-rule failures are recorded on the results.
    pub async fn evaluate(&self, context: Context) -> Vec<EvaluationResult> {
        self.evaluate_with(context, EvaluateOptions::default())
            .await
            .results
    }

    pub async fn evaluate_with(&self, context: Context, options: EvaluateOptions) -> Evaluation {
        let started = Instant::now();
        let evaluation_id = Uuid::new_v4();
        let timeout = options.timeout.or_else(|| self.config.evaluation_timeout());
        let budget = CallBudget::new(
            self.config.external_timeout(),
            timeout.map(|t| tokio::time::Instant::now() + t),
        );

        let mut context = self.enrich(context, &budget).await;
        let rules = Arc::new(self.store.sorted());
        let signals = self.score(Arc::clone(&rules), &context).await;

        let mut claims = match self.store.conflict_policy() {
            ConflictPolicy::AllowAll => None,
            ConflictPolicy::PriorityWins => Some(TargetClaims::default()),
        };

        let mut results = Vec::with_capacity(rules.len());
        for (rule, signal) in rules.iter().zip(&signals) {
            let eval = self
                .evaluator
                .evaluate_rule(rule, signal, &mut context, &budget, claims.as_mut())
                .await;

            self.record_metric(&rule_stage(&rule.id), !eval.result.has_error(), eval.result.processing_time);
            for function_name in eval.triggers {
                debug!(rule_id = %rule.id, function = %function_name, "action trigger");
                self.events.emit(EngineEvent::ActionTrigger {
                    evaluation_id,
                    rule_id: rule.id.clone(),
                    function_name,
                    context: context.clone(),
                });
            }
            results.push(eval.result);
        }

        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(results.iter().cloned());

        let matched: Vec<&str> = results
            .iter()
            .filter(|r| r.matched)
            .map(|r| r.rule_id.as_str())
            .collect();
        if !matched.is_empty() {
            self.with_model_mut(|model| {
                for id in &matched {
                    model.record_usage(id);
                }
            });
        }

        let failed = results.iter().filter(|r| r.has_error()).count();
        let elapsed = started.elapsed();
        self.record_metric(EVALUATE_STAGE, failed == 0, elapsed);
        info!(
            evaluation_id = %evaluation_id,
            rules = results.len(),
            matched = matched.len(),
            failed,
            elapsed_ms = elapsed.as_millis() as u64,
            "evaluation complete"
        );

        self.events.emit(EngineEvent::EvaluationComplete {
            evaluation_id,
            results: results.clone(),
            context: context.clone(),
            total_time_ms: elapsed.as_secs_f64() * 1000.0,
        });

        let predictions = self.preload(&context, &results, &budget).await;

        Evaluation {
            evaluation_id,
            results,
            context,
            predictions,
        }
    }

    /// Rank trained rules by similarity to the given pass. Returns at most
    /// five ids, best first.
    pub fn predict_next_rules(&self, context: &Context, results: &[EvaluationResult]) -> Vec<String> {
        self.predictions(context, results)
            .into_iter()
            .map(|p| p.rule_id)
            .collect()
    }

    fn predictions(&self, context: &Context, results: &[EvaluationResult]) -> Vec<Prediction> {
        let threshold = self.store.neural().activation_threshold;
        predict(&self.model(), context, results, threshold)
    }

    /// Merge the global context through the injector, falling back to a
    /// plain merge when the injector fails.
    async fn enrich(&self, context: Context, budget: &CallBudget) -> Context {
        let global = self.store.global_context();
        match budget.run(self.injector.inject(context.clone(), &global)).await {
            Ok(enriched) => enriched,
            Err(e) => {
                warn!(error = %e, "context injection failed, using global context merge");
                self.events.emit(EngineEvent::Error {
                    kind: "inject".to_string(),
                    message: e.to_string(),
                });
                let mut merged = global;
                deep_merge(&mut merged, &context);
                merged
            }
        }
    }

    /// Parallel scoring phase on the worker pool. Output order matches `rules`.
    async fn score(&self, rules: Arc<Vec<Rule>>, context: &Context) -> Vec<Signal> {
        if rules.is_empty() {
            return Vec::new();
        }
        let pool = self.pool_snapshot();
        let model = self.model();
        let snapshot = context.clone();
        let count = rules.len();

        match tokio::task::spawn_blocking(move || pool.score(&model, &rules, &snapshot)).await {
            Ok(signals) => signals,
            Err(e) => {
                warn!(error = %e, "scoring task failed, using neutral signals");
                vec![Signal::default(); count]
            }
        }
    }

    /// Predict the next rules and warm them up through the injector.
    async fn preload(
        &self,
        context: &Context,
        results: &[EvaluationResult],
        budget: &CallBudget,
    ) -> Vec<Prediction> {
        let predictions = self.predictions(context, results);

        for prediction in &predictions {
            let Ok(rule) = self.store.get(&prediction.rule_id) else {
                continue;
            };
            if let Err(e) = budget.run(self.injector.precompile(&rule)).await {
                warn!(rule_id = %rule.id, error = %e, "precompile failed");
            }
        }

        *self
            .last_prediction
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = predictions.clone();
        predictions
    }
}
