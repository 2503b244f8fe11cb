//! Per-rule evaluation: condition fold, score blending and action execution.
//!
//! A rule is evaluated in three steps:
//! - **Conditions**: folded left to right by [`ConditionEvaluator`].
//! - **Blend**: the boolean match is blended with the precomputed signal
//!   confidence using the rule's `signalWeight`.
//! - **Actions**: executed in order by [`ActionExecutor`] when the rule
//!   matched and the blended score exceeds 0.5.
//!
//! Failures never escape a rule; they are recorded on its
//! [`EvaluationResult`].

mod actions;
mod conditions;

use std::future::Future;
use std::time::{Duration, Instant as StdInstant};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use ruleweave_core::Context;

use crate::error::{EngineError, RuleFailure};
use crate::injector::InjectorError;
use crate::schema::{Action, Rule};
use crate::signal::Signal;

pub use actions::{ActionEffect, ActionExecutor};
pub use conditions::{ConditionEvaluator, FoldOutcome};

/// Blended score above which a matched rule's actions run.
pub const ACTION_THRESHOLD: f64 = 0.5;

// ── Call budget ─────────────────────────────────────────────────────

/// Time bounds applied to every external capability call in one pass.
#[derive(Debug, Clone, Copy)]
pub struct CallBudget {
    per_call: Duration,
    deadline: Option<Instant>,
}

impl CallBudget {
    pub fn new(per_call: Duration, deadline: Option<Instant>) -> Self {
        Self { per_call, deadline }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Await `call`, giving up at `min(now + per_call, deadline)`.
    pub async fn run<T, F>(&self, call: F) -> Result<T, InjectorError>
    where
        F: Future<Output = Result<T, InjectorError>>,
    {
        let started = Instant::now();
        let mut limit = started + self.per_call;
        if let Some(deadline) = self.deadline {
            limit = limit.min(deadline);
        }
        match tokio::time::timeout_at(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(InjectorError::Timeout(limit.saturating_duration_since(started))),
        }
    }
}

// ── Evaluation result ───────────────────────────────────────────────

/// Outcome of evaluating one rule in one pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub rule_id: String,
    pub matched: bool,
    /// Boolean match blended with the signal confidence.
    pub score: f64,
    /// Raw confidence from the scoring phase.
    pub confidence: f64,
    pub executed_actions: Vec<Action>,
    /// Actions skipped because a higher-priority rule already wrote their target.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suppressed_actions: Vec<Action>,
    #[serde(with = "duration_ms")]
    pub processing_time: Duration,
    /// Per-feature signal vector from the scoring phase.
    pub activation: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RuleFailure>,
}

impl EvaluationResult {
    fn pending(rule_id: &str, signal: &Signal) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            matched: false,
            score: 0.0,
            confidence: signal.confidence,
            executed_actions: Vec::new(),
            suppressed_actions: Vec::new(),
            processing_time: Duration::ZERO,
            activation: signal.activation.clone(),
            error: None,
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    fn record_failure(&mut self, failure: RuleFailure) {
        if self.error.is_none() {
            self.error = Some(failure);
        }
    }
}

/// Blend the boolean match with the learned confidence.
///
/// `score = matched ? 1 : 0`; with a weight `w`,
/// `score = score * (1 - w) + confidence * w`.
pub fn blend_score(matched: bool, confidence: f64, signal_weight: Option<f64>) -> f64 {
    let base = if matched { 1.0 } else { 0.0 };
    match signal_weight {
        Some(w) => {
            let w = w.clamp(0.0, 1.0);
            base * (1.0 - w) + confidence * w
        }
        None => base,
    }
}

// ── Target claims ───────────────────────────────────────────────────

/// Targets written so far in a pass, with the rule that wrote them.
#[derive(Debug, Default)]
pub struct TargetClaims {
    claims: Vec<(String, String)>,
}

impl TargetClaims {
    /// The rule holding a claim overlapping `target`, other than `rule_id`.
    pub fn owner_other_than(&self, target: &str, rule_id: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|(claimed, owner)| owner != rule_id && paths_overlap(claimed, target))
            .map(|(_, owner)| owner.as_str())
    }

    pub fn claim(&mut self, target: &str, rule_id: &str) {
        if !self.claims.iter().any(|(t, o)| t == target && o == rule_id) {
            self.claims.push((target.to_string(), rule_id.to_string()));
        }
    }

    /// Drop every claim held by `rule_id`.
    pub fn release(&mut self, rule_id: &str) {
        self.claims.retain(|(_, owner)| owner != rule_id);
    }
}

/// Two dot paths overlap when equal or when one is a parent of the other.
fn paths_overlap(a: &str, b: &str) -> bool {
    let is_prefix = |p: &str, q: &str| q.len() > p.len() && q.starts_with(p) && q.as_bytes()[p.len()] == b'.';
    a == b || is_prefix(a, b) || is_prefix(b, a)
}

// ── Rule evaluator ──────────────────────────────────────────────────

/// Everything one rule evaluation produced.
#[derive(Debug)]
pub struct RuleEvaluation {
    pub result: EvaluationResult,
    /// `functionName`s of triggers that fired, in order.
    pub triggers: Vec<String>,
}

/// Evaluates a single rule against a mutable context.
pub struct RuleEvaluator {
    pub conditions: ConditionEvaluator,
    pub actions: ActionExecutor,
}

impl RuleEvaluator {
    pub fn new(conditions: ConditionEvaluator, actions: ActionExecutor) -> Self {
        Self { conditions, actions }
    }

    /// Evaluate `rule` with its precomputed `signal`.
    ///
    /// When `claims` is given, actions whose target overlaps one already
    /// written by another rule in this pass are suppressed.
    pub async fn evaluate_rule(
        &self,
        rule: &Rule,
        signal: &Signal,
        context: &mut Context,
        budget: &CallBudget,
        mut claims: Option<&mut TargetClaims>,
    ) -> RuleEvaluation {
        let started = StdInstant::now();
        let mut result = EvaluationResult::pending(&rule.id, signal);
        let mut triggers = Vec::new();

        match self.conditions.fold(&rule.id, &rule.conditions, context, budget).await {
            Ok(outcome) => {
                result.matched = outcome.matched;
                for failure in outcome.failures {
                    result.record_failure(failure);
                }
            }
            Err(e) => {
                warn!(rule_id = %rule.id, error = %e, "condition evaluation aborted");
                result.record_failure(RuleFailure::from(&e));
            }
        }

        result.score = blend_score(result.matched, signal.confidence, rule.signal_weight());

        if result.matched && result.score > ACTION_THRESHOLD {
            // Restored if an action aborts the rule.
            let before = context.clone();
            for action in &rule.actions {
                if let (Some(claims), Some(target)) = (claims.as_deref(), action.target()) {
                    if let Some(owner) = claims.owner_other_than(target, &rule.id) {
                        debug!(rule_id = %rule.id, target = %target, owner = %owner, "action suppressed by higher-priority rule");
                        result.suppressed_actions.push(action.clone());
                        continue;
                    }
                }

                match self.actions.execute(action, context, budget).await {
                    Ok(effect) => {
                        match effect {
                            ActionEffect::Wrote(target) => {
                                if let Some(claims) = claims.as_deref_mut() {
                                    claims.claim(&target, &rule.id);
                                }
                            }
                            ActionEffect::Triggered { function_name } => triggers.push(function_name),
                            ActionEffect::Unchanged => {}
                        }
                        result.executed_actions.push(action.clone());
                    }
                    Err(e @ EngineError::NotImplemented(_)) => {
                        warn!(rule_id = %rule.id, kind = %action.kind(), error = %e, "action skipped");
                        result.record_failure(RuleFailure::from(&e));
                    }
                    Err(e) => {
                        warn!(rule_id = %rule.id, kind = %action.kind(), error = %e, "action failed, abandoning rule");
                        result.record_failure(RuleFailure::from(&e));
                        result.matched = false;
                        result.score = blend_score(false, signal.confidence, rule.signal_weight());
                        result.executed_actions.clear();
                        triggers.clear();
                        if let Some(claims) = claims.as_deref_mut() {
                            claims.release(&rule.id);
                        }
                        *context = before;
                        break;
                    }
                }
            }
        }

        result.processing_time = started.elapsed();
        debug!(
            rule_id = %rule.id,
            matched = result.matched,
            score = result.score,
            actions = result.executed_actions.len(),
            "rule evaluated"
        );

        RuleEvaluation { result, triggers }
    }
}

// ── Serde helpers ───────────────────────────────────────────────────

/// (De)serialize a [`Duration`] as fractional milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_nanos() as f64 / 1_000_000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(d)?;
        Ok(Duration::from_nanos((ms.max(0.0) * 1_000_000.0).round() as u64))
    }
}

#[cfg(test)]
mod tests;
