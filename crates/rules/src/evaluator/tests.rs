use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use ruleweave_core::Context;

use super::*;
use crate::error::FailureKind;
use crate::injector::{ContextInjector, StaticInjector};
use crate::registry::CapabilityRegistry;
use crate::schema::{Condition, ConditionTest};

fn rule_evaluator() -> RuleEvaluator {
    rule_evaluator_with(Arc::new(StaticInjector))
}

fn rule_evaluator_with(injector: Arc<dyn ContextInjector>) -> RuleEvaluator {
    let registry = Arc::new(CapabilityRegistry::new());
    RuleEvaluator::new(
        ConditionEvaluator::new(injector.clone(), registry.clone()),
        ActionExecutor::new(injector, registry),
    )
}

fn budget() -> CallBudget {
    CallBudget::new(Duration::from_secs(1), None)
}

fn tier_rule(id: &str, priority: i64, target: &str, value: Value) -> Rule {
    Rule::new(id, priority)
        .with_condition(Condition::new("tier", ConditionTest::Equals { value: json!("gold") }))
        .with_action(Action::Set {
            target: target.into(),
            value,
        })
}

fn gold() -> Context {
    let mut c = Context::new();
    c.insert("tier".into(), json!("gold"));
    c
}

struct Slow;

#[async_trait]
impl ContextInjector for Slow {
    async fn evaluate_with_llm(&self, _p: &str, _c: &Context) -> Result<bool, InjectorError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(true)
    }
    async fn generate_with_llm(&self, _p: &str, _c: &Context) -> Result<String, InjectorError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(String::new())
    }
}

#[test]
fn blend_without_weight_is_boolean() {
    assert_eq!(blend_score(true, 0.1, None), 1.0);
    assert_eq!(blend_score(false, 0.9, None), 0.0);
}

#[test]
fn blend_with_weight_mixes_confidence() {
    let s = blend_score(true, 0.2, Some(0.5));
    assert!((s - 0.6).abs() < 1e-9);
    let s = blend_score(false, 1.0, Some(0.4));
    assert!((s - 0.4).abs() < 1e-9);
    // weights outside [0, 1] are clamped
    assert_eq!(blend_score(true, 0.0, Some(3.0)), 0.0);
}

#[test]
fn overlapping_paths() {
    assert!(paths_overlap("a.b", "a.b"));
    assert!(paths_overlap("a", "a.b"));
    assert!(paths_overlap("a.b.c", "a.b"));
    assert!(!paths_overlap("a.b", "a.bc"));
    assert!(!paths_overlap("x", "y"));
}

#[test]
fn claims_ignore_own_rule() {
    let mut claims = TargetClaims::default();
    claims.claim("out", "r1");
    assert_eq!(claims.owner_other_than("out", "r1"), None);
    assert_eq!(claims.owner_other_than("out.x", "r2"), Some("r1"));
}

#[test]
fn processing_time_serializes_as_millis() {
    let result = EvaluationResult {
        rule_id: "r".into(),
        matched: true,
        score: 1.0,
        confidence: 0.5,
        executed_actions: vec![],
        suppressed_actions: vec![],
        processing_time: Duration::from_millis(250),
        activation: vec![],
        error: None,
    };
    let v = serde_json::to_value(&result).unwrap();
    assert_eq!(v["processingTime"], json!(250.0));
    assert_eq!(v["ruleId"], json!("r"));
    assert!(v.get("error").is_none());
    let back: EvaluationResult = serde_json::from_value(v).unwrap();
    assert_eq!(back, result);
}

#[tokio::test]
async fn matched_rule_executes_actions() {
    let rule = tier_rule("r", 1, "discount", json!(10));
    let mut ctx = gold();
    let eval = rule_evaluator()
        .evaluate_rule(&rule, &Signal::default(), &mut ctx, &budget(), None)
        .await;
    assert!(eval.result.matched);
    assert_eq!(eval.result.score, 1.0);
    assert_eq!(eval.result.executed_actions.len(), 1);
    assert_eq!(ctx.get("discount"), Some(&json!(10)));
}

#[tokio::test]
async fn unmatched_rule_leaves_context() {
    let rule = tier_rule("r", 1, "discount", json!(10));
    let mut ctx = Context::new();
    let eval = rule_evaluator()
        .evaluate_rule(&rule, &Signal::default(), &mut ctx, &budget(), None)
        .await;
    assert!(!eval.result.matched);
    assert!(eval.result.executed_actions.is_empty());
    assert!(ctx.is_empty());
}

#[tokio::test]
async fn low_blended_score_skips_actions() {
    let rule = tier_rule("r", 1, "discount", json!(10)).with_signal_weight(0.8);
    let mut ctx = gold();
    let signal = Signal {
        confidence: 0.1,
        activation: vec![],
    };
    let eval = rule_evaluator()
        .evaluate_rule(&rule, &signal, &mut ctx, &budget(), None)
        .await;
    assert!(eval.result.matched);
    assert!(eval.result.score <= ACTION_THRESHOLD);
    assert!(eval.result.executed_actions.is_empty());
    assert!(ctx.get("discount").is_none());
}

#[tokio::test]
async fn trigger_is_reported() {
    let rule = Rule::new("r", 1).with_action(Action::Trigger {
        function_name: "notify_ops".into(),
        target: None,
    });
    let mut ctx = Context::new();
    let eval = rule_evaluator()
        .evaluate_rule(&rule, &Signal::default(), &mut ctx, &budget(), None)
        .await;
    assert_eq!(eval.triggers, vec!["notify_ops".to_string()]);
    assert!(ctx.is_empty());
}

#[tokio::test]
async fn llm_failure_is_contained_in_result() {
    let rule = Rule::new("r", 1)
        .with_condition(Condition::new(
            "body",
            ConditionTest::LlmEvaluate {
                llm_prompt: "urgent?".into(),
            },
        ))
        .with_action(Action::Set {
            target: "flag".into(),
            value: json!(true),
        });
    let mut ctx = Context::new();
    let eval = rule_evaluator()
        .evaluate_rule(&rule, &Signal::default(), &mut ctx, &budget(), None)
        .await;
    assert!(!eval.result.matched);
    assert_eq!(eval.result.error.as_ref().map(|e| e.kind), Some(FailureKind::ExternalCapability));
    assert!(ctx.is_empty());
}

#[tokio::test]
async fn slow_llm_times_out() {
    let rule = Rule::new("r", 1).with_condition(Condition::new(
        "body",
        ConditionTest::LlmEvaluate {
            llm_prompt: "?".into(),
        },
    ));
    let budget = CallBudget::new(Duration::from_millis(100), None);
    let mut ctx = Context::new();
    let eval = rule_evaluator_with(Arc::new(Slow))
        .evaluate_rule(&rule, &Signal::default(), &mut ctx, &budget, None)
        .await;
    assert!(!eval.result.matched);
    let failure = eval.result.error.expect("timeout recorded");
    assert_eq!(failure.kind, FailureKind::ExternalCapability);
    assert!(failure.message.contains("timed out"));
}

#[tokio::test]
async fn budget_deadline_caps_per_call_limit() {
    let deadline = tokio::time::Instant::now();
    let budget = CallBudget::new(Duration::from_secs(60), Some(deadline));
    assert!(budget.is_expired());
    let err = budget
        .run(async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, InjectorError>(())
        })
        .await
        .unwrap_err();
    assert!(matches!(err, InjectorError::Timeout(_)));
}

#[tokio::test]
async fn claims_suppress_overlapping_writes() {
    let high = tier_rule("high", 10, "offer", json!("gold-offer"));
    let low = tier_rule("low", 1, "offer.code", json!("x"));
    let ev = rule_evaluator();
    let mut ctx = gold();
    let mut claims = TargetClaims::default();

    ev.evaluate_rule(&high, &Signal::default(), &mut ctx, &budget(), Some(&mut claims))
        .await;
    let eval = ev
        .evaluate_rule(&low, &Signal::default(), &mut ctx, &budget(), Some(&mut claims))
        .await;

    assert!(eval.result.matched);
    assert!(eval.result.executed_actions.is_empty());
    assert_eq!(eval.result.suppressed_actions.len(), 1);
    assert_eq!(ctx.get("offer"), Some(&json!("gold-offer")));
}

#[tokio::test]
async fn failed_action_rolls_back_earlier_writes() {
    let rule = Rule::new("r", 1)
        .with_action(Action::Set {
            target: "y".into(),
            value: json!("A"),
        })
        .with_action(Action::Trigger {
            function_name: "notify_ops".into(),
            target: None,
        })
        .with_action(Action::LlmGenerate {
            target: "z".into(),
            prompt: "summarize".into(),
        });
    let mut ctx = gold();
    let mut claims = TargetClaims::default();
    let eval = rule_evaluator()
        .evaluate_rule(&rule, &Signal::default(), &mut ctx, &budget(), Some(&mut claims))
        .await;

    assert!(!eval.result.matched);
    assert_eq!(eval.result.score, 0.0);
    assert_eq!(eval.result.error.as_ref().map(|e| e.kind), Some(FailureKind::ExternalCapability));
    assert!(eval.result.executed_actions.is_empty());
    assert!(eval.triggers.is_empty());
    assert_eq!(ctx, gold());
    assert_eq!(claims.owner_other_than("y", "other"), None);
}
