//! Condition evaluation: per-type tests and the left-to-right fold.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use ruleweave_core::{get_path, stringify, values_equal, Context};

use crate::error::{EngineError, Result, RuleFailure};
use crate::injector::ContextInjector;
use crate::registry::CapabilityRegistry;
use crate::schema::{Condition, ConditionTest, LogicalOperator};

use super::CallBudget;

/// Outcome of folding a rule's conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldOutcome {
    pub matched: bool,
    /// Conditions that failed locally and were read as `false`.
    pub failures: Vec<RuleFailure>,
    /// Conditions skipped because the running result was already decided.
    pub skipped: usize,
}

/// Evaluates conditions against an enriched context.
pub struct ConditionEvaluator {
    injector: Arc<dyn ContextInjector>,
    registry: Arc<CapabilityRegistry>,
    /// Compiled patterns keyed by source. Failed compilations are not cached.
    regex_cache: RwLock<HashMap<String, Regex>>,
}

impl ConditionEvaluator {
    pub fn new(injector: Arc<dyn ContextInjector>, registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            injector,
            registry,
            regex_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Fold `conditions` left to right starting from `true`.
    ///
    /// The operator trailing condition *i* joins condition *i + 1*. A
    /// condition is skipped when the running result already decides the
    /// operator (`false AND _`, `true OR _`). Local failures (bad regex,
    /// missing custom handler) read as `false`; external failures abort the
    /// fold and are returned as errors.
    pub async fn fold(
        &self,
        rule_id: &str,
        conditions: &[Condition],
        context: &Context,
        budget: &CallBudget,
    ) -> Result<FoldOutcome> {
        let mut running = true;
        let mut pending = LogicalOperator::And;
        let mut failures = Vec::new();
        let mut skipped = 0;

        for condition in conditions {
            if pending.is_decided(running) {
                skipped += 1;
            } else {
                let value = match self.evaluate(condition, context, budget).await {
                    Ok(value) => value,
                    Err(e) if e.is_condition_local() => {
                        warn!(rule_id = %rule_id, field = %condition.field, kind = %condition.kind(), error = %e, "condition failed, treating as non-match");
                        failures.push(RuleFailure::from(&e));
                        false
                    }
                    Err(e) => return Err(e),
                };
                running = pending.apply(running, value);
            }
            pending = condition.operator.unwrap_or_default();
        }

        Ok(FoldOutcome {
            matched: running,
            failures,
            skipped,
        })
    }

    /// Evaluate a single condition.
    pub async fn evaluate(
        &self,
        condition: &Condition,
        context: &Context,
        budget: &CallBudget,
    ) -> Result<bool> {
        let field = get_path(context, &condition.field);

        match &condition.test {
            ConditionTest::Equals { value } => Ok(values_equal(field.unwrap_or(&Value::Null), value)),
            ConditionTest::Contains { value } => Ok(contains(field.unwrap_or(&Value::Null), value)),
            ConditionTest::Regex { value } => {
                let re = self.compiled(value)?;
                Ok(re.is_match(&stringify(field.unwrap_or(&Value::Null))))
            }
            ConditionTest::LlmEvaluate { llm_prompt } => {
                let verdict = budget
                    .run(self.injector.evaluate_with_llm(llm_prompt, context))
                    .await?;
                Ok(verdict)
            }
            ConditionTest::Custom { handler, value } => {
                let handler = self.registry.condition(handler.as_deref())?;
                handler(field, value, context)
            }
        }
    }

    fn compiled(&self, pattern: &str) -> Result<Regex> {
        if let Some(re) = self
            .regex_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(pattern)
        {
            return Ok(re.clone());
        }

        let re = Regex::new(pattern)
            .map_err(|e| EngineError::ConditionFailure(format!("invalid regex '{pattern}': {e}")))?;
        self.regex_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pattern.to_string(), re.clone());
        Ok(re)
    }
}

/// Substring test on stringified values. Arrays also match by element
/// equality. A missing field stringifies to the empty string.
fn contains(field: &Value, needle: &Value) -> bool {
    if let Value::Array(items) = field {
        if items.iter().any(|item| values_equal(item, needle)) {
            return true;
        }
    }
    stringify(field).contains(&stringify(needle))
}
