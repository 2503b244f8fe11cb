//! Individual rule set checks.

use std::collections::HashSet;

use regex::Regex;

use crate::registry::CapabilityRegistry;
use crate::schema::{Action, ConditionTest, Rule, RuleSet};

use super::fuzzy::{fuzzy_match, is_kebab_case};
use super::ValidationResult;

pub(super) fn validate_ids(set: &RuleSet, result: &mut ValidationResult) {
    let mut seen = HashSet::new();
    for (i, rule) in set.rules.iter().enumerate() {
        let path = format!("rules[{i}].id");
        if rule.id.trim().is_empty() {
            result.error(path, "rule id must not be empty");
            continue;
        }
        if !seen.insert(rule.id.as_str()) {
            result.error(path, format!("duplicate rule id '{}'", rule.id));
            continue;
        }
        if !is_kebab_case(&rule.id) {
            result.warn(path, format!("rule id '{}' is not kebab-case", rule.id));
        }
    }
}

pub(super) fn validate_neural_config(set: &RuleSet, result: &mut ValidationResult) {
    let Some(neural) = &set.neural_config else {
        return;
    };
    if neural.parallelism_level == Some(0) {
        result.error("neuralConfig.parallelismLevel", "must be at least 1");
    }
    if !(0.0..=1.0).contains(&neural.activation_threshold) {
        result.error(
            "neuralConfig.activationThreshold",
            format!("must be in [0, 1], got {}", neural.activation_threshold),
        );
    }
    if neural.layer_depth == 0 && neural.learning_enabled {
        result.warn("neuralConfig.layerDepth", "learning is enabled but layerDepth is 0; training has no effect");
    }
}

pub(super) fn validate_rule(
    index: usize,
    rule: &Rule,
    registry: Option<&CapabilityRegistry>,
    result: &mut ValidationResult,
) {
    let base = format!("rules[{index}]");

    if let Some(weight) = rule.metadata.signal_weight {
        if !(0.0..=1.0).contains(&weight) {
            result.error(
                format!("{base}.metadata.signalWeight"),
                format!("must be in [0, 1], got {weight}"),
            );
        }
    }

    for (i, condition) in rule.conditions.iter().enumerate() {
        let path = format!("{base}.conditions[{i}]");
        if condition.field.trim().is_empty() {
            result.error(format!("{path}.field"), "condition field must not be empty");
        }
        match &condition.test {
            ConditionTest::Regex { value } => {
                if let Err(e) = Regex::new(value) {
                    result.warn(
                        format!("{path}.value"),
                        format!("invalid regex, condition will never match: {e}"),
                    );
                }
            }
            ConditionTest::Custom { handler, .. } => match (handler, registry) {
                (None, _) => result.warn(
                    format!("{path}.handler"),
                    "custom condition without a handler is not implemented",
                ),
                (Some(name), Some(registry)) => {
                    let known = registry.condition_names();
                    if !known.contains(&name.as_str()) {
                        unknown_handler(result, format!("{path}.handler"), "custom condition", name, &known);
                    }
                }
                (Some(_), None) => {}
            },
            _ => {}
        }
    }

    for (i, action) in rule.actions.iter().enumerate() {
        let path = format!("{base}.actions[{i}]");
        if let Some(target) = action.target() {
            if target.trim().is_empty() {
                result.error(format!("{path}.target"), "action target must not be empty");
            }
        }
        match action {
            Action::Trigger { function_name, .. } | Action::Transform { function_name, .. }
                if function_name.trim().is_empty() =>
            {
                result.error(format!("{path}.functionName"), "functionName must not be empty");
            }
            Action::Transform { function_name, .. } => {
                if let Some(registry) = registry {
                    let known = registry.transform_names();
                    if !known.contains(&function_name.as_str()) {
                        unknown_handler(result, format!("{path}.functionName"), "transform", function_name, &known);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Unregistered handlers are warnings: evaluation reports them as not
/// implemented rather than failing the load.
fn unknown_handler(
    result: &mut ValidationResult,
    path: String,
    what: &str,
    name: &str,
    known: &[&str],
) {
    result.warn_with_suggestion(
        path,
        format!("no {what} handler '{name}' is registered"),
        fuzzy_match(name, known),
    );
}
