//! Rule definition and partial updates.

use serde::{Deserialize, Serialize};

use super::{Action, Condition, RuleMetadata};

/// A named, prioritized condition/action pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    /// Higher evaluates first.
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "RuleMetadata::is_empty")]
    pub metadata: RuleMetadata,
}

impl Rule {
    pub fn new(id: impl Into<String>, priority: i64) -> Self {
        Self {
            id: id.into(),
            priority,
            conditions: Vec::new(),
            actions: Vec::new(),
            metadata: RuleMetadata::default(),
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_signal_weight(mut self, weight: f64) -> Self {
        self.metadata.signal_weight = Some(weight);
        self
    }

    pub fn signal_weight(&self) -> Option<f64> {
        self.metadata.signal_weight
    }
}

/// Partial update merged into an existing rule by `update_rule`.
///
/// Carries no `id`: rules cannot be renamed through an update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RulePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Action>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl RulePatch {
    pub fn priority(priority: i64) -> Self {
        Self {
            priority: Some(priority),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge every present field into `rule`. Does not touch `updatedAt`.
    pub fn apply(&self, rule: &mut Rule) {
        if let Some(priority) = self.priority {
            rule.priority = priority;
        }
        if let Some(conditions) = &self.conditions {
            rule.conditions = conditions.clone();
        }
        if let Some(actions) = &self.actions {
            rule.actions = actions.clone();
        }
        if let Some(weight) = self.signal_weight {
            rule.metadata.signal_weight = Some(weight);
        }
        if let Some(description) = &self.description {
            rule.metadata.description = Some(description.clone());
        }
        if let Some(tags) = &self.tags {
            rule.metadata.tags = Some(tags.clone());
        }
    }
}
