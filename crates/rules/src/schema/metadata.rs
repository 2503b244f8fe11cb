//! Optional per-rule metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata attached to a rule. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleMetadata {
    /// How much the learned confidence counts against the boolean match, in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_weight: Option<f64>,
    /// Last time the rule was changed through `update_rule`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl RuleMetadata {
    pub fn is_empty(&self) -> bool {
        self.signal_weight.is_none()
            && self.updated_at.is_none()
            && self.description.is_none()
            && self.tags.is_none()
    }
}
