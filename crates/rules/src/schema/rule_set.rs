//! Top-level rule file document.

use serde::{Deserialize, Serialize};

use ruleweave_core::Context;

use super::Rule;

/// A complete rule file: ordered rules plus set-wide settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Merged into every evaluation context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_context: Option<Context>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neural_config: Option<NeuralConfig>,
    #[serde(default, skip_serializing_if = "ConflictPolicy::is_default")]
    pub conflict_policy: ConflictPolicy,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    /// Parse a rule file. JSON is accepted too, being a subset of YAML.
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// The declared neural config, or defaults when absent.
    pub fn neural(&self) -> NeuralConfig {
        self.neural_config.clone().unwrap_or_default()
    }
}

/// Settings for the parallel scoring and learning subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NeuralConfig {
    /// Scoring workers. Falls back to the engine config when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism_level: Option<usize>,
    /// Training steps applied per `train` call.
    #[serde(default = "default_layer_depth")]
    pub layer_depth: usize,
    /// Minimum ranking score for predictive preload, in `[0, 1]`.
    #[serde(default = "default_activation_threshold")]
    pub activation_threshold: f64,
    #[serde(default)]
    pub learning_enabled: bool,
}

fn default_layer_depth() -> usize {
    3
}

fn default_activation_threshold() -> f64 {
    0.5
}

impl Default for NeuralConfig {
    fn default() -> Self {
        Self {
            parallelism_level: None,
            layer_depth: default_layer_depth(),
            activation_threshold: default_activation_threshold(),
            learning_enabled: false,
        }
    }
}

/// What happens when two matched rules write the same target.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Every matched rule runs all its actions; the last write wins.
    #[default]
    AllowAll,
    /// Once a rule writes a target, lower-priority rules skip actions on it.
    PriorityWins,
}

impl ConflictPolicy {
    pub fn is_default(&self) -> bool {
        *self == ConflictPolicy::AllowAll
    }
}
