//! Condition types: a field path, a typed test, and a trailing operator.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Logical operator joining a condition to the one that follows it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogicalOperator {
    #[default]
    #[serde(rename = "AND", alias = "and")]
    And,
    #[serde(rename = "OR", alias = "or")]
    Or,
}

impl LogicalOperator {
    /// Fold `next` into the running result.
    pub fn apply(self, running: bool, next: bool) -> bool {
        match self {
            LogicalOperator::And => running && next,
            LogicalOperator::Or => running || next,
        }
    }

    /// Whether the running result already fixes the outcome of this operator.
    pub fn is_decided(self, running: bool) -> bool {
        match self {
            LogicalOperator::And => !running,
            LogicalOperator::Or => running,
        }
    }
}

/// A single test against one context field.
///
/// ```yaml
/// - field: user.email
///   type: regex
///   value: "@example\\.com$"
///   operator: OR
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    /// Dot-separated path into the context.
    pub field: String,
    #[serde(flatten)]
    pub test: ConditionTest,
    /// How the *next* condition folds into the running result (default AND).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<LogicalOperator>,
}

impl Condition {
    pub fn new(field: impl Into<String>, test: ConditionTest) -> Self {
        Self {
            field: field.into(),
            test,
            operator: None,
        }
    }

    pub fn with_operator(mut self, operator: LogicalOperator) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn kind(&self) -> ConditionKind {
        self.test.kind()
    }
}

/// Type-specific payload of a condition, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionTest {
    /// Strict equality with the field value.
    Equals {
        #[serde(default)]
        value: Value,
    },
    /// Substring test on the stringified field.
    Contains {
        #[serde(default)]
        value: Value,
    },
    /// Regular expression tested against the stringified field.
    Regex {
        #[serde(alias = "regex")]
        value: String,
    },
    /// Delegated to the context injector's LLM capability.
    LlmEvaluate {
        #[serde(rename = "llmPrompt")]
        llm_prompt: String,
    },
    /// Registered extension handler, looked up by name.
    Custom {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        handler: Option<String>,
        #[serde(default)]
        value: Value,
    },
}

impl ConditionTest {
    pub fn kind(&self) -> ConditionKind {
        match self {
            ConditionTest::Equals { .. } => ConditionKind::Equals,
            ConditionTest::Contains { .. } => ConditionKind::Contains,
            ConditionTest::Regex { .. } => ConditionKind::Regex,
            ConditionTest::LlmEvaluate { .. } => ConditionKind::LlmEvaluate,
            ConditionTest::Custom { .. } => ConditionKind::Custom,
        }
    }
}

/// Payload-free discriminant of [`ConditionTest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    Equals,
    Contains,
    Regex,
    LlmEvaluate,
    Custom,
}

impl ConditionKind {
    /// All kinds, in pattern-vector order.
    pub const ALL: [ConditionKind; 5] = [
        ConditionKind::Equals,
        ConditionKind::Contains,
        ConditionKind::Regex,
        ConditionKind::LlmEvaluate,
        ConditionKind::Custom,
    ];

    pub fn index(self) -> usize {
        match self {
            ConditionKind::Equals => 0,
            ConditionKind::Contains => 1,
            ConditionKind::Regex => 2,
            ConditionKind::LlmEvaluate => 3,
            ConditionKind::Custom => 4,
        }
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionKind::Equals => write!(f, "equals"),
            ConditionKind::Contains => write!(f, "contains"),
            ConditionKind::Regex => write!(f, "regex"),
            ConditionKind::LlmEvaluate => write!(f, "llm_evaluate"),
            ConditionKind::Custom => write!(f, "custom"),
        }
    }
}
