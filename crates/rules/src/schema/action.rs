//! Action types, tagged by `type`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Something a matched rule does to the context (or outside of it).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Write `value` at `target`.
    Set {
        target: String,
        #[serde(default)]
        value: Value,
    },
    /// Append `value` to the sequence at `target`.
    Append {
        target: String,
        #[serde(default)]
        value: Value,
    },
    /// Write generated text at `target`.
    LlmGenerate { target: String, prompt: String },
    /// Raise an `actionTrigger` event; does not touch the context.
    Trigger {
        #[serde(rename = "functionName")]
        function_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    /// Rewrite the value at `target` through a registered transform.
    Transform {
        target: String,
        #[serde(rename = "functionName")]
        function_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Set { .. } => ActionKind::Set,
            Action::Append { .. } => ActionKind::Append,
            Action::LlmGenerate { .. } => ActionKind::LlmGenerate,
            Action::Trigger { .. } => ActionKind::Trigger,
            Action::Transform { .. } => ActionKind::Transform,
        }
    }

    /// Context path this action writes to. `None` for triggers.
    pub fn target(&self) -> Option<&str> {
        match self {
            Action::Set { target, .. }
            | Action::Append { target, .. }
            | Action::LlmGenerate { target, .. }
            | Action::Transform { target, .. } => Some(target),
            Action::Trigger { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Set,
    Append,
    LlmGenerate,
    Trigger,
    Transform,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Set => write!(f, "set"),
            ActionKind::Append => write!(f, "append"),
            ActionKind::LlmGenerate => write!(f, "llm_generate"),
            ActionKind::Trigger => write!(f, "trigger"),
            ActionKind::Transform => write!(f, "transform"),
        }
    }
}
