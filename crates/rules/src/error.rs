//! Error types for rule loading, updates and evaluation.

use serde::{Deserialize, Serialize};

use crate::injector::InjectorError;

/// Errors that can occur while loading, updating or evaluating rules.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML/JSON parse or deserialization error.
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Rule set rejected (duplicate ids, failed validation).
    #[error("Load error: {0}")]
    Load(String),

    /// No rule with the given id is loaded.
    #[error(
        "rule '{id}' not found{}",
        .suggestion.as_ref().map(|s| format!(" (did you mean '{s}'?)")).unwrap_or_default()
    )]
    NotFound {
        id: String,
        suggestion: Option<String>,
    },

    /// A condition could not be evaluated (e.g. malformed regex).
    #[error("condition evaluation failed: {0}")]
    ConditionFailure(String),

    /// An extension point was used without a registered handler.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// The context injector failed or timed out.
    #[error("external capability error: {0}")]
    ExternalCapability(#[from] InjectorError),

    /// Filesystem watcher error.
    #[error("Notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// The scoring thread pool could not be built.
    #[error("worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn not_found(id: impl Into<String>) -> Self {
        EngineError::NotFound {
            id: id.into(),
            suggestion: None,
        }
    }

    /// Failures contained at the condition level: the condition reads as false.
    pub fn is_condition_local(&self) -> bool {
        matches!(
            self,
            EngineError::ConditionFailure(_) | EngineError::NotImplemented(_)
        )
    }
}

// ── Per-rule failure record ─────────────────────────────────────────

/// Category of a failure recorded on an evaluation result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ConditionFailure,
    NotImplemented,
    ExternalCapability,
    Other,
}

/// A failure contained within one rule's evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&EngineError> for RuleFailure {
    fn from(err: &EngineError) -> Self {
        let kind = match err {
            EngineError::ConditionFailure(_) => FailureKind::ConditionFailure,
            EngineError::NotImplemented(_) => FailureKind::NotImplemented,
            EngineError::ExternalCapability(_) => FailureKind::ExternalCapability,
            _ => FailureKind::Other,
        };
        RuleFailure {
            kind,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_includes_suggestion() {
        let err = EngineError::NotFound {
            id: "r-10".to_string(),
            suggestion: Some("r10".to_string()),
        };
        assert_eq!(err.to_string(), "rule 'r-10' not found (did you mean 'r10'?)");
        assert_eq!(EngineError::not_found("x").to_string(), "rule 'x' not found");
    }

    #[test]
    fn failure_kind_mapping() {
        let f = RuleFailure::from(&EngineError::NotImplemented("custom".into()));
        assert_eq!(f.kind, FailureKind::NotImplemented);
        let f = RuleFailure::from(&EngineError::ExternalCapability(InjectorError::Backend(
            "boom".into(),
        )));
        assert_eq!(f.kind, FailureKind::ExternalCapability);
        assert!(EngineError::ConditionFailure("bad".into()).is_condition_local());
        assert!(!EngineError::Load("dup".into()).is_condition_local());
    }
}
