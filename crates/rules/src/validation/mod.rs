//! Rule set validation with structured errors and suggestions.
//!
//! Errors block a load; warnings are advisory and logged. Checks that need
//! the capability registry (custom handlers, transforms) are skipped when
//! no registry is given.

mod checks;
pub mod fuzzy;

use serde::{Deserialize, Serialize};

use crate::registry::CapabilityRegistry;
use crate::schema::RuleSet;

// ── Result types ────────────────────────────────────────────────────

/// Overall validation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

/// A blocking validation error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    /// JSON-path-like location, e.g. `"rules[2].conditions[0].field"`.
    pub path: String,
    pub message: String,
}

/// A non-blocking advisory warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
    /// Optional "Did you mean …?" suggestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)?;
        if let Some(s) = &self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

impl ValidationResult {
    pub(crate) fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(ValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    pub(crate) fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warn_with_suggestion(path, message, None);
    }

    pub(crate) fn warn_with_suggestion(
        &mut self,
        path: impl Into<String>,
        message: impl Into<String>,
        suggestion: Option<&str>,
    ) {
        self.warnings.push(ValidationWarning {
            path: path.into(),
            message: message.into(),
            suggestion: suggestion.map(str::to_string),
        });
    }

    /// One line per error, for load failure messages.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ── Public API ──────────────────────────────────────────────────────

/// Validate a parsed [`RuleSet`].
pub fn validate_rule_set(set: &RuleSet, registry: Option<&CapabilityRegistry>) -> ValidationResult {
    let mut result = ValidationResult::new();
    checks::validate_ids(set, &mut result);
    checks::validate_neural_config(set, &mut result);
    for (i, rule) in set.rules.iter().enumerate() {
        checks::validate_rule(i, rule, registry, &mut result);
    }
    result
}

/// Parse raw YAML and validate. Parse errors are reported as a single error.
pub fn validate_yaml(yaml: &str, registry: Option<&CapabilityRegistry>) -> ValidationResult {
    match RuleSet::from_yaml(yaml) {
        Ok(set) => validate_rule_set(&set, registry),
        Err(e) => {
            let mut result = ValidationResult::new();
            result.error("", format!("YAML parse error: {e}"));
            result
        }
    }
}

#[cfg(test)]
mod tests;
