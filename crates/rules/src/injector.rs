//! Context injector: the external capability the engine consumes for
//! context enrichment and LLM-backed conditions and actions.

use std::time::Duration;

use async_trait::async_trait;

use ruleweave_core::{deep_merge, Context};

use crate::schema::Rule;

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum InjectorError {
    #[error("capability not configured: {0}")]
    NotConfigured(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// External collaborator providing enrichment and LLM capabilities.
///
/// Implementations are shared across evaluations and must be cheap to call
/// concurrently. Latency and failure are opaque to the engine: every call is
/// bounded by the evaluation deadline and failures are contained per rule.
#[async_trait]
pub trait ContextInjector: Send + Sync {
    /// Produce the enriched context for one evaluation pass.
    ///
    /// The default deep-merges the caller's context over `global`.
    async fn inject(&self, context: Context, global: &Context) -> Result<Context, InjectorError> {
        let mut enriched = global.clone();
        deep_merge(&mut enriched, &context);
        Ok(enriched)
    }

    /// Answer a yes/no prompt about the context.
    async fn evaluate_with_llm(&self, prompt: &str, context: &Context) -> Result<bool, InjectorError>;

    /// Generate text for the context.
    async fn generate_with_llm(&self, prompt: &str, context: &Context) -> Result<String, InjectorError>;

    /// Best-effort warm-up hook for rules predicted to fire next.
    async fn precompile(&self, _rule: &Rule) -> Result<(), InjectorError> {
        Ok(())
    }
}

/// Injector with no LLM backend: merges the global context and reports
/// both LLM capabilities as not configured.
#[derive(Debug, Clone, Default)]
pub struct StaticInjector;

#[async_trait]
impl ContextInjector for StaticInjector {
    async fn evaluate_with_llm(&self, _prompt: &str, _context: &Context) -> Result<bool, InjectorError> {
        Err(InjectorError::NotConfigured("evaluate_with_llm".to_string()))
    }

    async fn generate_with_llm(&self, _prompt: &str, _context: &Context) -> Result<String, InjectorError> {
        Err(InjectorError::NotConfigured("generate_with_llm".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn default_inject_lets_context_override_global() {
        let global = match json!({"region": "eu", "flags": {"beta": false, "ui": "v2"}}) {
            serde_json::Value::Object(m) => m,
            _ => unreachable!(),
        };
        let ctx = match json!({"flags": {"beta": true}, "x": 1}) {
            serde_json::Value::Object(m) => m,
            _ => unreachable!(),
        };

        let enriched = StaticInjector.inject(ctx, &global).await.unwrap();
        assert_eq!(
            serde_json::Value::Object(enriched),
            json!({"region": "eu", "flags": {"beta": true, "ui": "v2"}, "x": 1})
        );
    }

    #[tokio::test]
    async fn static_injector_has_no_llm() {
        let ctx = Context::new();
        let err = StaticInjector.evaluate_with_llm("?", &ctx).await.unwrap_err();
        assert!(matches!(err, InjectorError::NotConfigured(_)));
        assert!(StaticInjector.generate_with_llm("?", &ctx).await.is_err());
    }
}
