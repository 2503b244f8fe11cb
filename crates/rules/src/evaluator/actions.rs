//! Action execution against the shared evaluation context.

use std::sync::Arc;

use serde_json::Value;

use ruleweave_core::{get_path, set_path, Context};

use crate::error::Result;
use crate::injector::ContextInjector;
use crate::registry::CapabilityRegistry;
use crate::schema::Action;

use super::CallBudget;

/// What an executed action did.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionEffect {
    /// The context was written at this path.
    Wrote(String),
    /// A trigger fired; the caller raises the event.
    Triggered { function_name: String },
    /// The action ran without changing anything.
    Unchanged,
}

pub struct ActionExecutor {
    injector: Arc<dyn ContextInjector>,
    registry: Arc<CapabilityRegistry>,
}

impl ActionExecutor {
    pub fn new(injector: Arc<dyn ContextInjector>, registry: Arc<CapabilityRegistry>) -> Self {
        Self { injector, registry }
    }

    pub async fn execute(
        &self,
        action: &Action,
        context: &mut Context,
        budget: &CallBudget,
    ) -> Result<ActionEffect> {
        match action {
            Action::Set { target, value } => {
                set_path(context, target, value.clone());
                Ok(ActionEffect::Wrote(target.clone()))
            }
            Action::Append { target, value } => {
                let mut items = match get_path(context, target) {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::Array(items)) => items.clone(),
                    Some(scalar) => vec![scalar.clone()],
                };
                items.push(value.clone());
                set_path(context, target, Value::Array(items));
                Ok(ActionEffect::Wrote(target.clone()))
            }
            Action::LlmGenerate { target, prompt } => {
                let text = budget
                    .run(self.injector.generate_with_llm(prompt, context))
                    .await?;
                set_path(context, target, Value::String(text));
                Ok(ActionEffect::Wrote(target.clone()))
            }
            Action::Trigger { function_name, .. } => Ok(ActionEffect::Triggered {
                function_name: function_name.clone(),
            }),
            Action::Transform {
                target,
                function_name,
                value,
            } => {
                let handler = self.registry.transform(function_name)?;
                match handler(get_path(context, target), value.as_ref(), context)? {
                    Some(replacement) => {
                        set_path(context, target, replacement);
                        Ok(ActionEffect::Wrote(target.clone()))
                    }
                    None => Ok(ActionEffect::Unchanged),
                }
            }
        }
    }
}
