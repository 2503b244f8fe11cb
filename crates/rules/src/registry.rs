//! Capability registry for the `custom` condition and `transform` action
//! extension points.
//!
//! Handlers are looked up by name at evaluation time. A missing handler is
//! reported as [`EngineError::NotImplemented`] so "unsupported" is never
//! confused with "tested and failed".

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use ruleweave_core::Context;

use crate::error::{EngineError, Result};

/// Custom condition: `(field value, condition value, context) -> matched`.
pub type ConditionHandler =
    Arc<dyn Fn(Option<&Value>, &Value, &Context) -> Result<bool> + Send + Sync>;

/// Transform: `(current value at target, payload, context) -> replacement`.
///
/// Returning `Ok(None)` leaves the target untouched.
pub type TransformHandler =
    Arc<dyn Fn(Option<&Value>, Option<&Value>, &Context) -> Result<Option<Value>> + Send + Sync>;

/// Name of the built-in transform that leaves its target unchanged.
pub const IDENTITY_TRANSFORM: &str = "identity";

#[derive(Clone)]
pub struct CapabilityRegistry {
    conditions: HashMap<String, ConditionHandler>,
    transforms: HashMap<String, TransformHandler>,
}

impl CapabilityRegistry {
    /// Registry with the built-in `identity` transform and no custom conditions.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_transform(IDENTITY_TRANSFORM, |_, _, _| Ok(None));
        registry
    }

    /// Registry with no handlers at all.
    pub fn empty() -> Self {
        Self {
            conditions: HashMap::new(),
            transforms: HashMap::new(),
        }
    }

    pub fn register_condition<F>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Option<&Value>, &Value, &Context) -> Result<bool> + Send + Sync + 'static,
    {
        self.conditions.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn register_transform<F>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Option<&Value>, Option<&Value>, &Context) -> Result<Option<Value>>
            + Send
            + Sync
            + 'static,
    {
        self.transforms.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn condition(&self, name: Option<&str>) -> Result<&ConditionHandler> {
        let name = name.ok_or_else(|| {
            EngineError::NotImplemented("custom condition without a handler name".to_string())
        })?;
        self.conditions.get(name).ok_or_else(|| {
            EngineError::NotImplemented(format!("no custom condition handler '{name}'"))
        })
    }

    pub fn transform(&self, name: &str) -> Result<&TransformHandler> {
        self.transforms
            .get(name)
            .ok_or_else(|| EngineError::NotImplemented(format!("no transform handler '{name}'")))
    }

    pub fn condition_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.conditions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn transform_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.transforms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("conditions", &self.condition_names())
            .field("transforms", &self.transform_names())
            .finish()
    }
}
