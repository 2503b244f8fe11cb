//! Declarative rule evaluation engine.
//!
//! This crate provides:
//! - YAML/JSON rule files with serde (de)serialization and validation
//! - Priority-ordered evaluation of conditions and actions over a JSON context
//! - Parallel signal scoring on a rayon worker pool, with optional learning
//! - History-driven priority optimization and predictive preload
//! - Filesystem loader with hot-reload via `notify` watcher
//! - Lifecycle events over a tokio broadcast channel and per-stage metrics

pub mod engine;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod history;
pub mod injector;
pub mod loader;
pub mod metrics;
pub mod optimizer;
pub mod predict;
pub mod registry;
pub mod schema;
pub mod signal;
pub mod store;
pub mod validation;

pub use engine::{EngineBuilder, EvaluateOptions, Evaluation, RuleEngine};
pub use error::{EngineError, FailureKind, Result, RuleFailure};
pub use evaluator::EvaluationResult;
pub use events::EngineEvent;
pub use injector::{ContextInjector, InjectorError, StaticInjector};
pub use metrics::{MetricsSink, StageMetric};
pub use registry::CapabilityRegistry;
pub use schema::{Action, Condition, ConditionTest, Rule, RulePatch, RuleSet};
