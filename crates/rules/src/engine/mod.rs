//! The rule engine: the root orchestrator tying the store, scoring
//! subsystem, evaluator, history, metrics and events together.
//!
//! All shared state sits behind `std::sync` locks that are never held
//! across an `.await`, so the engine is `Send + Sync` and can be shared as
//! `Arc<RuleEngine>` between tasks and the file watcher thread.

mod evaluate;
mod lifecycle;


use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::broadcast;

use ruleweave_core::EngineConfig;

use crate::error::Result;
use crate::evaluator::{ActionExecutor, ConditionEvaluator, EvaluationResult, RuleEvaluator};
use crate::events::{EngineEvent, EventBus};
use crate::history::RingBuffer;
use crate::injector::{ContextInjector, StaticInjector};
use crate::metrics::{MetricsSink, StageMetric, StageMetrics};
use crate::predict::Prediction;
use crate::registry::CapabilityRegistry;
use crate::schema::{NeuralConfig, Rule};
use crate::signal::{SignalModel, WorkerPool};
use crate::store::RuleStore;

pub use evaluate::{EvaluateOptions, Evaluation};

pub struct RuleEngine {
    config: EngineConfig,
    store: RuleStore,
    /// Copy-on-write: scoring takes a snapshot, training swaps in a new one.
    model: RwLock<Arc<SignalModel>>,
    pool: RwLock<Arc<WorkerPool>>,
    evaluator: RuleEvaluator,
    injector: Arc<dyn ContextInjector>,
    registry: Arc<CapabilityRegistry>,
    history: Mutex<RingBuffer<EvaluationResult>>,
    metrics: Arc<StageMetrics>,
    sinks: Vec<Arc<dyn MetricsSink>>,
    events: EventBus,
    last_prediction: Mutex<Vec<Prediction>>,
}

/// Builder for [`RuleEngine`] with optional capabilities.
pub struct EngineBuilder {
    config: EngineConfig,
    injector: Arc<dyn ContextInjector>,
    registry: CapabilityRegistry,
    sinks: Vec<Arc<dyn MetricsSink>>,
}

impl EngineBuilder {
    pub fn injector(mut self, injector: Arc<dyn ContextInjector>) -> Self {
        self.injector = injector;
        self
    }

    pub fn registry(mut self, registry: CapabilityRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Additional sink receiving every stage measurement.
    pub fn metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn build(self) -> Result<RuleEngine> {
        let EngineBuilder {
            config,
            injector,
            registry,
            sinks,
        } = self;
        let registry = Arc::new(registry);
        let evaluator = RuleEvaluator::new(
            ConditionEvaluator::new(Arc::clone(&injector), Arc::clone(&registry)),
            ActionExecutor::new(Arc::clone(&injector), Arc::clone(&registry)),
        );
        let pool = WorkerPool::new(config.resolved_parallelism())?;

        Ok(RuleEngine {
            store: RuleStore::new(),
            model: RwLock::new(Arc::new(SignalModel::new(&NeuralConfig::default()))),
            pool: RwLock::new(Arc::new(pool)),
            evaluator,
            injector,
            registry,
            history: Mutex::new(RingBuffer::new(config.history_capacity)),
            metrics: Arc::new(StageMetrics::new(config.metrics_window)),
            sinks,
            events: EventBus::new(config.event_capacity),
            last_prediction: Mutex::new(Vec::new()),
            config,
        })
    }
}

impl RuleEngine {
    /// Engine with no LLM backend and the built-in capabilities only.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            injector: Arc::new(StaticInjector),
            registry: CapabilityRegistry::new(),
            sinks: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn rule(&self, id: &str) -> Result<Rule> {
        self.store.get(id)
    }

    /// Active rules in evaluation order.
    pub fn rules(&self) -> Vec<Rule> {
        self.store.sorted()
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Retained results, oldest first.
    pub fn history(&self) -> Vec<EvaluationResult> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn get_metrics(&self) -> BTreeMap<String, StageMetric> {
        self.metrics.snapshot()
    }

    /// Rules predicted by the most recent evaluation.
    pub fn last_prediction(&self) -> Vec<Prediction> {
        self.last_prediction
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn workers(&self) -> usize {
        self.pool_snapshot().workers()
    }

    /// Current signal model; cheap to clone.
    pub fn model(&self) -> Arc<SignalModel> {
        self.model.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn pool_snapshot(&self) -> Arc<WorkerPool> {
        self.pool.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Apply `f` to the signal model, cloning it first if a scoring pass
    /// still holds the previous snapshot.
    fn with_model_mut<R>(&self, f: impl FnOnce(&mut SignalModel) -> R) -> R {
        let mut guard = self.model.write().unwrap_or_else(PoisonError::into_inner);
        f(Arc::make_mut(&mut *guard))
    }

    fn record_metric(&self, stage: &str, success: bool, latency: Duration) {
        self.metrics.record_stage_metric(stage, success, latency);
        for sink in &self.sinks {
            sink.record_stage_metric(stage, success, latency);
        }
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("rules", &self.store.len())
            .field("workers", &self.workers())
            .field("history", &self.history_len())
            .field("registry", &self.registry)
            .finish()
    }
}
