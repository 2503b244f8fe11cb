//! Engine lifecycle and evaluation events over a `tokio::sync::broadcast`
//! channel.
//!
//! Sends are best-effort: with no subscribers, events are dropped. Slow
//! subscribers observe `RecvError::Lagged` rather than stalling the engine.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use ruleweave_core::Context;

use crate::evaluator::EvaluationResult;
use crate::optimizer::Optimization;
use crate::schema::{Rule, RulePatch, RuleSet};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EngineEvent {
    RulesLoaded {
        count: usize,
        rule_ids: Vec<String>,
        /// The set now active.
        rule_set: RuleSet,
    },
    RuleUpdated {
        rule_id: String,
        updates: RulePatch,
        rule: Rule,
    },
    EvaluationComplete {
        evaluation_id: Uuid,
        results: Vec<EvaluationResult>,
        context: Context,
        total_time_ms: f64,
    },
    ActionTrigger {
        evaluation_id: Uuid,
        rule_id: String,
        function_name: String,
        context: Context,
    },
    RulesOptimized {
        optimizations: Vec<Optimization>,
    },
    Error {
        /// Where the failure happened: `load` or `inject`.
        kind: String,
        message: String,
    },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::RulesLoaded { .. } => "rulesLoaded",
            EngineEvent::RuleUpdated { .. } => "ruleUpdated",
            EngineEvent::EvaluationComplete { .. } => "evaluationComplete",
            EngineEvent::ActionTrigger { .. } => "actionTrigger",
            EngineEvent::RulesOptimized { .. } => "rulesOptimized",
            EngineEvent::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: EngineEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
