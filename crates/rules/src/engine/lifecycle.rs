//! Rule set lifecycle: load, update, optimize, export.

use std::path::Path;
use std::sync::{Arc, PoisonError};

use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::events::EngineEvent;
use crate::loader::{parse_rule_set, RuleLoader};
use crate::optimizer::{HistoryOptimizer, Optimization};
use crate::schema::{Rule, RulePatch, RuleSet};
use crate::signal::{SignalModel, WorkerPool};
use crate::validation::validate_rule_set;

use super::RuleEngine;

impl RuleEngine {
    /// Parse, validate and install a rule set from YAML (or JSON).
    ///
    /// On any failure the previous set stays active and an `error` event is
    /// emitted.
    pub fn load_rules_from_yaml(&self, content: &str) -> Result<usize> {
        let set = parse_rule_set(content).map_err(|e| self.report(e))?;
        self.install(set)
    }

    pub fn load_rules_from_file(&self, path: &Path) -> Result<usize> {
        let set = RuleLoader::load_file(path).map_err(|e| self.report(e))?;
        info!(path = %path.display(), "loading rules from file");
        self.install(set)
    }

    /// Validate and install an already-parsed set.
    pub fn load_rule_set(&self, set: RuleSet) -> Result<usize> {
        self.install(set)
    }

    fn install(&self, set: RuleSet) -> Result<usize> {
        let validation = validate_rule_set(&set, Some(&self.registry));
        for warning in &validation.warnings {
            warn!("{warning}");
        }
        if !validation.valid {
            return Err(self.report(EngineError::Load(validation.summary())));
        }

        let neural = set.neural();
        let workers = neural
            .parallelism_level
            .unwrap_or_else(|| self.config.resolved_parallelism());

        // Build everything fallible before touching the active state.
        let pool = if workers.max(1) != self.workers() {
            Some(WorkerPool::new(workers).map_err(|e| self.report(e))?)
        } else {
            None
        };
        let mut model = SignalModel::new(&neural);
        if model.learning_enabled() {
            for rule in &set.rules {
                model.train(rule, rule.priority as f64);
            }
        }

        let count = self.store.load(set).map_err(|e| self.report(e))?;

        if let Some(pool) = pool {
            *self.pool.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(pool);
        }
        *self.model.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(model);
        self.last_prediction
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        info!(
            count,
            workers = self.workers(),
            learning = neural.learning_enabled,
            "rules installed"
        );
        let rule_set = self.store.snapshot();
        self.events.emit(EngineEvent::RulesLoaded {
            count,
            rule_ids: rule_set.rules.iter().map(|r| r.id.clone()).collect(),
            rule_set,
        });
        Ok(count)
    }

    /// Merge `patch` into rule `id`, stamp `updatedAt`, and retrain the
    /// signal model on the updated rule when learning is enabled.
    pub fn update_rule(&self, id: &str, patch: &RulePatch) -> Result<Rule> {
        let rule = self.store.update(id, patch)?;
        let retrained = self.with_model_mut(|model| model.train(&rule, rule.priority as f64));
        info!(rule_id = %id, priority = rule.priority, retrained, "rule updated");
        self.events.emit(EngineEvent::RuleUpdated {
            rule_id: id.to_string(),
            updates: patch.clone(),
            rule: rule.clone(),
        });
        Ok(rule)
    }

    /// Recompute priority and signal weight for every rule with history and
    /// apply them through [`update_rule`](Self::update_rule).
    pub fn optimize_rules(&self) -> Vec<Optimization> {
        let stats = {
            let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            HistoryOptimizer::stats(history.iter())
        };

        let mut applied = Vec::with_capacity(stats.len());
        for rule_stats in stats {
            let Ok(current) = self.store.get(&rule_stats.rule_id) else {
                debug!(rule_id = %rule_stats.rule_id, "skipping history for unloaded rule");
                continue;
            };
            let (new_priority, signal_weight) = HistoryOptimizer::plan(&rule_stats);
            let patch = RulePatch {
                priority: Some(new_priority),
                signal_weight: Some(signal_weight),
                ..RulePatch::default()
            };
            match self.update_rule(&rule_stats.rule_id, &patch) {
                Ok(_) => applied.push(Optimization {
                    rule_id: rule_stats.rule_id.clone(),
                    old_priority: current.priority,
                    new_priority,
                    signal_weight,
                    stats: rule_stats,
                }),
                Err(e) => warn!(rule_id = %rule_stats.rule_id, error = %e, "optimization not applied"),
            }
        }

        info!(rules = applied.len(), "rules optimized");
        self.events.emit(EngineEvent::RulesOptimized {
            optimizations: applied.clone(),
        });
        applied
    }

    /// The active set as YAML, reloadable by
    /// [`load_rules_from_yaml`](Self::load_rules_from_yaml).
    pub fn export_yaml(&self) -> Result<String> {
        Ok(self.store.snapshot().to_yaml()?)
    }

    pub fn export_json(&self) -> Result<String> {
        self.store
            .snapshot()
            .to_json()
            .map_err(|e| EngineError::Load(format!("failed to serialize rule set: {e}")))
    }

    pub fn snapshot(&self) -> RuleSet {
        self.store.snapshot()
    }

    /// Log and broadcast a load failure, passing the error through.
    fn report(&self, err: EngineError) -> EngineError {
        warn!(error = %err, "rule load failed, keeping previous rule set");
        self.events.emit(EngineEvent::Error {
            kind: "load".to_string(),
            message: err.to_string(),
        });
        err
    }
}
