//! In-memory rule cache keyed by id.
//!
//! The store holds the active [`RuleSet`] behind a single `RwLock`: loads
//! replace it atomically and updates mutate one rule in place, so readers
//! never observe a half-applied change.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use indexmap::IndexMap;
use tracing::info;

use ruleweave_core::Context;

use crate::error::{EngineError, Result};
use crate::schema::{ConflictPolicy, NeuralConfig, Rule, RulePatch, RuleSet};
use crate::validation::fuzzy::fuzzy_match;

#[derive(Debug, Default)]
struct Active {
    /// Rules in declaration order.
    rules: IndexMap<String, Rule>,
    global_context: Option<Context>,
    neural_config: Option<NeuralConfig>,
    conflict_policy: ConflictPolicy,
}

#[derive(Debug, Default)]
pub struct RuleStore {
    active: RwLock<Active>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active set. Duplicate ids reject the whole set and leave
    /// the previous one in place.
    pub fn load(&self, set: RuleSet) -> Result<usize> {
        let mut seen = HashSet::new();
        let duplicates: Vec<&str> = set
            .rules
            .iter()
            .filter(|r| !seen.insert(r.id.as_str()))
            .map(|r| r.id.as_str())
            .collect();
        if !duplicates.is_empty() {
            return Err(EngineError::Load(format!(
                "duplicate rule ids: {}",
                duplicates.join(", ")
            )));
        }

        let RuleSet {
            rules,
            global_context,
            neural_config,
            conflict_policy,
        } = set;
        let count = rules.len();
        let next = Active {
            rules: rules.into_iter().map(|r| (r.id.clone(), r)).collect(),
            global_context,
            neural_config,
            conflict_policy,
        };

        *self.active.write().unwrap_or_else(PoisonError::into_inner) = next;
        info!(count, "rule set loaded");
        Ok(count)
    }

    pub fn get(&self, id: &str) -> Result<Rule> {
        let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
        active
            .rules
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(&active, id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rules
            .contains_key(id)
    }

    /// Merge `patch` into the rule and stamp `updatedAt`. Unknown ids fail
    /// without creating anything.
    pub fn update(&self, id: &str, patch: &RulePatch) -> Result<Rule> {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        match active.rules.get_mut(id) {
            Some(rule) => {
                patch.apply(rule);
                rule.metadata.updated_at = Some(Utc::now());
                Ok(rule.clone())
            }
            None => Err(not_found(&active, id)),
        }
    }

    /// Rules ordered by priority descending; ties keep declaration order.
    pub fn sorted(&self) -> Vec<Rule> {
        let mut rules: Vec<Rule> = self
            .active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rules
            .values()
            .cloned()
            .collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        rules
    }

    /// The active set in declaration order, for export.
    pub fn snapshot(&self) -> RuleSet {
        let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
        RuleSet {
            rules: active.rules.values().cloned().collect(),
            global_context: active.global_context.clone(),
            neural_config: active.neural_config.clone(),
            conflict_policy: active.conflict_policy,
        }
    }

    pub fn len(&self) -> usize {
        self.active.read().unwrap_or_else(PoisonError::into_inner).rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn global_context(&self) -> Context {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .global_context
            .clone()
            .unwrap_or_default()
    }

    pub fn neural(&self) -> NeuralConfig {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .neural_config
            .clone()
            .unwrap_or_default()
    }

    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.active.read().unwrap_or_else(PoisonError::into_inner).conflict_policy
    }
}

fn not_found(active: &Active, id: &str) -> EngineError {
    let candidates: Vec<&str> = active.rules.keys().map(String::as_str).collect();
    EngineError::NotFound {
        id: id.to_string(),
        suggestion: fuzzy_match(id, &candidates).map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[(&str, i64)]) -> RuleSet {
        RuleSet::new(ids.iter().map(|(id, p)| Rule::new(*id, *p)).collect())
    }

    #[test]
    fn load_and_get() {
        let store = RuleStore::new();
        assert_eq!(store.load(set(&[("a", 1), ("b", 2)])).unwrap(), 2);
        assert_eq!(store.get("b").unwrap().priority, 2);
        assert!(store.contains("a"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn duplicate_ids_keep_previous_set() {
        let store = RuleStore::new();
        store.load(set(&[("a", 1)])).unwrap();
        let err = store.load(set(&[("x", 1), ("x", 2)])).unwrap_err();
        assert!(matches!(err, EngineError::Load(ref m) if m.contains("x")));
        assert!(store.contains("a"));
        assert!(!store.contains("x"));
    }

    #[test]
    fn sorted_is_stable_by_priority() {
        let store = RuleStore::new();
        store
            .load(set(&[("low", 1), ("tie-a", 5), ("high", 10), ("tie-b", 5)]))
            .unwrap();
        let ids: Vec<String> = store.sorted().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["high", "tie-a", "tie-b", "low"]);
    }

    #[test]
    fn update_merges_and_stamps() {
        let store = RuleStore::new();
        store.load(set(&[("a", 1)])).unwrap();
        assert!(store.get("a").unwrap().metadata.updated_at.is_none());
        let updated = store.update("a", &RulePatch::priority(7)).unwrap();
        assert_eq!(updated.priority, 7);
        assert!(updated.metadata.updated_at.is_some());
        assert_eq!(store.get("a").unwrap(), updated);
    }

    #[test]
    fn update_unknown_id_creates_nothing() {
        let store = RuleStore::new();
        store.load(set(&[("checkout-discount", 1)])).unwrap();
        let err = store
            .update("checkout-discont", &RulePatch::priority(3))
            .unwrap_err();
        match err {
            EngineError::NotFound { id, suggestion } => {
                assert_eq!(id, "checkout-discont");
                assert_eq!(suggestion.as_deref(), Some("checkout-discount"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn snapshot_keeps_declaration_order() {
        let store = RuleStore::new();
        store.load(set(&[("z", 1), ("a", 9)])).unwrap();
        let ids: Vec<String> = store.snapshot().rules.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["z", "a"]);
    }
}
