//! Rayon worker pool for the parallel scoring phase.

use std::ops::Range;

use rayon::prelude::*;
use tracing::info;

use ruleweave_core::Context;

use crate::error::Result;
use crate::schema::Rule;

use super::model::{Signal, SignalModel};

/// Fixed-size pool scoring contiguous chunks of the sorted rule list.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("ruleweave-score-{i}"))
            .build()?;
        info!(workers, "scoring pool started");
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Split `len` items into at most `workers` contiguous ranges of
    /// `ceil(len / workers)` items each.
    pub fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
        if len == 0 {
            return Vec::new();
        }
        let chunk = len.div_ceil(workers.max(1));
        (0..len)
            .step_by(chunk)
            .map(|start| start..(start + chunk).min(len))
            .collect()
    }

    /// Score every rule, one chunk per worker. Output order matches `rules`.
    pub fn score(&self, model: &SignalModel, rules: &[Rule], context: &Context) -> Vec<Signal> {
        let ranges = Self::partition(rules.len(), self.workers);
        self.pool.install(|| {
            ranges
                .into_par_iter()
                .map(|range| {
                    rules[range]
                        .iter()
                        .map(|rule| model.score(rule, context))
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>()
        })
        .into_iter()
        .flatten()
        .collect()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("workers", &self.workers).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NeuralConfig;
    use serde_json::json;

    #[test]
    fn partition_is_ceil_divided_and_contiguous() {
        assert_eq!(WorkerPool::partition(10, 4), vec![0..3, 3..6, 6..9, 9..10]);
        assert_eq!(WorkerPool::partition(3, 8), vec![0..1, 1..2, 2..3]);
        assert_eq!(WorkerPool::partition(5, 1), vec![0..5]);
        assert!(WorkerPool::partition(0, 4).is_empty());
        assert_eq!(WorkerPool::partition(4, 0), vec![0..4]);
    }

    #[test]
    fn scoring_preserves_order() {
        let pool = WorkerPool::new(3).unwrap();
        let model = SignalModel::new(&NeuralConfig::default());
        let rules: Vec<Rule> = (0..17).map(|i| Rule::new(format!("r{i}"), i)).collect();
        let mut ctx = Context::new();
        ctx.insert("x".into(), json!(1));

        let parallel = pool.score(&model, &rules, &ctx);
        let sequential: Vec<Signal> = rules.iter().map(|r| model.score(r, &ctx)).collect();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn zero_workers_means_one() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.workers(), 1);
        assert!(pool.score(&SignalModel::new(&NeuralConfig::default()), &[], &Context::new()).is_empty());
    }
}
