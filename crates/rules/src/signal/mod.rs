//! Parallel scoring subsystem.
//!
//! - [`pattern`]: fixed-length numeric patterns for rules and contexts
//! - [`similarity`]: cosine similarity between patterns
//! - [`model`]: the trainable relevance signal
//! - [`pool`]: rayon pool scoring chunks of the sorted rule list

pub mod model;
pub mod pattern;
pub mod pool;
pub mod similarity;

pub use model::{Signal, SignalModel};
pub use pattern::{PatternExtractor, PATTERN_DIM};
pub use pool::WorkerPool;
pub use similarity::cosine_similarity;
