//! Rule file schema types with serde (de)serialization.
//!
//! Defines the complete type hierarchy for a rule file:
//! - `RuleSet`: top-level document (`rules`, `globalContext`, `neuralConfig`)
//! - `Rule`: prioritized condition/action pair with metadata
//! - `Condition` / `Action`: tagged variants dispatched on the `type` key
//!
//! The same types serialize back to YAML or JSON so an in-memory set can
//! be exported and reloaded without loss.

mod action;
mod condition;
mod metadata;
mod rule;
mod rule_set;

pub use action::*;
pub use condition::*;
pub use metadata::*;
pub use rule::*;
pub use rule_set::*;
