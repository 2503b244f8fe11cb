//! Rule file loading with hot-reload via a `notify` watcher.
//!
//! A rule file holds one complete [`RuleSet`](crate::schema::RuleSet) as
//! YAML or JSON. The watcher reloads the engine whenever the file changes;
//! a file that fails to parse or validate leaves the previous set active.

mod core;
mod watcher;


pub use self::core::{parse_rule_set, RuleLoader};
