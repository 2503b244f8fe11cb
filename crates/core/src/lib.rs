pub mod config;
pub mod context;

pub use config::EngineConfig;
pub use context::*;
