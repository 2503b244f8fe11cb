use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Engine config ─────────────────────────────────────────────

/// Runtime settings for the rule engine.
///
/// Rule-file settings (`neuralConfig`) describe the rules themselves; this
/// struct holds the process-level knobs: buffer sizes, timeouts and the
/// fallback worker count used when a rule file does not declare one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Active profile name (empty = default).
    pub profile: String,
    /// Maximum number of evaluation results kept in history.
    pub history_capacity: usize,
    /// Number of latency samples kept per stage for percentile estimates.
    pub metrics_window: usize,
    /// Worker count used when the rule file has no `parallelismLevel`. 0 = available parallelism.
    pub default_parallelism: usize,
    /// Upper bound on a single external capability call.
    pub external_timeout_ms: u64,
    /// Deadline for a whole `evaluate` pass. 0 = no deadline.
    pub evaluation_timeout_ms: u64,
    /// Buffered lifecycle events per subscriber.
    pub event_capacity: usize,
    /// Rule file loaded at startup by the binaries.
    pub rules_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            profile: String::new(),
            history_capacity: 10_000,
            metrics_window: 1024,
            default_parallelism: 0,
            external_timeout_ms: 30_000,
            evaluation_timeout_ms: 0,
            event_capacity: 256,
            rules_file: None,
        }
    }
}

impl EngineConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `RULEWEAVE_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("RULEWEAVE_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        let defaults = Self::default();
        Self {
            profile: p.to_string(),
            history_capacity: profiled_env_usize(p, "RULEWEAVE_HISTORY_CAPACITY", defaults.history_capacity)
                .max(1),
            metrics_window: profiled_env_usize(p, "RULEWEAVE_METRICS_WINDOW", defaults.metrics_window).max(1),
            default_parallelism: profiled_env_usize(p, "RULEWEAVE_DEFAULT_PARALLELISM", defaults.default_parallelism),
            external_timeout_ms: profiled_env_u64(p, "RULEWEAVE_EXTERNAL_TIMEOUT_MS", defaults.external_timeout_ms),
            evaluation_timeout_ms: profiled_env_u64(p, "RULEWEAVE_EVALUATION_TIMEOUT_MS", defaults.evaluation_timeout_ms),
            event_capacity: profiled_env_usize(p, "RULEWEAVE_EVENT_CAPACITY", defaults.event_capacity).max(1),
            rules_file: profiled_env_opt(p, "RULEWEAVE_RULES_FILE").map(PathBuf::from),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Resolve the fallback worker count (0 means use available parallelism).
    pub fn resolved_parallelism(&self) -> usize {
        if self.default_parallelism == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.default_parallelism
        }
    }

    pub fn external_timeout(&self) -> Duration {
        Duration::from_millis(self.external_timeout_ms)
    }

    /// Per-pass deadline, if one is configured.
    pub fn evaluation_timeout(&self) -> Option<Duration> {
        (self.evaluation_timeout_ms > 0).then(|| Duration::from_millis(self.evaluation_timeout_ms))
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  history:     capacity={}", self.history_capacity);
        tracing::info!("  metrics:     window={}", self.metrics_window);
        tracing::info!("  workers:     default={}", self.resolved_parallelism());
        tracing::info!(
            "  timeouts:    external={}ms, evaluation={}",
            self.external_timeout_ms,
            self.evaluation_timeout()
                .map(|d| format!("{}ms", d.as_millis()))
                .unwrap_or_else(|| "none".to_string())
        );
        tracing::info!(
            "  rules:       file={}",
            self.rules_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string())
        );
    }
}
