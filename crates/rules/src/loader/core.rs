//! Core [`RuleLoader`]: file-backed rule sets with optional hot-reload.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use crate::engine::RuleEngine;
use crate::error::{EngineError, Result};
use crate::schema::RuleSet;

use super::watcher::handle_fs_event;

/// Parse a rule file body. JSON is accepted since it is a subset of YAML.
pub fn parse_rule_set(content: &str) -> Result<RuleSet> {
    if content.trim().is_empty() {
        return Err(EngineError::Load("rule file is empty".to_string()));
    }
    Ok(RuleSet::from_yaml(content)?)
}

/// Loader bound to one rule file.
pub struct RuleLoader {
    path: PathBuf,
    /// Active filesystem watcher (held to keep it alive).
    _watcher: Option<RecommendedWatcher>,
}

impl RuleLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _watcher: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_watching(&self) -> bool {
        self._watcher.is_some()
    }

    /// Read and parse a rule file.
    pub fn load_file(path: &Path) -> Result<RuleSet> {
        let contents = fs::read_to_string(path)?;
        parse_rule_set(&contents)
    }

    pub fn load(&self) -> Result<RuleSet> {
        Self::load_file(&self.path)
    }

    /// Atomically write `set` as YAML.
    ///
    /// Writes to a dot-prefixed `.tmp` file first, then renames over the
    /// target so a watcher never sees a partial file.
    pub fn write_file(path: &Path, set: &RuleSet) -> Result<()> {
        let yaml = set.to_yaml()?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| EngineError::Load(format!("invalid rule file path: {}", path.display())))?;
        let tmp_path = path.with_file_name(format!(".{name}.tmp"));

        fs::write(&tmp_path, yaml)?;
        fs::rename(&tmp_path, path)?;
        info!(path = %path.display(), rules = set.rules.len(), "wrote rule file");
        Ok(())
    }

    /// Reload `engine` whenever the rule file changes.
    ///
    /// The parent directory is watched rather than the file itself so that
    /// editors replacing the file by rename are picked up.
    pub fn watch(&mut self, engine: Arc<RuleEngine>) -> Result<()> {
        let target = self.path.clone();
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => handle_fs_event(&event, &target, &engine),
                Err(e) => warn!(error = %e, "filesystem watcher error"),
            },
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let _ = watcher.configure(notify::Config::default().with_poll_interval(Duration::from_millis(500)));

        info!(path = %self.path.display(), "watching rule file for changes");
        self._watcher = Some(watcher);
        Ok(())
    }
}
