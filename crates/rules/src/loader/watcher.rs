//! Filesystem event handler for the notify watcher (hot-reload).

use std::path::Path;

use notify::event::{CreateKind, ModifyKind};
use notify::{Event, EventKind};
use tracing::{debug, info, warn};

use crate::engine::RuleEngine;

/// Handle one filesystem event, reloading `engine` if it touches `target`.
pub(super) fn handle_fs_event(event: &Event, target: &Path, engine: &RuleEngine) {
    let reload = matches!(
        event.kind,
        EventKind::Create(CreateKind::File | CreateKind::Any)
            | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Name(_) | ModifyKind::Any)
    );
    if !reload || !event.paths.iter().any(|p| same_file(p, target)) {
        return;
    }

    debug!(path = %target.display(), kind = ?event.kind, "rule file changed");
    match engine.load_rules_from_file(target) {
        Ok(count) => info!(path = %target.display(), count, "hot-reloaded rule file"),
        Err(e) => warn!(
            path = %target.display(),
            error = %e,
            "failed to reload rule file, keeping previous rule set"
        ),
    }
}

/// Compare by file name within the watched directory; event paths may be
/// absolute while the configured path is relative.
fn same_file(event_path: &Path, target: &Path) -> bool {
    if event_path == target {
        return true;
    }
    match (event_path.canonicalize(), target.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => event_path.file_name().is_some() && event_path.file_name() == target.file_name(),
    }
}
