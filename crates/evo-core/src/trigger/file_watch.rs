//! Restart on writes to a single file.
//!
//! The parent directory is watched rather than the file itself, so an editor
//! that saves by renaming a temporary file over the target keeps triggering.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use super::{RestartEvent, RestartSender, TriggerSource};
use crate::error::{SessionError, SessionResult};

/// Watches exactly one file and emits a restart per (debounced) write.
pub struct FileWatchTrigger {
    target: PathBuf,
    debounce: Duration,
    watcher: Option<(RecommendedWatcher, PathBuf)>,
}

impl FileWatchTrigger {
    pub fn new(target: impl Into<PathBuf>, debounce: Duration) -> Self {
        Self {
            target: target.into(),
            debounce,
            watcher: None,
        }
    }
}

impl TriggerSource for FileWatchTrigger {
    fn start(&mut self, events: RestartSender) -> SessionResult<()> {
        let resolved = self.target.canonicalize().map_err(|e| {
            SessionError::TriggerSetupFailed(format!(
                "cannot resolve {}: {e}",
                self.target.display()
            ))
        })?;
        if !resolved.is_file() {
            return Err(SessionError::TriggerSetupFailed(format!(
                "{} is not a file",
                resolved.display()
            )));
        }

        let dir = resolved
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                SessionError::TriggerSetupFailed(format!("{} has no parent", resolved.display()))
            })?;

        let mut filter = WriteFilter::new(resolved.clone(), self.debounce);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if filter.accept(&event, Instant::now()) {
                    debug!(kind = ?event.kind, "watched file written");
                    let _ = events.send(RestartEvent);
                }
            }
            Err(e) => warn!("file watch error: {e}"),
        })
        .map_err(|e| SessionError::TriggerSetupFailed(format!("failed to create watcher: {e}")))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| {
                SessionError::TriggerSetupFailed(format!("failed to watch {}: {e}", dir.display()))
            })?;

        info!(path = %resolved.display(), "watching file");
        self.watcher = Some((watcher, dir));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some((mut watcher, path)) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(&path) {
                debug!("unwatch {}: {e}", path.display());
            }
            info!(dir = %path.display(), "stopped watching file");
        }
    }

    fn describe(&self) -> String {
        format!("writes to {}", self.target.display())
    }
}

/// Decides which raw notify events count as one restart.
struct WriteFilter {
    target: PathBuf,
    debounce: Duration,
    last_fired: Option<Instant>,
}

impl WriteFilter {
    fn new(target: PathBuf, debounce: Duration) -> Self {
        Self {
            target,
            debounce,
            last_fired: None,
        }
    }

    fn accept(&mut self, event: &Event, now: Instant) -> bool {
        if !is_write(&event.kind) {
            return false;
        }
        if !event.paths.iter().any(|p| self.is_target(p)) {
            return false;
        }
        if let Some(last) = self.last_fired {
            if now.saturating_duration_since(last) < self.debounce {
                return false;
            }
        }
        self.last_fired = Some(now);
        true
    }

    fn is_target(&self, path: &Path) -> bool {
        path == self.target
            || path
                .canonicalize()
                .map(|p| p == self.target)
                .unwrap_or(false)
    }
}

/// Content changes, plus a new file appearing at the path (created, or
/// renamed into place by an atomic save).
fn is_write(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Modify(ModifyKind::Name(
                RenameMode::To | RenameMode::Both | RenameMode::Any
            ))
    )
}
