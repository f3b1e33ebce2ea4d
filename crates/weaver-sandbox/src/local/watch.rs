//! `watch` support for the local sandbox.

use super::Outbound;
use crate::error::{SandboxError, SandboxResult};
use crate::path::PathMapper;
use glob::Pattern;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use weaver_protocol::{FileChangeEvent, FileChangeKind, SandboxEvent};

/// A filesystem watcher feeding `file-change` events to one connection.
pub(crate) struct LocalWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl LocalWatcher {
    pub(crate) fn start(
        watcher_id: String,
        patterns: &[String],
        mapper: Arc<PathMapper>,
        out: Outbound,
    ) -> SandboxResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| SandboxError::InvalidPath(format!("{p}: {e}")))
            })
            .collect::<SandboxResult<Vec<_>>>()?;

        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = raw_tx.send(res);
        })
        .map_err(|e| SandboxError::Io(std::io::Error::other(e)))?;
        watcher
            .watch(mapper.host_root(), RecursiveMode::Recursive)
            .map_err(|e| SandboxError::Io(std::io::Error::other(e)))?;

        // Bridge notify's callback thread into the runtime
        let task = tokio::spawn(async move {
            while let Some(res) = raw_rx.recv().await {
                match res {
                    Ok(event) => {
                        for change in classify(&event, &patterns, &mapper, &watcher_id) {
                            out.event(SandboxEvent::FileChange(change));
                        }
                    }
                    Err(err) => warn!("file watcher error: {err}"),
                }
            }
            debug!(watcher_id = %watcher_id, "Watcher stopped");
        });

        Ok(Self {
            _watcher: watcher,
            task,
        })
    }
}

impl Drop for LocalWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn change_kind(kind: &EventKind) -> Option<FileChangeKind> {
    match kind {
        EventKind::Create(_) => Some(FileChangeKind::Add),
        EventKind::Modify(_) => Some(FileChangeKind::Change),
        EventKind::Remove(_) => Some(FileChangeKind::Remove),
        _ => None,
    }
}

/// Turn a raw notify event into the changes matching `patterns`.
fn classify(
    event: &Event,
    patterns: &[Pattern],
    mapper: &PathMapper,
    watcher_id: &str,
) -> Vec<FileChangeEvent> {
    let Some(kind) = change_kind(&event.kind) else {
        return Vec::new();
    };

    event
        .paths
        .iter()
        .filter(|path| matches_any(path, patterns, mapper))
        .filter_map(|path| mapper.to_sandbox(path))
        .map(|path| FileChangeEvent {
            watcher_id: watcher_id.to_string(),
            path: path.to_string_lossy().into_owned(),
            kind,
        })
        .collect()
}

/// Patterns may be written relative to the workdir or as sandbox paths.
fn matches_any(host_path: &Path, patterns: &[Pattern], mapper: &PathMapper) -> bool {
    let relative = mapper.relative(host_path);
    let absolute = mapper.to_sandbox(host_path);
    patterns.iter().any(|pattern| {
        relative.as_deref().is_some_and(|p| pattern.matches_path(p))
            || absolute.as_deref().is_some_and(|p| pattern.matches_path(p))
    })
}
