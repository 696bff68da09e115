//! Workspace watcher for session-touched snapshots
//!
//! Implements the `watch` command with:
//! - Debouncing (100ms)
//! - Change-to-project mapping (first path segment under the workspace root)
//! - Graceful Ctrl+C shutdown that snapshots every touched project
//! - NDJSON output for CI

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{ShutterError, ShutterResult};
use crate::session::{session, SessionOp};
use crate::snapshot::Snapshotter;
use crate::workspace::Workspace;

/// Debounce duration in milliseconds
const DEBOUNCE_MS: u64 = 100;

/// Watch options
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Workspace root containing the project directories
    pub workspace_root: std::path::PathBuf,
    /// Output as NDJSON
    pub json: bool,
}

/// Watch event types for NDJSON output
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Started { workspace: String },
    ProjectTouched { project: String },
    SnapshotQueued { project: String, archive: String },
    Error { message: String },
    Shutdown { snapshots: usize },
}

impl WatchEvent {
    pub fn to_json(&self) -> String {
        match self {
            WatchEvent::Started { workspace } => {
                format!(r#"{{"event":"started","workspace":"{}"}}"#, workspace)
            }
            WatchEvent::ProjectTouched { project } => {
                format!(r#"{{"event":"project_touched","project":"{}"}}"#, project)
            }
            WatchEvent::SnapshotQueued { project, archive } => {
                format!(
                    r#"{{"event":"snapshot_queued","project":"{}","archive":"{}"}}"#,
                    project, archive
                )
            }
            WatchEvent::Error { message } => {
                format!(
                    r#"{{"event":"error","message":"{}"}}"#,
                    message.replace('"', "\\\"")
                )
            }
            WatchEvent::Shutdown { snapshots } => {
                format!(r#"{{"event":"shutdown","snapshots":{}}}"#, snapshots)
            }
        }
    }
}

/// Watcher state for debouncing
struct WatcherState {
    pending_projects: BTreeSet<String>,
    last_change: Option<Instant>,
}

impl WatcherState {
    fn new() -> Self {
        Self {
            pending_projects: BTreeSet::new(),
            last_change: None,
        }
    }

    fn add_change(&mut self, project: String) {
        self.pending_projects.insert(project);
        self.last_change = Some(Instant::now());
    }

    fn should_flush(&self) -> bool {
        if let Some(last) = self.last_change {
            !self.pending_projects.is_empty()
                && last.elapsed() >= Duration::from_millis(DEBOUNCE_MS)
        } else {
            false
        }
    }

    fn take_projects(&mut self) -> Vec<String> {
        let projects: Vec<_> = std::mem::take(&mut self.pending_projects)
            .into_iter()
            .collect();
        self.last_change = None;
        projects
    }
}

/// Watch the workspace, marking projects touched as their files change.
///
/// When `running` goes false (Ctrl+C), every touched project is snapshotted
/// and the scheduler drained before returning. The shutdown pass is guarded
/// by the session state machine so a second signal cannot re-enter it.
pub fn watch(
    snapshotter: &Snapshotter,
    options: WatchOptions,
    running: Arc<AtomicBool>,
    event_callback: impl Fn(WatchEvent),
) -> ShutterResult<()> {
    let workspace = Workspace::new(&options.workspace_root);

    event_callback(WatchEvent::Started {
        workspace: options.workspace_root.display().to_string(),
    });

    let (tx, rx) = channel();

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                for path in event.paths {
                    let _ = tx.send(path);
                }
            }
        },
        Config::default(),
    )
    .map_err(|e| ShutterError::Io(std::io::Error::other(e.to_string())))?;

    watcher
        .watch(&options.workspace_root, RecursiveMode::Recursive)
        .map_err(|e| ShutterError::Io(std::io::Error::other(e.to_string())))?;

    // Watch loop with debouncing
    let mut state = WatcherState::new();

    while running.load(Ordering::SeqCst) {
        if let Ok(path) = rx.recv_timeout(Duration::from_millis(50)) {
            if let Some(project) = workspace.project_of(&path) {
                state.add_change(project);
            }
        }

        if state.should_flush() {
            for project in state.take_projects() {
                snapshotter.ledger().mark_touched(&project);
                event_callback(WatchEvent::ProjectTouched { project });
            }
        }
    }

    // Flush whatever was still inside the debounce window.
    for project in state.take_projects() {
        snapshotter.ledger().mark_touched(&project);
        event_callback(WatchEvent::ProjectTouched { project });
    }

    let mut snapshots = 0;
    if session().begin(SessionOp::Snapshot) {
        let touched = snapshotter.ledger().touched_projects();
        let archives = snapshotter.snapshot_touched_projects();
        for (project, archive) in touched.into_iter().zip(&archives) {
            event_callback(WatchEvent::SnapshotQueued {
                project,
                archive: archive.display().to_string(),
            });
        }
        snapshots = archives.len();
        snapshotter.wait_idle();
        session().end(SessionOp::Snapshot);
    }

    event_callback(WatchEvent::Shutdown { snapshots });
    Ok(())
}
