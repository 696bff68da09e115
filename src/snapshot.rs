//! Snapshot orchestrator
//!
//! Decides what to snapshot and when. A snapshot request marks the project
//! known, schedules an asynchronous job keyed on the project name, and
//! returns the planned archive path immediately. The job builds the base
//! archive, merges external library binaries into it, records the event,
//! and then expands the dependency frontier: every required project that is
//! neither known nor ignored is claimed atomically in the ledger and gets
//! its own scheduled job. The claim is what makes traversal of cyclic
//! dependency graphs terminate and keeps two concurrent traversal paths from
//! double-scheduling a newly discovered project.
//!
//! Failures are per-project: a project whose export or merge fails is logged
//! and skipped, and its siblings and dependencies are still processed.

use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, warn};

use crate::archive::{merge_libraries, ProjectArchiver, ZipExporter};
use crate::config::Config;
use crate::error::{ShutterError, ShutterResult};
use crate::ledger::ProjectLedger;
use crate::recorder::{ActivityRecorder, JsonlRecorder};
use crate::scheduler::KeyedScheduler;
use crate::workspace::{ClasspathProvider, EntryKind, Workspace};

/// Ledger file name under the snapshot root
pub const LEDGER_FILE: &str = "projects.toml";

/// Event log file name under the snapshot root
pub const EVENTS_FILE: &str = "events.jsonl";

/// Orchestrates snapshot jobs over the scheduler.
///
/// Cheap to clone via the interior `Arc`; jobs hold a clone for the
/// duration of dependency expansion.
pub struct Snapshotter {
    inner: Arc<SnapshotterInner>,
}

struct SnapshotterInner {
    snapshot_root: PathBuf,
    workspace: Workspace,
    ignored: BTreeSet<String>,
    ledger: ProjectLedger,
    scheduler: KeyedScheduler,
    archiver: Arc<dyn ProjectArchiver + Send + Sync>,
    classpath: Arc<dyn ClasspathProvider + Send + Sync>,
    recorder: Arc<dyn ActivityRecorder + Send + Sync>,
}

impl Snapshotter {
    /// Snapshotter with the on-disk collaborators: zip exporter, workspace
    /// build metadata, JSONL event log.
    pub fn new(config: &Config) -> ShutterResult<Self> {
        Self::with_collaborators(
            config,
            Arc::new(ZipExporter::new()),
            Arc::new(Workspace::new(&config.workspace_root)),
            Arc::new(JsonlRecorder::new(config.snapshot_root.join(EVENTS_FILE))),
        )
    }

    /// Snapshotter with injected collaborators (used by tests and embedders).
    pub fn with_collaborators(
        config: &Config,
        archiver: Arc<dyn ProjectArchiver + Send + Sync>,
        classpath: Arc<dyn ClasspathProvider + Send + Sync>,
        recorder: Arc<dyn ActivityRecorder + Send + Sync>,
    ) -> ShutterResult<Self> {
        let ledger = ProjectLedger::open(&config.snapshot_root.join(LEDGER_FILE))?;
        Ok(Self {
            inner: Arc::new(SnapshotterInner {
                snapshot_root: config.snapshot_root.clone(),
                workspace: Workspace::new(&config.workspace_root),
                ignored: config.ignored_projects().map(String::from).collect(),
                ledger,
                scheduler: KeyedScheduler::new(config.workers),
                archiver,
                classpath,
                recorder,
            }),
        })
    }

    /// Request a snapshot of `name`. Marks the project known (idempotent),
    /// schedules the job, and returns the planned archive path without
    /// waiting for the job to run.
    pub fn request_snapshot(&self, name: &str) -> PathBuf {
        self.inner.ledger.know(name);
        self.inner.schedule_snapshot(name)
    }

    /// Snapshot every project currently known to the ledger.
    pub fn snapshot_known_projects(&self) -> Vec<PathBuf> {
        self.inner
            .ledger
            .known_projects()
            .iter()
            .map(|name| self.request_snapshot(name))
            .collect()
    }

    /// Snapshot every project touched during this session.
    pub fn snapshot_touched_projects(&self) -> Vec<PathBuf> {
        self.inner
            .ledger
            .touched_projects()
            .iter()
            .map(|name| self.request_snapshot(name))
            .collect()
    }

    /// Filesystem paths of `name`'s direct library references. A metadata
    /// read failure is logged and yields an empty list, never an error.
    pub fn non_workspace_libraries(&self, name: &str) -> Vec<PathBuf> {
        self.inner.non_workspace_libraries(name)
    }

    /// The underlying knowledge store.
    pub fn ledger(&self) -> &ProjectLedger {
        &self.inner.ledger
    }

    /// Block until every scheduled snapshot job has finished.
    pub fn wait_idle(&self) {
        self.inner.scheduler.wait_idle();
    }
}

impl SnapshotterInner {
    /// Compute the archive path for a snapshot of `name` taken now and
    /// schedule the job. Millisecond timestamps are the only collision
    /// guard, matching the archive naming contract.
    fn schedule_snapshot(self: &Arc<Self>, name: &str) -> PathBuf {
        let archive = self
            .snapshot_root
            .join(format!("{name}-{}.zip", Utc::now().timestamp_millis()));

        let inner = Arc::clone(self);
        let job_name = name.to_string();
        let job_archive = archive.clone();
        self.scheduler
            .schedule(name, move || inner.run_job(&job_name, &job_archive));

        archive
    }

    fn run_job(self: &Arc<Self>, name: &str, archive: &Path) {
        debug!("taking snapshot of '{name}' into {}", archive.display());
        match self.build_and_merge(name, archive) {
            Ok(()) => self.recorder.record_snapshot(archive),
            Err(err) => error!("snapshot of '{name}' failed: {err}"),
        }
        self.expand_dependencies(name);
    }

    fn build_and_merge(&self, name: &str, archive: &Path) -> ShutterResult<()> {
        let project_dir = self.workspace.project_dir(name);
        self.archiver.build(&project_dir, name, archive)?;

        let libraries = self.non_workspace_libraries(name);
        if !libraries.is_empty() {
            merge_libraries(archive, &libraries)
                .map_err(|err| ShutterError::archive(name, err))?;
        }
        Ok(())
    }

    /// Iterate over the dependency frontier of `name`. Each required project
    /// is claimed atomically; only the claiming traversal path schedules its
    /// snapshot, so a project reachable through several paths (including
    /// cycles back to `name`) is visited at most once.
    fn expand_dependencies(self: &Arc<Self>, name: &str) {
        let required = match self.classpath.required_project_names(name) {
            Ok(required) => required,
            Err(err) => {
                warn!("{err}; treating '{name}' as having no required projects");
                return;
            }
        };

        let mut frontier: VecDeque<String> = required.into();
        while let Some(dependency) = frontier.pop_front() {
            if self.ignored.contains(&dependency) {
                debug!("dependency '{dependency}' of '{name}' is ignored");
                continue;
            }
            if !self.ledger.claim(&dependency) {
                continue;
            }
            self.schedule_snapshot(&dependency);
        }
    }

    fn non_workspace_libraries(&self, name: &str) -> Vec<PathBuf> {
        match self.classpath.raw_entries(name) {
            Ok(entries) => entries
                .into_iter()
                .filter(|entry| entry.kind == EntryKind::Library)
                .map(|entry| entry.path)
                .collect(),
            Err(err) => {
                warn!("{err}; treating '{name}' as having no external libraries");
                Vec::new()
            }
        }
    }
}
