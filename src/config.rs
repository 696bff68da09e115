//! Configuration module for Shutter
//!
//! Configuration hierarchy:
//! 1. Environment variables (SHUTTER_*)
//! 2. Workspace config (`<workspace>/shutter.toml`)
//! 3. User config (`~/.config/shutter/config.toml`)
//! 4. Built-in defaults (lowest priority)
//!
//! The ignore list is loaded once at process start and is read-only
//! thereafter; dependency traversal never snapshots an ignored project.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ShutterError, ShutterResult};

/// Directory under the workspace root that holds snapshots, the project
/// ledger and the event log when no explicit snapshot root is configured.
const DEFAULT_SNAPSHOT_DIR: &str = ".shutter";

/// Default number of scheduler worker threads
const DEFAULT_WORKERS: usize = 4;

/// Resolved configuration for a Shutter run
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing the workspace projects (one subdirectory each)
    pub workspace_root: PathBuf,
    /// Directory where archives, the ledger and the event log are written
    pub snapshot_root: PathBuf,
    /// Project names excluded from dependency-triggered snapshotting
    ignored_projects: BTreeSet<String>,
    /// Scheduler worker thread count
    pub workers: usize,
}

/// Partial configuration as read from a single TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FileConfig {
    #[serde(default)]
    snapshot_root: Option<PathBuf>,

    #[serde(default)]
    ignore: Vec<String>,

    #[serde(default)]
    workers: Option<usize>,
}

impl FileConfig {
    fn load(path: &Path) -> ShutterResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ShutterError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ShutterError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Overlay `other` on top of self. Scalar fields replace; ignore lists
    /// accumulate (a workspace cannot un-ignore a user-ignored project).
    fn merge(&mut self, other: FileConfig) {
        if other.snapshot_root.is_some() {
            self.snapshot_root = other.snapshot_root;
        }
        self.ignore.extend(other.ignore);
        if other.workers.is_some() {
            self.workers = other.workers;
        }
    }
}

impl Config {
    /// Load configuration for the given workspace root, merging user config,
    /// workspace config and environment overrides onto defaults.
    pub fn load(workspace_root: &Path) -> ShutterResult<Self> {
        let mut file = FileConfig::default();

        if let Some(user_path) = user_config_path() {
            if user_path.exists() {
                file.merge(FileConfig::load(&user_path)?);
            }
        }

        let workspace_path = workspace_root.join("shutter.toml");
        if workspace_path.exists() {
            file.merge(FileConfig::load(&workspace_path)?);
        }

        apply_env_overrides(&mut file);

        let snapshot_root = file
            .snapshot_root
            .unwrap_or_else(|| workspace_root.join(DEFAULT_SNAPSHOT_DIR));

        Ok(Config {
            workspace_root: workspace_root.to_path_buf(),
            snapshot_root,
            ignored_projects: file.ignore.into_iter().collect(),
            workers: file.workers.unwrap_or(DEFAULT_WORKERS).max(1),
        })
    }

    /// Configuration with defaults only, no files or environment consulted.
    pub fn with_defaults(workspace_root: &Path) -> Self {
        Config {
            workspace_root: workspace_root.to_path_buf(),
            snapshot_root: workspace_root.join(DEFAULT_SNAPSHOT_DIR),
            ignored_projects: BTreeSet::new(),
            workers: DEFAULT_WORKERS,
        }
    }

    /// Ignore-list membership check, consulted before recursing into any
    /// dependency.
    pub fn is_ignored(&self, project: &str) -> bool {
        self.ignored_projects.contains(project)
    }

    /// The configured ignore list, sorted.
    pub fn ignored_projects(&self) -> impl Iterator<Item = &str> {
        self.ignored_projects.iter().map(String::as_str)
    }

    /// Replace the ignore list (used by tests and embedding callers).
    pub fn set_ignored_projects(&mut self, names: impl IntoIterator<Item = String>) {
        self.ignored_projects = names.into_iter().collect();
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("shutter").join("config.toml"))
}

fn apply_env_overrides(file: &mut FileConfig) {
    if let Ok(root) = std::env::var("SHUTTER_SNAPSHOT_ROOT") {
        if !root.is_empty() {
            file.snapshot_root = Some(PathBuf::from(root));
        }
    }
    if let Ok(workers) = std::env::var("SHUTTER_WORKERS") {
        if let Ok(n) = workers.parse::<usize>() {
            file.workers = Some(n);
        }
    }
    if let Ok(ignore) = std::env::var("SHUTTER_IGNORE") {
        file.ignore.extend(
            ignore
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        );
    }
}
