//! Project ledger
//!
//! The persistent knowledge store: which projects are already known (and are
//! therefore never re-snapshotted by dependency traversal), plus the
//! in-memory set of projects touched during the current session.
//!
//! The ledger is read and written from multiple scheduler workers
//! concurrently. All mutation goes through one interior mutex, so writes are
//! serialized and idempotent; `claim` is the atomic check-and-mark used by
//! dependency expansion to guarantee each project is scheduled at most once.
//! An `fs2` file lock guards the on-disk file against concurrent processes.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use log::error;
use serde::{Deserialize, Serialize};

use crate::error::{ShutterError, ShutterResult};

const LEDGER_VERSION: u32 = 1;

/// TOML representation of the persisted ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TomlLedger {
    version: u32,
    #[serde(default)]
    known: Vec<String>,
}

#[derive(Debug, Default)]
struct LedgerInner {
    known: BTreeSet<String>,
    touched: BTreeSet<String>,
}

/// Thread-safe project knowledge store backed by a TOML file.
#[derive(Debug)]
pub struct ProjectLedger {
    path: PathBuf,
    inner: Mutex<LedgerInner>,
}

impl ProjectLedger {
    /// Open the ledger at `path`, loading known projects if the file exists.
    pub fn open(path: &Path) -> ShutterResult<Self> {
        let known = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| ShutterError::Ledger {
                message: format!("read {}: {}", path.display(), e),
            })?;
            let parsed: TomlLedger = toml::from_str(&content).map_err(|e| ShutterError::Ledger {
                message: format!("parse {}: {}", path.display(), e),
            })?;
            if parsed.version != LEDGER_VERSION {
                return Err(ShutterError::Ledger {
                    message: format!(
                        "ledger format incompatible: found version {}, expected {}",
                        parsed.version, LEDGER_VERSION
                    ),
                });
            }
            parsed.known.into_iter().collect()
        } else {
            BTreeSet::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(LedgerInner {
                known,
                touched: BTreeSet::new(),
            }),
        })
    }

    /// Whether `name` is already registered in the ledger.
    pub fn is_known(&self, name: &str) -> bool {
        self.inner.lock().unwrap().known.contains(name)
    }

    /// Register `name` as known. Idempotent: registering a known project is
    /// a no-op and does not rewrite the file. Persistence failures are
    /// logged, never propagated; the in-memory state still governs traversal.
    pub fn know(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        if inner.known.insert(name.to_string()) {
            if let Err(err) = self.persist(&inner) {
                error!("failed to persist project ledger: {err}");
            }
        }
    }

    /// Atomically check-and-mark `name` as known. Returns true exactly once
    /// per name: the caller that receives true owns scheduling the snapshot.
    pub fn claim(&self, name: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if !inner.known.insert(name.to_string()) {
            return false;
        }
        if let Err(err) = self.persist(&inner) {
            error!("failed to persist project ledger: {err}");
        }
        true
    }

    /// All known project names, sorted.
    pub fn known_projects(&self) -> Vec<String> {
        self.inner.lock().unwrap().known.iter().cloned().collect()
    }

    /// Record that `name` was touched during this session.
    pub fn mark_touched(&self, name: &str) {
        self.inner.lock().unwrap().touched.insert(name.to_string());
    }

    /// All projects touched during this session, sorted. Not persisted.
    pub fn touched_projects(&self) -> Vec<String> {
        self.inner.lock().unwrap().touched.iter().cloned().collect()
    }

    /// Write the known set to disk. Caller must hold the inner lock, which
    /// serializes writers within this process; the sibling `.lock` file
    /// serializes against other processes.
    fn persist(&self, inner: &LedgerInner) -> ShutterResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_path = self.path.with_extension("lock");
        let lock_file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)?;
        lock_file.lock_exclusive()?;

        let toml_ledger = TomlLedger {
            version: LEDGER_VERSION,
            known: inner.known.iter().cloned().collect(),
        };
        let content = toml::to_string_pretty(&toml_ledger).map_err(|e| ShutterError::Ledger {
            message: e.to_string(),
        })?;

        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(&self.path)
            .map_err(|e| ShutterError::Io(e.error))?;

        let _ = fs2::FileExt::unlock(&lock_file);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn ledger_in(dir: &Path) -> ProjectLedger {
        ProjectLedger::open(&dir.join("projects.toml")).unwrap()
    }

    #[test]
    fn open_missing_file_starts_empty() {
        let dir = tempdir().unwrap();
        let ledger = ledger_in(dir.path());
        assert!(ledger.known_projects().is_empty());
    }

    #[test]
    fn know_persists_and_reloads() {
        let dir = tempdir().unwrap();
        let ledger = ledger_in(dir.path());
        ledger.know("app");
        ledger.know("lib-core");
        ledger.know("app"); // idempotent

        let reloaded = ledger_in(dir.path());
        assert_eq!(reloaded.known_projects(), vec!["app", "lib-core"]);
        assert!(reloaded.is_known("app"));
        assert!(!reloaded.is_known("ghost"));
    }

    #[test]
    fn claim_returns_true_exactly_once() {
        let dir = tempdir().unwrap();
        let ledger = ledger_in(dir.path());

        assert!(ledger.claim("app"));
        assert!(!ledger.claim("app"));
        assert!(ledger.is_known("app"));
    }

    #[test]
    fn claim_is_exclusive_under_concurrency() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(ledger_in(dir.path()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(std::thread::spawn(move || ledger.claim("contested")));
        }
        let wins: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();

        assert_eq!(wins, 1);
    }

    #[test]
    fn touched_projects_are_session_local() {
        let dir = tempdir().unwrap();
        let ledger = ledger_in(dir.path());
        ledger.mark_touched("app");
        ledger.mark_touched("app");
        ledger.mark_touched("lib-core");

        assert_eq!(ledger.touched_projects(), vec!["app", "lib-core"]);

        // Touched set is not persisted
        let reloaded = ledger_in(dir.path());
        assert!(reloaded.touched_projects().is_empty());
    }

    #[test]
    fn open_errors_on_version_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("projects.toml");
        fs::write(&path, "version = 99\nknown = []\n").unwrap();

        let err = ProjectLedger::open(&path).unwrap_err();
        assert!(matches!(err, ShutterError::Ledger { .. }));
        assert!(err.to_string().contains("incompatible"));
    }
}
