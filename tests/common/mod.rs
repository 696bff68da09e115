//! Common test utilities for Shutter integration tests.
//!
//! Provides `TestWorkspace`: an isolated temp workspace with helpers to lay
//! out projects, declare build metadata, and inspect produced archives.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use shutter::{Config, Snapshotter};

/// Isolated workspace directory with project subdirectories.
pub struct TestWorkspace {
    pub root: TempDir,
    ignored: Vec<String>,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("create temp workspace"),
            ignored: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn snapshot_root(&self) -> PathBuf {
        self.path().join(".shutter")
    }

    /// Create a project directory with a couple of source files.
    pub fn add_project(&self, name: &str) -> PathBuf {
        let dir = self.path().join(name);
        fs::create_dir_all(dir.join("src")).unwrap();
        fs::write(dir.join("src").join("main.rs"), format!("// {name}\n")).unwrap();
        fs::write(dir.join("README.md"), format!("# {name}\n")).unwrap();
        dir
    }

    /// Declare `requires` edges and `libraries` references for a project.
    pub fn add_buildpath(&self, name: &str, requires: &[&str], libraries: &[&Path]) {
        let mut content = String::new();
        for library in libraries {
            content.push_str(&format!(
                "[[entry]]\nkind = \"library\"\npath = \"{}\"\n\n",
                library.display()
            ));
        }
        for required in requires {
            content.push_str(&format!(
                "[[entry]]\nkind = \"project\"\npath = \"{required}\"\n\n"
            ));
        }
        fs::write(self.path().join(name).join("buildpath.toml"), content).unwrap();
    }

    pub fn ignore(&mut self, name: &str) {
        self.ignored.push(name.to_string());
    }

    pub fn config(&self) -> Config {
        let mut config = Config::with_defaults(self.path());
        config.set_ignored_projects(self.ignored.iter().cloned());
        config
    }

    pub fn snapshotter(&self) -> Snapshotter {
        Snapshotter::new(&self.config()).expect("build snapshotter")
    }

    /// Archives produced for `project`, in no particular order.
    pub fn archives_of(&self, project: &str) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(self.snapshot_root()) else {
            return Vec::new();
        };
        entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                let name = p.file_name().unwrap_or_default().to_string_lossy();
                name.starts_with(&format!("{project}-")) && name.ends_with(".zip")
            })
            .collect()
    }
}

/// All entries of a zip archive as sorted (name, bytes) pairs.
pub fn zip_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
    let file = fs::File::open(path).expect("open archive");
    let mut archive = zip::ZipArchive::new(file).expect("read archive");
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        entries.push((entry.name().to_string(), bytes));
    }
    entries.sort();
    entries
}

/// Sorted entry names of a zip archive.
pub fn zip_names(path: &Path) -> Vec<String> {
    zip_entries(path).into_iter().map(|(name, _)| name).collect()
}
