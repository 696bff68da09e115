//! Workspace layout and build metadata
//!
//! A workspace is a directory whose immediate subdirectories are projects;
//! project identity is the directory name. A project may carry typed build
//! metadata in a `buildpath.toml` file at its root, listing classpath
//! entries:
//!
//! ```toml
//! [[entry]]
//! kind = "source"
//! path = "src"
//!
//! [[entry]]
//! kind = "library"
//! path = "/opt/jars/parser.jar"
//!
//! [[entry]]
//! kind = "project"
//! path = "sibling-lib"
//! ```
//!
//! `library` entries reference compiled binaries by filesystem path;
//! `project` entries declare a dependency edge on another workspace project
//! by name. A project without `buildpath.toml` has no typed metadata: no
//! external libraries, no required projects.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ShutterError, ShutterResult};

/// File name of the per-project build metadata
pub const BUILDPATH_FILE: &str = "buildpath.toml";

/// Classpath entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Source folder inside the project
    Source,
    /// Direct reference to a compiled library binary
    Library,
    /// Dependency on another workspace project (path is the project name)
    Project,
    /// Classpath container resolved by an external build system
    Container,
}

/// A single raw classpath entry: kind plus path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClasspathEntry {
    pub kind: EntryKind,
    pub path: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct Buildpath {
    #[serde(default, rename = "entry")]
    entries: Vec<ClasspathEntry>,
}

/// Provider of raw classpath entries and required-project edges.
///
/// Implemented by [`Workspace`] for on-disk projects and by mocks in tests.
pub trait ClasspathProvider {
    /// All raw classpath entries of `project`, in file order. A project
    /// without metadata yields an empty list; an unreadable or malformed
    /// metadata file is an error the caller recovers from locally.
    fn raw_entries(&self, project: &str) -> ShutterResult<Vec<ClasspathEntry>>;

    /// Names of workspace projects `project` depends on.
    fn required_project_names(&self, project: &str) -> ShutterResult<Vec<String>> {
        Ok(self
            .raw_entries(project)?
            .into_iter()
            .filter(|e| e.kind == EntryKind::Project)
            .map(|e| e.path.to_string_lossy().into_owned())
            .collect())
    }
}

/// An on-disk workspace: a root directory containing project directories.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of the named project (may not exist).
    pub fn project_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Whether a directory for `name` exists under the workspace root.
    pub fn contains(&self, name: &str) -> bool {
        self.project_dir(name).is_dir()
    }

    /// Map a path inside the workspace to the project it belongs to.
    pub fn project_of(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let first = relative.components().next()?;
        let name = first.as_os_str().to_str()?;
        if name.is_empty() || name.starts_with('.') {
            return None;
        }
        Some(name.to_string())
    }
}

impl ClasspathProvider for Workspace {
    fn raw_entries(&self, project: &str) -> ShutterResult<Vec<ClasspathEntry>> {
        let path = self.project_dir(project).join(BUILDPATH_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content =
            fs::read_to_string(&path).map_err(|e| ShutterError::metadata(project, e))?;
        let buildpath: Buildpath =
            toml::from_str(&content).map_err(|e| ShutterError::metadata(project, e))?;
        Ok(buildpath.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_buildpath(dir: &Path, project: &str, content: &str) {
        let project_dir = dir.join(project);
        fs::create_dir_all(&project_dir).unwrap();
        fs::write(project_dir.join(BUILDPATH_FILE), content).unwrap();
    }

    #[test]
    fn missing_metadata_yields_no_entries() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("plain")).unwrap();

        let ws = Workspace::new(dir.path());
        assert!(ws.raw_entries("plain").unwrap().is_empty());
        assert!(ws.required_project_names("plain").unwrap().is_empty());
    }

    #[test]
    fn parses_entries_and_kinds() {
        let dir = tempdir().unwrap();
        write_buildpath(
            dir.path(),
            "app",
            r#"
[[entry]]
kind = "source"
path = "src"

[[entry]]
kind = "library"
path = "/opt/jars/parser.jar"

[[entry]]
kind = "project"
path = "lib-core"
"#,
        );

        let ws = Workspace::new(dir.path());
        let entries = ws.raw_entries("app").unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].kind, EntryKind::Source);
        assert_eq!(entries[1].kind, EntryKind::Library);
        assert_eq!(entries[1].path, PathBuf::from("/opt/jars/parser.jar"));
        assert_eq!(ws.required_project_names("app").unwrap(), vec!["lib-core"]);
    }

    #[test]
    fn malformed_metadata_is_a_metadata_error() {
        let dir = tempdir().unwrap();
        write_buildpath(dir.path(), "broken", "[[entry]]\nkind = \"nonsense\"\npath = \"x\"");

        let ws = Workspace::new(dir.path());
        let err = ws.raw_entries("broken").unwrap_err();
        assert!(matches!(err, ShutterError::Metadata { .. }));
    }

    #[test]
    fn project_of_maps_paths_to_names() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path());

        let inside = dir.path().join("app").join("src").join("main.rs");
        assert_eq!(ws.project_of(&inside), Some("app".to_string()));

        let hidden = dir.path().join(".shutter").join("snapshots");
        assert_eq!(ws.project_of(&hidden), None);

        let outside = Path::new("/somewhere/else");
        assert_eq!(ws.project_of(outside), None);
    }

    #[test]
    fn contains_checks_directories_only() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("real")).unwrap();
        fs::write(dir.path().join("file"), "not a project").unwrap();

        let ws = Workspace::new(dir.path());
        assert!(ws.contains("real"));
        assert!(!ws.contains("file"));
        assert!(!ws.contains("ghost"));
    }
}
