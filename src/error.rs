//! Error types for Shutter
//!
//! Uses `thiserror` for library errors. Snapshot jobs run asynchronously, so
//! most of these are logged at the point of failure rather than returned to
//! the original caller.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Shutter operations
pub type ShutterResult<T> = Result<T, ShutterError>;

/// Main error type for Shutter operations
#[derive(Error, Debug)]
pub enum ShutterError {
    /// Build metadata for a project could not be read or parsed.
    /// Recovered locally: the project is treated as having no external
    /// libraries and no required projects.
    #[error("build metadata unreadable for project '{project}': {message}")]
    Metadata { project: String, message: String },

    /// Building or merging an archive for a project failed. That project's
    /// snapshot is considered failed; sibling and dependency traversal
    /// continue unaffected.
    #[error("archive operation failed for project '{project}': {message}")]
    Archive { project: String, message: String },

    /// Configuration file unreadable or malformed
    #[error("invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// Project ledger unreadable or malformed
    #[error("project ledger error: {message}")]
    Ledger { message: String },

    /// Project directory does not exist under the workspace root
    #[error("project '{name}' not found in workspace")]
    UnknownProject { name: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip container error
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl ShutterError {
    /// Wrap any displayable failure as an archive error for `project`.
    pub fn archive(project: &str, err: impl std::fmt::Display) -> Self {
        ShutterError::Archive {
            project: project.to_string(),
            message: err.to_string(),
        }
    }

    /// Wrap any displayable failure as a metadata error for `project`.
    pub fn metadata(project: &str, err: impl std::fmt::Display) -> Self {
        ShutterError::Metadata {
            project: project.to_string(),
            message: err.to_string(),
        }
    }
}
