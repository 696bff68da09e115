//! Shutter - workspace project snapshot tool
//!
//! Shutter captures point-in-time zip archives of workspace projects and
//! their external binary dependencies, recursively covering transitively
//! required sibling projects, so development activity can be replayed and
//! analyzed later.

pub mod archive;
pub mod config;
pub mod error;
pub mod ledger;
pub mod recorder;
pub mod scheduler;
pub mod session;
pub mod snapshot;
pub mod watcher;
pub mod workspace;

// Re-exports for convenience
pub use archive::{merge_libraries, ProjectArchiver, ZipExporter};
pub use config::Config;
pub use error::{ShutterError, ShutterResult};
pub use ledger::ProjectLedger;
pub use recorder::{ActivityRecorder, JsonlRecorder};
pub use scheduler::KeyedScheduler;
pub use session::{session, SessionOp, SessionPhase, SessionState};
pub use snapshot::Snapshotter;
pub use watcher::{watch, WatchEvent, WatchOptions};
pub use workspace::{ClasspathEntry, ClasspathProvider, EntryKind, Workspace};
