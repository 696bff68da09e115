//! Archive construction and mutation
//!
//! `export` builds the base zip archive of a project's resource tree;
//! `merge` injects external library binaries into an already-produced
//! archive without corrupting it.

pub mod export;
pub mod merge;

pub use export::{ProjectArchiver, ZipExporter};
pub use merge::merge_libraries;
