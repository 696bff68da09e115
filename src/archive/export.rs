//! Base archive export
//!
//! Builds the initial zip archive of a project's resource tree. Entries are
//! named `{project}/{relative path}` with forward slashes, so the archive
//! unpacks with the project directory as leading structure. The walk honors
//! `.gitignore`/`.ignore` files and skips hidden entries, the same filtering
//! the rest of the toolchain applies to project sources.

use std::fs;
use std::path::{Component, Path};

use ignore::WalkBuilder;
use log::warn;
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{ShutterError, ShutterResult};

/// Builder of a project's base archive.
///
/// Synchronous and blocking; overwrites the destination. Implemented by
/// [`ZipExporter`] for real projects and by mocks in tests.
pub trait ProjectArchiver {
    fn build(&self, project_dir: &Path, project: &str, dest: &Path) -> ShutterResult<()>;
}

/// Walks the project tree and writes a deflate-compressed zip.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipExporter;

impl ZipExporter {
    pub fn new() -> Self {
        Self
    }
}

impl ProjectArchiver for ZipExporter {
    fn build(&self, project_dir: &Path, project: &str, dest: &Path) -> ShutterResult<()> {
        if !project_dir.is_dir() {
            return Err(ShutterError::UnknownProject {
                name: project.to_string(),
            });
        }

        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let tmp = NamedTempFile::new_in(parent)?;
        let mut writer = ZipWriter::new(tmp);
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let walk = WalkBuilder::new(project_dir)
            .sort_by_file_path(|a, b| a.cmp(b))
            .build();

        for result in walk {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping unreadable path under {}: {err}", project_dir.display());
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(project_dir)
                .unwrap_or(entry.path());
            let name = entry_name(project, relative);

            writer.start_file(name, options)?;
            let mut file = fs::File::open(entry.path())?;
            std::io::copy(&mut file, &mut writer)?;
        }

        let tmp = writer.finish()?;
        tmp.persist(dest).map_err(|e| ShutterError::Io(e.error))?;
        Ok(())
    }
}

/// Forward-slash entry name with the project as leading path segment.
fn entry_name(project: &str, relative: &Path) -> String {
    let mut name = String::from(project);
    for component in relative.components() {
        if let Component::Normal(part) = component {
            name.push('/');
            name.push_str(&part.to_string_lossy());
        }
    }
    name
}
