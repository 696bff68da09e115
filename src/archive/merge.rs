//! Archive merge
//!
//! Merges a set of external library binaries into an existing zip archive:
//! every existing entry is streamed into a fresh archive verbatim, each
//! library that exists on disk is appended under `libs/`, and the fresh
//! archive atomically replaces the original. The original file is never
//! observable in a partially-written state; on failure it is left untouched.
//!
//! A library path that does not exist on disk denotes an in-workspace
//! artifact already covered by the base archive and is skipped. An entry
//! name collision is resolved by deterministic renaming (`libs/name-1.ext`,
//! `libs/name-2.ext`, ...), never by clobbering or dropping bytes.

use std::collections::HashSet;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use log::warn;
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{ShutterError, ShutterResult};

/// Path segment under which merged library entries live
pub const LIB_DIR: &str = "libs";

/// Fixed copy buffer size for streaming existing entries
const COPY_BUF: usize = 8 * 1024;

/// Merge `libraries` into the zip archive at `archive_path`.
///
/// Existing entries are preserved byte-identically. A read failure on an
/// individual entry skips that entry only; any other I/O error aborts the
/// merge and leaves the original archive untouched.
pub fn merge_libraries(archive_path: &Path, libraries: &[impl AsRef<Path>]) -> ShutterResult<()> {
    let source = fs::File::open(archive_path)?;
    let mut existing = ZipArchive::new(source)?;

    let parent = archive_path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = NamedTempFile::new_in(parent)?;
    let mut writer = ZipWriter::new(tmp);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut taken: HashSet<String> = HashSet::new();

    for index in 0..existing.len() {
        let mut entry = match existing.by_index(index) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(
                    "skipping unreadable entry #{index} of {}: {err}",
                    archive_path.display()
                );
                continue;
            }
        };
        let name = entry.name().to_string();

        if entry.is_dir() {
            writer.add_directory(name.trim_end_matches('/').to_string(), options)?;
            taken.insert(name);
            continue;
        }

        writer.start_file(name.clone(), options)?;
        if let Err(err) = copy_entry(&mut entry, &mut writer) {
            warn!(
                "skipping unreadable entry '{name}' of {}: {err}",
                archive_path.display()
            );
            writer.abort_file()?;
            continue;
        }
        taken.insert(name);
    }

    for library in libraries {
        let library = library.as_ref();
        if !library.exists() {
            // In-workspace artifact, already captured by the base archive.
            continue;
        }
        let Some(base) = library.file_name() else {
            continue;
        };

        let desired = format!("{LIB_DIR}/{}", base.to_string_lossy());
        let name = unique_entry_name(&taken, &desired);
        if name != desired {
            warn!(
                "entry '{desired}' already present in {}; storing {} as '{name}'",
                archive_path.display(),
                library.display()
            );
        }

        writer.start_file(name.clone(), options)?;
        let mut file = fs::File::open(library)?;
        std::io::copy(&mut file, &mut writer)?;
        taken.insert(name);
    }

    let tmp = writer.finish()?;
    tmp.persist(archive_path)
        .map_err(|e| ShutterError::Io(e.error))?;
    Ok(())
}

/// Stream `reader` into `writer` through a fixed-size buffer.
fn copy_entry<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> std::io::Result<u64> {
    let mut buf = [0u8; COPY_BUF];
    let mut total = 0u64;
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            return Ok(total);
        }
        writer.write_all(&buf[..read])?;
        total += read as u64;
    }
}

/// First entry name not in `taken`: `desired`, else `stem-1.ext`, `stem-2.ext`, ...
fn unique_entry_name(taken: &HashSet<String>, desired: &str) -> String {
    if !taken.contains(desired) {
        return desired.to_string();
    }

    let dot = match desired.rfind('.') {
        Some(pos) if pos > desired.rfind('/').map_or(0, |s| s + 1) => pos,
        _ => desired.len(),
    };
    let (stem, ext) = desired.split_at(dot);

    let mut counter = 1u32;
    loop {
        let candidate = format!("{stem}-{counter}{ext}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}
