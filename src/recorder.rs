//! Activity recorder
//!
//! Records that a snapshot was taken, for the replay/analysis pipeline that
//! consumes the archives. Events are appended as JSONL to `events.jsonl`
//! under the snapshot root; each event carries the archive file name, the
//! creation timestamp and a SHA-256 content hash of the finished archive so
//! consumers can detect truncated or tampered files.
//!
//! Recording is fire-and-forget: failures are logged and never propagate
//! into the snapshot job.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use log::error;
use sha2::{Digest, Sha256};

use crate::error::ShutterResult;

/// Sink for snapshot events.
pub trait ActivityRecorder {
    /// Record that the archive at `archive` was produced. Fire-and-forget.
    fn record_snapshot(&self, archive: &Path);
}

/// Appends snapshot events to a JSONL file.
#[derive(Debug)]
pub struct JsonlRecorder {
    path: PathBuf,
    /// Serializes appends from concurrent scheduler workers
    lock: Mutex<()>,
}

impl JsonlRecorder {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn append_event(&self, archive: &Path) -> ShutterResult<()> {
        let file_name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let event = serde_json::json!({
            "event": "snapshot",
            "archive": file_name,
            "sha256": hash_file(archive)?,
            "at": Utc::now().timestamp_millis(),
        });

        let _guard = self.lock.lock().unwrap();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{event}")?;
        Ok(())
    }
}

impl ActivityRecorder for JsonlRecorder {
    fn record_snapshot(&self, archive: &Path) {
        if let Err(err) = self.append_event(archive) {
            error!("failed to record snapshot event for {}: {err}", archive.display());
        }
    }
}

/// Streaming SHA-256 of a file, hex encoded.
fn hash_file(path: &Path) -> ShutterResult<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8 * 1024];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
