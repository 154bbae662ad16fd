// SessionLog - CSV backup of every record seen during a session
//
// One file per process start, named after the session start time.
// Rows are appended and flushed one at a time so a power cut loses at most
// the record being written.

use crate::record::{session_stamp, Record};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tracing::info;

/// Header row of every session file
pub const CSV_HEADER: &str = "mac,rssi,snr,timestamp";

/// Mac prefix marking BLE rows
const BLE_ROW_PREFIX: &str = "BLE-";

/// Errors from session log operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create log directory {path}: {reason}")]
    CreateDirFailed { path: String, reason: String },

    #[error("Failed to open session file {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("Write failed: {0}")]
    WriteFailed(String),
}

/// Configuration for the session log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Write the CSV log at all
    pub enabled: bool,
    /// Directory holding session files
    pub directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from("macs_csv"),
        }
    }
}

impl StorageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_directory<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.directory = dir.as_ref().to_path_buf();
        self
    }
}

/// Append-only CSV file for one session
pub struct SessionLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    rows: AtomicU64,
}

impl SessionLog {
    /// Create `<dir>/macs_<session stamp>.csv`, creating `dir` if needed
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| StorageError::CreateDirFailed {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::open(dir.join(format!("macs_{}.csv", session_stamp())))
    }

    /// Open (or continue) a session file at an explicit path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let open_failed = |e: std::io::Error| StorageError::OpenFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(open_failed)?;
        let is_new = file.metadata().map_err(open_failed)?.len() == 0;

        let mut writer = BufWriter::new(file);
        if is_new {
            writeln!(writer, "{}", CSV_HEADER)
                .and_then(|_| writer.flush())
                .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        }

        info!(path = %path.display(), "session log opened");
        Ok(Self {
            path,
            writer: Mutex::new(writer),
            rows: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of rows appended by this handle
    pub fn rows_written(&self) -> u64 {
        self.rows.load(Ordering::Relaxed)
    }

    /// Append one record as a CSV row and flush it
    pub fn append(&self, record: &Record) -> Result<(), StorageError> {
        let row = Self::format_row(record);
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writer
            .write_all(row.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        self.rows.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// `mac,rssi,snr,timestamp` with an empty snr for BLE rows
    pub fn format_row(record: &Record) -> String {
        let prefix = if record.is_ble() { BLE_ROW_PREFIX } else { "" };
        let snr = record.snr().map(|s| s.to_string()).unwrap_or_default();
        format!(
            "{}{},{},{},{}\n",
            prefix,
            record.mac(),
            record.rssi(),
            snr,
            record.timestamp()
        )
    }
}
