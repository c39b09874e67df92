//! JSONL audit log writer with daily file rotation.

use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{NaiveDate, Utc};

use super::{AuditEntry, AuditLogger};
use crate::{AppError, Result};

/// Open file for the current day.
struct DailyFile {
    date: NaiveDate,
    writer: BufWriter<File>,
}

/// A daily-rotating JSONL audit log writer.
///
/// Appends one JSON object per line to `<log_dir>/audit-YYYY-MM-DD.jsonl`.
/// A new file is opened on the first write after the calendar date changes.
pub struct JsonlAuditWriter {
    log_dir: PathBuf,
    current: Mutex<Option<DailyFile>>,
}

impl JsonlAuditWriter {
    /// Construct a writer that stores logs in `log_dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the directory cannot be created.
    pub fn new(log_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&log_dir).map_err(|e| {
            AppError::Io(format!(
                "failed to create audit log directory {}: {e}",
                log_dir.display()
            ))
        })?;
        Ok(Self {
            log_dir,
            current: Mutex::new(None),
        })
    }

    /// Path of the log file for `date`.
    #[must_use]
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        file_for(&self.log_dir, date)
    }
}

fn file_for(log_dir: &Path, date: NaiveDate) -> PathBuf {
    log_dir.join(format!("audit-{date}.jsonl"))
}

fn open_append(path: &Path) -> Result<BufWriter<File>> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(BufWriter::new)
        .map_err(|e| AppError::Io(format!("failed to open audit log {}: {e}", path.display())))
}

impl AuditLogger for JsonlAuditWriter {
    fn log_entry(&self, entry: AuditEntry) -> Result<()> {
        let line = serde_json::to_string(&entry)
            .map_err(|e| AppError::Io(format!("failed to serialize audit entry: {e}")))?;
        let today = Utc::now().date_naive();

        let mut guard = self
            .current
            .lock()
            .map_err(|_| AppError::Io("audit writer mutex poisoned".into()))?;

        let file = match guard.take() {
            Some(file) if file.date == today => file,
            _ => DailyFile {
                date: today,
                writer: open_append(&file_for(&self.log_dir, today))?,
            },
        };
        let file = guard.insert(file);

        writeln!(file.writer, "{line}")
            .and_then(|()| file.writer.flush())
            .map_err(|e| AppError::Io(format!("audit write failed: {e}")))
    }
}
