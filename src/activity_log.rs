//! User-facing activity log (`update.log`).
//!
//! One entry per line, `[<unix-ts>] <message>`. Entries are only ever
//! appended; the file is removed as a whole by [`ActivityLog::clear`].

use crate::error::{AdblockError, Result};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Maximum number of entries returned by [`ActivityLog::recent`] by default.
pub const DEFAULT_WINDOW: usize = 100;

/// A single log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Unix time the entry was written.
    #[serde(rename = "time")]
    pub timestamp: i64,

    #[serde(rename = "msg")]
    pub message: String,
}

impl LogEntry {
    /// Parses `[<ts>] <message>`; `None` for anything else.
    fn parse(line: &str) -> Option<Self> {
        let rest = line.trim().strip_prefix('[')?;
        let (ts, message) = rest.split_once("] ")?;
        if message.is_empty() || ts.is_empty() || !ts.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self {
            timestamp: ts.parse().ok()?,
            message: message.to_string(),
        })
    }
}

/// Append-only log backed by a text file.
pub struct ActivityLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ActivityLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `message` stamped with the current time.
    ///
    /// Line breaks inside `message` are flattened so one call is always one
    /// entry.
    ///
    /// # Errors
    ///
    /// Returns [`AdblockError::Store`] if the directory or file cannot be
    /// created or written.
    pub fn append(&self, message: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| AdblockError::store(dir, e))?;
        }

        let line = format!(
            "[{}] {}\n",
            chrono::Utc::now().timestamp(),
            message.replace(['\r', '\n'], " ")
        );

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()))
            .map_err(|e| AdblockError::store(&self.path, e))
    }

    /// Appends, downgrading a failure to a tracing warning.
    ///
    /// For call sites where losing a log line must not change the outcome
    /// of the operation being logged.
    pub fn note(&self, message: &str) {
        if let Err(e) = self.append(message) {
            tracing::warn!(error = %e, entry = message, "Failed to write activity log");
        }
    }

    /// Returns up to `limit` entries, newest first.
    ///
    /// Lines that do not parse are skipped. A missing or unreadable file
    /// reads as empty.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        let content = match std::fs::read(&self.path) {
            Ok(data) => String::from_utf8_lossy(&data).into_owned(),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "Failed to read activity log");
                }
                return Vec::new();
            }
        };

        content
            .lines()
            .rev()
            .filter_map(LogEntry::parse)
            .take(limit)
            .collect()
    }

    /// Removes every entry. Clearing an empty log is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`AdblockError::Store`] if the file exists but cannot be
    /// removed.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "Cleared activity log");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AdblockError::store(&self.path, e)),
        }
    }
}
