//! Durable user configuration.

use crate::error::{AdblockError, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Block-list fetched when the user has not chosen another source.
pub const DEFAULT_SOURCE_URL: &str = "https://raw.githubusercontent.com/StevenBlack/hosts/master/hosts";

/// The persisted control state.
///
/// Every field has a default, so a partially written or older file still
/// loads into a fully defined record.
///
/// # Example
///
/// ```
/// use hosts_adblock::Configuration;
///
/// let cfg: Configuration = serde_json::from_str(r#"{"enabled": false}"#).unwrap();
/// assert!(!cfg.enabled);
/// assert_eq!(cfg.last_update, 0);
/// assert!(!cfg.source_url.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Whether updates are allowed to run.
    pub enabled: bool,

    /// Block-list URL fed to the sync pipeline.
    pub source_url: String,

    /// Unix time of the last successful sync, `0` if never.
    pub last_update: i64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            enabled: true,
            source_url: DEFAULT_SOURCE_URL.to_string(),
            last_update: 0,
        }
    }
}

/// Reads and writes `config.json`.
///
/// Nothing is cached: every [`load`](Self::load) goes back to disk, so the
/// file is the only source of truth across restarts. Read-modify-write
/// updates are serialized by an internal lock so that concurrent setters
/// (a toggle racing a sync writing `last_update`) never drop each other's
/// changes.
pub struct ConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ConfigStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the persisted configuration.
    ///
    /// A missing, unreadable or corrupt file yields the defaults; this never
    /// fails.
    #[must_use]
    pub fn load(&self) -> Configuration {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "Failed to read config, using defaults");
                }
                return Configuration::default();
            }
        };

        serde_json::from_slice(&data).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "Corrupt config, using defaults");
            Configuration::default()
        })
    }

    /// Persists the whole record.
    ///
    /// # Errors
    ///
    /// Returns [`AdblockError::Store`] if the file cannot be written.
    pub fn save(&self, cfg: &Configuration) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write(cfg)
    }

    /// Loads, applies `f`, and persists under the store lock.
    ///
    /// Returns the record as written.
    ///
    /// # Errors
    ///
    /// Returns [`AdblockError::Store`] if the file cannot be written.
    pub fn update(&self, f: impl FnOnce(&mut Configuration)) -> Result<Configuration> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut cfg = self.load();
        f(&mut cfg);
        self.write(&cfg)?;
        Ok(cfg)
    }

    /// # Errors
    ///
    /// Returns [`AdblockError::Store`] if the file cannot be written.
    pub fn set_enabled(&self, enabled: bool) -> Result<Configuration> {
        self.update(|cfg| cfg.enabled = enabled)
    }

    /// Stores a new source URL. The URL is not checked beyond being
    /// non-empty; a bad URL surfaces on the next sync.
    ///
    /// # Errors
    ///
    /// Returns [`AdblockError::EmptyUrl`] for an empty `url` (the stored
    /// value is left untouched), or [`AdblockError::Store`] on write failure.
    pub fn set_source_url(&self, url: &str) -> Result<Configuration> {
        if url.is_empty() {
            return Err(AdblockError::EmptyUrl);
        }
        self.update(|cfg| cfg.source_url = url.to_string())
    }

    /// # Errors
    ///
    /// Returns [`AdblockError::Store`] if the file cannot be written.
    pub fn set_last_update(&self, timestamp: i64) -> Result<Configuration> {
        self.update(|cfg| cfg.last_update = timestamp)
    }

    /// Resets an empty stored source URL to [`DEFAULT_SOURCE_URL`].
    ///
    /// Returns `true` if the file was rewritten.
    ///
    /// # Errors
    ///
    /// Returns [`AdblockError::Store`] if the file cannot be written.
    pub fn ensure_source_url(&self) -> Result<bool> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut cfg = self.load();
        if !cfg.source_url.is_empty() {
            return Ok(false);
        }
        cfg.source_url = DEFAULT_SOURCE_URL.to_string();
        self.write(&cfg)?;
        Ok(true)
    }

    // Callers hold `write_lock`.
    //
    // The temp file is created owner-only (tempfile uses 0600) and renamed
    // into place, so the URL is never world-readable, not even mid-write.
    fn write(&self, cfg: &Configuration) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| AdblockError::store(dir, e))?;

        let data = serde_json::to_vec_pretty(cfg)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".config.")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| AdblockError::store(dir, e))?;
        tmp.write_all(&data)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| AdblockError::store(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| AdblockError::store(&self.path, e.error))?;

        tracing::debug!(
            path = %self.path.display(),
            enabled = cfg.enabled,
            last_update = cfg.last_update,
            "Saved config"
        );
        Ok(())
    }
}
