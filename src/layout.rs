//! Location of the module's durable files.
//!
//! The data root is resolved once at startup and handed to every store, so
//! no component probes the filesystem for it afterwards.

use crate::error::{AdblockError, Result};
use std::path::{Path, PathBuf};

/// Module identifier, used as the directory name under each probe location.
pub const MODULE_ID: &str = "adblock_hosts";

/// Parent directories probed, in order, when no root is given explicitly.
const PROBE_PARENTS: [&str; 3] = [
    "/data/adb/ksu/modules",
    "/data/adb/modules",
    "/data/local/tmp",
];

/// Root used when none of the probe locations exist.
const DEFAULT_PARENT: &str = "/data/adb/modules";

const CONFIG_FILE: &str = "config.json";
const HOSTS_FILE: &str = "system/etc/hosts";
const LOG_FILE: &str = "update.log";
const WEB_ROOT: &str = "webroot";

/// Immutable set of paths derived from the module root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLayout {
    root: PathBuf,
}

impl ModuleLayout {
    /// Resolves the module root.
    ///
    /// An explicit `root` always wins. Otherwise the first existing
    /// `<parent>/adblock_hosts` directory among the well-known install
    /// locations is used, falling back to `/data/adb/modules/adblock_hosts`.
    #[must_use]
    pub fn discover(root: Option<PathBuf>) -> Self {
        if let Some(root) = root {
            return Self::with_root(root);
        }

        let found = PROBE_PARENTS
            .iter()
            .map(|parent| Path::new(parent).join(MODULE_ID))
            .find(|candidate| candidate.is_dir());

        match found {
            Some(root) => {
                tracing::debug!(root = %root.display(), "Found module root");
                Self::with_root(root)
            }
            None => {
                let root = Path::new(DEFAULT_PARENT).join(MODULE_ID);
                tracing::debug!(root = %root.display(), "No module root found, using default");
                Self::with_root(root)
            }
        }
    }

    /// Uses `root` as-is (useful for testing).
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/config.json`
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// `<root>/system/etc/hosts`, the file overlaid onto the system table.
    #[must_use]
    pub fn hosts_path(&self) -> PathBuf {
        self.root.join(HOSTS_FILE)
    }

    /// `<root>/update.log`
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }

    /// Directory the static UI is served from.
    #[must_use]
    pub fn web_root(&self) -> PathBuf {
        self.root.join(WEB_ROOT)
    }

    /// Creates the root and the hosts directory if missing.
    ///
    /// # Errors
    ///
    /// Returns [`AdblockError::Store`] if a directory cannot be created.
    pub fn ensure_dirs(&self) -> Result<()> {
        let hosts_path = self.hosts_path();
        let dirs = [Some(self.root.as_path()), hosts_path.parent()];
        for dir in dirs.into_iter().flatten() {
            std::fs::create_dir_all(dir).map_err(|e| AdblockError::store(dir, e))?;
        }
        Ok(())
    }
}
