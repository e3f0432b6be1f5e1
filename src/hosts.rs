//! The installed hosts file.
//!
//! The file is read by the system resolver at any time, so it is only ever
//! replaced by renaming a fully written sibling over it. A reader sees the
//! old file or the new one, never a truncated mix.

use crate::blocklist;
use crate::error::{AdblockError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Manages the generated hosts file.
///
/// # Example
///
/// ```rust,ignore
/// use hosts_adblock::HostsFileStore;
///
/// let store = HostsFileStore::new("/data/adb/modules/adblock_hosts/system/etc/hosts");
/// store.publish(b"# AdBlock Hosts\n...")?;
/// let n = store.domain_count()?;
/// ```
pub struct HostsFileStore {
    path: PathBuf,
}

impl HostsFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if a hosts file is installed.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.path.is_file()
    }

    /// Number of block entries in the installed file, `0` if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`AdblockError::Store`] if the file exists but cannot be read.
    pub fn domain_count(&self) -> Result<usize> {
        Ok(self.read()?.map_or(0, |content| blocklist::count(&content)))
    }

    /// Reads the installed file, `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`AdblockError::Store`] on any I/O error other than
    /// `NotFound`.
    pub fn read(&self) -> Result<Option<String>> {
        match std::fs::read(&self.path) {
            Ok(data) => Ok(Some(String::from_utf8_lossy(&data).into_owned())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AdblockError::store(&self.path, e)),
        }
    }

    /// Atomically replaces the installed file with `content`.
    ///
    /// The content goes to a temporary file in the same directory, is
    /// flushed to disk, made world-readable, and renamed over the target.
    /// On failure the previous file is left untouched and the temporary
    /// file is removed.
    ///
    /// # Errors
    ///
    /// Returns [`AdblockError::Store`] if any step fails.
    pub fn publish(&self, content: &[u8]) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| AdblockError::store(dir, e))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".hosts.")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| AdblockError::store(dir, e))?;

        tmp.write_all(content)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| AdblockError::store(tmp.path(), e))?;
        make_world_readable(tmp.as_file()).map_err(|e| AdblockError::store(tmp.path(), e))?;

        tmp.persist(&self.path)
            .map_err(|e| AdblockError::store(&self.path, e.error))?;

        tracing::info!(
            path = %self.path.display(),
            bytes = content.len(),
            "Published hosts file"
        );
        Ok(())
    }
}

#[cfg(unix)]
fn make_world_readable(file: &std::fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn make_world_readable(_file: &std::fs::File) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn artifact(n: usize) -> String {
        let lines: Vec<String> = (0..n).map(|i| format!("0.0.0.0 host{i}.example.com")).collect();
        blocklist::render(&lines, chrono::Local::now().naive_local())
    }

    #[test]
    fn count_is_zero_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = HostsFileStore::new(dir.path().join("system/etc/hosts"));
        assert!(!store.is_installed());
        assert_eq!(store.domain_count().unwrap(), 0);
        assert_eq!(store.read().unwrap(), None);
    }

    #[test]
    fn publish_creates_dirs_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let store = HostsFileStore::new(dir.path().join("system/etc/hosts"));

        store.publish(artifact(3).as_bytes()).unwrap();
        assert!(store.is_installed());
        assert_eq!(store.domain_count().unwrap(), 3);
    }

    #[test]
    fn publish_overwrites_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = HostsFileStore::new(dir.path().join("hosts"));

        store.publish(artifact(5).as_bytes()).unwrap();
        store.publish(artifact(2).as_bytes()).unwrap();
        assert_eq!(store.domain_count().unwrap(), 2);

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["hosts"]);
    }

    #[cfg(unix)]
    #[test]
    fn published_file_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = HostsFileStore::new(dir.path().join("hosts"));
        store.publish(artifact(1).as_bytes()).unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn publish_into_unwritable_location_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        // Parent is a regular file, so the directory cannot be created.
        let blocker = dir.path().join("system");
        std::fs::write(&blocker, "not a dir").unwrap();

        let store = HostsFileStore::new(blocker.join("etc/hosts"));
        let err = store.publish(b"x").unwrap_err();
        assert!(err.is_store_failure());
        assert_eq!(std::fs::read_to_string(&blocker).unwrap(), "not a dir");
    }

    #[test]
    fn concurrent_readers_see_old_or_new() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(HostsFileStore::new(dir.path().join("hosts")));
        store.publish(artifact(10).as_bytes()).unwrap();

        let reader = {
            let store = store.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    let n = store.domain_count().unwrap();
                    assert!(n == 10 || n == 2000, "observed partial count {n}");
                }
            })
        };

        for i in 0..20 {
            let n = if i % 2 == 0 { 2000 } else { 10 };
            store.publish(artifact(n).as_bytes()).unwrap();
        }
        reader.join().unwrap();
    }
}
