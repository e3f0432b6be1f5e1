//! Block-list synchronization: fetch, validate, filter, render, publish.

use crate::activity_log::ActivityLog;
use crate::blocklist;
use crate::config::ConfigStore;
use crate::error::{AdblockError, Result};
use crate::fetch::{FetchTimeouts, Fetcher};
use crate::hosts::HostsFileStore;
use std::sync::Arc;
use std::time::Duration;

/// Payloads smaller than this are treated as a failed download.
pub const MIN_PAYLOAD_BYTES: usize = 1000;

/// Hard cap on the fetch step, on top of the transport's own timeouts.
pub const FETCH_DEADLINE: Duration = Duration::from_secs(150);

/// Result of a successful sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Unix time recorded as the configuration's `last_update`.
    pub timestamp: i64,
    /// Number of block entries installed.
    pub domain_count: usize,
}

/// Runs syncs against the stores.
///
/// At most one sync runs at a time; a second call while one is in flight
/// fails immediately with [`AdblockError::SyncInProgress`] rather than
/// queueing.
///
/// Each step gates the next. When any step fails the hosts file and
/// `last_update` keep their previous values and the failure is written to
/// the activity log.
pub struct SyncPipeline {
    config: Arc<ConfigStore>,
    log: Arc<ActivityLog>,
    hosts: Arc<HostsFileStore>,
    fetcher: Arc<dyn Fetcher>,
    timeouts: FetchTimeouts,
    deadline: Duration,
    running: tokio::sync::Mutex<()>,
}

impl SyncPipeline {
    #[must_use]
    pub fn new(
        config: Arc<ConfigStore>,
        log: Arc<ActivityLog>,
        hosts: Arc<HostsFileStore>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            config,
            log,
            hosts,
            fetcher,
            timeouts: FetchTimeouts::default(),
            deadline: FETCH_DEADLINE,
            running: tokio::sync::Mutex::new(()),
        }
    }

    /// Overrides the transport timeouts and the fetch deadline.
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: FetchTimeouts, deadline: Duration) -> Self {
        self.timeouts = timeouts;
        self.deadline = deadline;
        self
    }

    /// Returns `true` while a sync is in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// Downloads `source_url` and installs it as the new hosts file.
    ///
    /// # Errors
    ///
    /// - [`AdblockError::SyncInProgress`] if another sync is running.
    /// - [`AdblockError::FetchFailed`] on transport failure or timeout.
    /// - [`AdblockError::InvalidPayload`] if fewer than
    ///   [`MIN_PAYLOAD_BYTES`] were downloaded.
    /// - [`AdblockError::Store`] if publishing or recording fails.
    pub async fn sync(&self, source_url: &str) -> Result<SyncOutcome> {
        let Ok(_running) = self.running.try_lock() else {
            tracing::warn!(url = source_url, "Sync requested while another is running");
            return Err(AdblockError::SyncInProgress);
        };

        self.log.note("Starting block-list update...");
        match self.run(source_url).await {
            Ok(outcome) => {
                tracing::info!(
                    url = source_url,
                    domains = outcome.domain_count,
                    "Sync complete"
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(url = source_url, error = %e, "Sync failed");
                self.log.note(&failure_message(&e));
                Err(e)
            }
        }
    }

    async fn run(&self, source_url: &str) -> Result<SyncOutcome> {
        let payload = self.fetch(source_url).await?;
        if payload.len() < MIN_PAYLOAD_BYTES {
            return Err(AdblockError::InvalidPayload {
                size: payload.len(),
            });
        }

        let lines = blocklist::filter(&String::from_utf8_lossy(&payload));
        let artifact = blocklist::render(&lines, chrono::Local::now().naive_local());
        self.publish(artifact).await?;

        let timestamp = chrono::Utc::now().timestamp();
        self.config.set_last_update(timestamp)?;

        let domain_count = lines.len();
        self.log
            .note(&format!("Update succeeded! Domains: {domain_count}"));
        Ok(SyncOutcome {
            timestamp,
            domain_count,
        })
    }

    // Multi-megabyte write plus fsync; keep it off the async workers.
    async fn publish(&self, artifact: String) -> Result<()> {
        let hosts = self.hosts.clone();
        tokio::task::spawn_blocking(move || hosts.publish(artifact.as_bytes()))
            .await
            .map_err(|e| {
                AdblockError::store(self.hosts.path(), std::io::Error::other(e.to_string()))
            })?
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        tokio::time::timeout(self.deadline, self.fetcher.fetch(url, self.timeouts))
            .await
            .map_err(|_| AdblockError::FetchFailed {
                reason: format!("no response within {}s", self.deadline.as_secs()),
            })?
    }
}

/// Activity-log text for a failed sync. Paths stay out of it; the log is
/// shown to users.
fn failure_message(e: &AdblockError) -> String {
    match e {
        AdblockError::FetchFailed { reason } => format!("Download failed: {reason}"),
        AdblockError::InvalidPayload { size } => {
            format!("Downloaded file is invalid ({size} bytes)")
        }
        AdblockError::Store { .. } if e.is_permission_denied() => {
            "Update failed: module directory is not writable".to_string()
        }
        // Only the kind: io errors from tempfile embed the temp file's path.
        AdblockError::Store { source, .. } => format!("Update failed: {}", source.kind()),
        other => format!("Update failed: {}", other.user_message()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity_log::DEFAULT_WINDOW;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeFetcher {
        response: std::result::Result<Vec<u8>, String>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn ok(payload: impl Into<Vec<u8>>) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(payload.into()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(reason: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Err(reason.to_string()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(payload: impl Into<Vec<u8>>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(payload.into()),
                delay,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn fetch(&self, _url: &str, _timeouts: FetchTimeouts) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.response
                .clone()
                .map_err(|reason| AdblockError::FetchFailed { reason })
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        config: Arc<ConfigStore>,
        log: Arc<ActivityLog>,
        hosts: Arc<HostsFileStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            Self {
                config: Arc::new(ConfigStore::new(dir.path().join("config.json"))),
                log: Arc::new(ActivityLog::new(dir.path().join("update.log"))),
                hosts: Arc::new(HostsFileStore::new(dir.path().join("system/etc/hosts"))),
                _dir: dir,
            }
        }

        fn pipeline(&self, fetcher: Arc<dyn Fetcher>) -> SyncPipeline {
            SyncPipeline::new(
                self.config.clone(),
                self.log.clone(),
                self.hosts.clone(),
                fetcher,
            )
        }

        fn messages(&self) -> Vec<String> {
            self.log
                .recent(DEFAULT_WINDOW)
                .into_iter()
                .map(|e| e.message)
                .collect()
        }
    }

    fn padded(payload: &str) -> String {
        let mut s = payload.to_string();
        while s.len() < MIN_PAYLOAD_BYTES {
            s.push_str("# padding padding padding padding padding\n");
        }
        s
    }

    #[tokio::test]
    async fn sync_filters_and_installs() {
        let fx = Fixture::new();
        let payload = padded(
            "0.0.0.0 ads.example.com\n# comment\n127.0.0.1 tracker.example.com\nnotahost\n",
        );
        let pipeline = fx.pipeline(FakeFetcher::ok(payload));

        let outcome = pipeline.sync("https://example.com/hosts").await.unwrap();
        assert_eq!(outcome.domain_count, 2);
        assert_eq!(fx.hosts.domain_count().unwrap(), 2);

        let installed = fx.hosts.read().unwrap().unwrap();
        assert_eq!(
            blocklist::entries(&installed),
            vec!["0.0.0.0 ads.example.com", "127.0.0.1 tracker.example.com"]
        );
        assert_eq!(fx.config.load().last_update, outcome.timestamp);
        assert_eq!(fx.messages()[0], "Update succeeded! Domains: 2");
    }

    #[tokio::test]
    async fn small_payload_is_rejected_without_side_effects() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline(FakeFetcher::ok(vec![b'x'; 400]));

        let err = pipeline.sync("https://example.com/hosts").await.unwrap_err();
        assert!(matches!(err, AdblockError::InvalidPayload { size: 400 }));
        assert!(!fx.hosts.is_installed());
        assert_eq!(fx.config.load().last_update, 0);
        assert_eq!(fx.messages()[0], "Downloaded file is invalid (400 bytes)");
    }

    #[tokio::test]
    async fn failure_keeps_previous_artifact() {
        let fx = Fixture::new();
        let good = padded("0.0.0.0 a.com\n0.0.0.0 b.com\n0.0.0.0 c.com\n");
        fx.pipeline(FakeFetcher::ok(good)).sync("u").await.unwrap();
        let before = fx.hosts.read().unwrap();
        let last_update = fx.config.load().last_update;

        let err = fx
            .pipeline(FakeFetcher::failing("dns error"))
            .sync("u")
            .await
            .unwrap_err();
        assert!(matches!(err, AdblockError::FetchFailed { .. }));
        assert_eq!(fx.hosts.read().unwrap(), before);
        assert_eq!(fx.hosts.domain_count().unwrap(), 3);
        assert_eq!(fx.config.load().last_update, last_update);
        assert_eq!(fx.messages()[0], "Download failed: dns error");
    }

    #[tokio::test]
    async fn publish_failure_keeps_last_update_and_hides_paths() {
        let dir = tempfile::tempdir().unwrap();
        // Parent of the hosts file is a regular file, so publishing fails.
        let blocker = dir.path().join("system");
        std::fs::write(&blocker, "not a dir").unwrap();

        let config = Arc::new(ConfigStore::new(dir.path().join("config.json")));
        let log = Arc::new(ActivityLog::new(dir.path().join("update.log")));
        let hosts = Arc::new(HostsFileStore::new(blocker.join("etc/hosts")));
        let pipeline = SyncPipeline::new(
            config.clone(),
            log.clone(),
            hosts.clone(),
            FakeFetcher::ok(padded("0.0.0.0 a.com\n")),
        );

        let err = pipeline.sync("u").await.unwrap_err();
        assert!(err.is_store_failure());
        assert_eq!(config.load().last_update, 0);
        assert!(!hosts.is_installed());

        let newest = &log.recent(DEFAULT_WINDOW)[0].message;
        assert!(newest.starts_with("Update failed: "), "{newest}");
        assert!(!newest.contains(dir.path().to_str().unwrap()), "{newest}");
        assert!(!newest.contains('/'), "{newest}");
    }

    #[test]
    fn store_failure_message_omits_path() {
        let err = AdblockError::store(
            "/data/adb/modules/adblock_hosts/system/etc/hosts",
            std::io::Error::other("disk full at path \"/data/adb/modules/adblock_hosts/.hosts.tmp\""),
        );
        assert_eq!(failure_message(&err), "Update failed: other error");

        let err = AdblockError::store(
            "/data/adb/modules/adblock_hosts/system/etc/hosts",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(
            failure_message(&err),
            "Update failed: module directory is not writable"
        );
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let fx = Fixture::new();
        let payload = padded("0.0.0.0 a.com\n127.0.0.1 b.com\n");
        let pipeline = fx.pipeline(FakeFetcher::ok(payload));

        pipeline.sync("u").await.unwrap();
        let first = blocklist::entries(&fx.hosts.read().unwrap().unwrap())
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        pipeline.sync("u").await.unwrap();
        let installed = fx.hosts.read().unwrap().unwrap();
        assert_eq!(blocklist::entries(&installed), first);
    }

    #[tokio::test]
    async fn overlapping_sync_is_rejected() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::slow(padded("0.0.0.0 a.com\n"), Duration::from_millis(300));
        let pipeline = Arc::new(fx.pipeline(fetcher.clone()));

        let first = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.sync("u").await })
        };
        while !pipeline.is_running() {
            tokio::task::yield_now().await;
        }

        let err = pipeline.sync("u").await.unwrap_err();
        assert!(matches!(err, AdblockError::SyncInProgress));

        first.await.unwrap().unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(!pipeline.is_running());
    }

    #[tokio::test]
    async fn deadline_turns_into_fetch_failure() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::slow(padded(""), Duration::from_secs(5));
        let pipeline = fx
            .pipeline(fetcher)
            .with_timeouts(FetchTimeouts::default(), Duration::from_millis(50));

        let err = pipeline.sync("u").await.unwrap_err();
        assert!(matches!(err, AdblockError::FetchFailed { .. }));
        assert!(!fx.hosts.is_installed());
    }
}
