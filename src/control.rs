//! Control operations behind the HTTP API.
//!
//! Each method is one endpoint's worth of logic, free of any HTTP types so
//! it can be driven directly from tests.

use crate::activity_log::{ActivityLog, DEFAULT_WINDOW, LogEntry};
use crate::config::ConfigStore;
use crate::error::{AdblockError, Result};
use crate::fetch::Fetcher;
use crate::hosts::HostsFileStore;
use crate::layout::ModuleLayout;
use crate::sync::{SyncOutcome, SyncPipeline};
use serde::Serialize;
use std::sync::Arc;

/// Snapshot returned by [`ControlApi::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub enabled: bool,
    pub source_url: String,
    pub domain_count: usize,
    pub last_update: i64,
    /// Time the snapshot was taken.
    pub last_check: i64,
}

/// Shared handle to the stores and the sync pipeline.
pub struct ControlApi {
    config: Arc<ConfigStore>,
    log: Arc<ActivityLog>,
    hosts: Arc<HostsFileStore>,
    pipeline: SyncPipeline,
}

impl ControlApi {
    /// Wires the stores for `layout` to `fetcher`.
    #[must_use]
    pub fn new(layout: &ModuleLayout, fetcher: Arc<dyn Fetcher>) -> Self {
        let config = Arc::new(ConfigStore::new(layout.config_path()));
        let log = Arc::new(ActivityLog::new(layout.log_path()));
        let hosts = Arc::new(HostsFileStore::new(layout.hosts_path()));
        let pipeline = SyncPipeline::new(config.clone(), log.clone(), hosts.clone(), fetcher);
        Self::from_parts(config, log, hosts, pipeline)
    }

    /// Builds from already constructed parts; `pipeline` should share the
    /// same stores.
    #[must_use]
    pub const fn from_parts(
        config: Arc<ConfigStore>,
        log: Arc<ActivityLog>,
        hosts: Arc<HostsFileStore>,
        pipeline: SyncPipeline,
    ) -> Self {
        Self {
            config,
            log,
            hosts,
            pipeline,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    #[must_use]
    pub fn activity_log(&self) -> &ActivityLog {
        &self.log
    }

    #[must_use]
    pub fn hosts(&self) -> &HostsFileStore {
        &self.hosts
    }

    /// # Errors
    ///
    /// Returns [`AdblockError::Store`] if the hosts file cannot be read.
    pub fn status(&self) -> Result<Status> {
        let cfg = self.config.load();
        Ok(Status {
            enabled: cfg.enabled,
            source_url: cfg.source_url,
            domain_count: self.hosts.domain_count()?,
            last_update: cfg.last_update,
            last_check: chrono::Utc::now().timestamp(),
        })
    }

    /// The newest activity-log entries, newest first.
    #[must_use]
    pub fn logs(&self) -> Vec<LogEntry> {
        self.log.recent(DEFAULT_WINDOW)
    }

    /// # Errors
    ///
    /// Returns [`AdblockError::Store`] if the configuration cannot be saved.
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.config.set_enabled(enabled)?;
        self.log.note(if enabled {
            "Blocking enabled"
        } else {
            "Blocking disabled"
        });
        tracing::info!(enabled, "Toggled blocking");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`AdblockError::EmptyUrl`] for an empty `url`, or
    /// [`AdblockError::Store`] if the configuration cannot be saved.
    pub fn set_source(&self, url: &str) -> Result<()> {
        self.config.set_source_url(url)?;
        self.log.note(&format!("Source updated: {url}"));
        tracing::info!(url, "Changed block-list source");
        Ok(())
    }

    /// Runs a sync against the stored source URL.
    ///
    /// # Errors
    ///
    /// Returns [`AdblockError::Disabled`] without touching the network when
    /// blocking is off, otherwise whatever [`SyncPipeline::sync`] returns.
    pub async fn trigger_update(&self) -> Result<SyncOutcome> {
        let cfg = self.config.load();
        if !cfg.enabled {
            return Err(AdblockError::Disabled);
        }
        self.pipeline.sync(&cfg.source_url).await
    }

    /// # Errors
    ///
    /// Returns [`AdblockError::Store`] if the log exists but cannot be
    /// removed.
    pub fn clear_log(&self) -> Result<()> {
        self.log.clear()
    }
}
