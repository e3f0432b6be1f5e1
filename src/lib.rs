//! # hosts-adblock
//!
//! Control plane for hosts-file ad blocking.
//!
//! A block-list is downloaded from a configurable source, reduced to its
//! `0.0.0.0 <host>` / `127.0.0.1 <host>` lines, rendered into a hosts file
//! and installed atomically where the system resolver picks it up. A small
//! JSON API on a loopback port drives it and serves the web UI.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use hosts_adblock::{ControlApi, HttpFetcher, ModuleLayout};
//! use std::sync::Arc;
//!
//! let layout = ModuleLayout::discover(None);
//! let api = ControlApi::new(&layout, Arc::new(HttpFetcher::new()));
//!
//! api.set_source("https://example.com/hosts")?;
//! let outcome = api.trigger_update().await?;
//! println!("{} domains blocked", outcome.domain_count);
//! ```
//!
//! ## On-disk layout
//!
//! Everything lives under the module root (see [`ModuleLayout`]):
//!
//! ```text
//! config.json          # enabled flag, source URL, last update (0600)
//! update.log           # [<unix-ts>] <message>, one entry per line
//! system/etc/hosts     # generated hosts file
//! webroot/             # static UI
//! ```
//!
//! ## Scheduling
//!
//! Nothing refreshes on its own. A sync only runs when `POST /api/update`
//! (or [`ControlApi::trigger_update`]) is called; periodic refresh is up to
//! an external timer.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod activity_log;
pub mod api;
pub mod blocklist;
pub mod config;
pub mod control;
pub mod error;
pub mod fetch;
pub mod hosts;
pub mod layout;
pub mod server;
pub mod sync;

pub use activity_log::{ActivityLog, LogEntry};
pub use config::{ConfigStore, Configuration, DEFAULT_SOURCE_URL};
pub use control::{ControlApi, Status};
pub use error::{AdblockError, Result};
pub use fetch::{FetchTimeouts, Fetcher, HttpFetcher};
pub use hosts::HostsFileStore;
pub use layout::ModuleLayout;
pub use sync::{SyncOutcome, SyncPipeline};
