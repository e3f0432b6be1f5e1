//! Error types.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias for control-plane operations.
pub type Result<T> = std::result::Result<T, AdblockError>;

/// Errors returned by the stores, the sync pipeline and the control API.
#[derive(Debug, Error)]
pub enum AdblockError {
    /// The block-list could not be downloaded (timeout, DNS, TLS, non-2xx).
    #[error("fetch failed: {reason}")]
    FetchFailed {
        /// Transport diagnostics.
        reason: String,
    },

    /// The downloaded payload is too small to be a real block-list.
    #[error("downloaded payload is invalid ({size} bytes)")]
    InvalidPayload {
        /// Size of the payload in bytes.
        size: usize,
    },

    /// An empty source URL was submitted.
    #[error("source URL is empty")]
    EmptyUrl,

    /// An update was requested while blocking is disabled.
    #[error("blocking is disabled")]
    Disabled,

    /// Another update is currently running.
    #[error("an update is already in progress")]
    SyncInProgress,

    /// Reading or writing a durable file failed.
    #[error("I/O error at {path}: {source}")]
    Store {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The control server could not bind or stopped with an I/O error.
    #[error("server error on {addr}: {source}")]
    Server {
        /// The address the server was bound (or binding) to.
        addr: std::net::SocketAddr,
        /// The underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration record could not be serialized.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl AdblockError {
    pub(crate) fn store(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Store {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Message safe to hand back to API clients.
    ///
    /// Unlike [`Display`](std::fmt::Display) this never contains filesystem
    /// paths or raw transport errors.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::FetchFailed { .. } => "Download failed",
            Self::InvalidPayload { .. } => "Downloaded file is invalid",
            Self::EmptyUrl => "URL must not be empty",
            Self::Disabled => "Blocking is disabled",
            Self::SyncInProgress => "An update is already in progress",
            Self::Store { .. } | Self::Serialize(_) => "Storage failure",
            Self::Server { .. } => "Server failure",
        }
    }

    /// Returns `true` for failures of the durable stores.
    #[must_use]
    pub const fn is_store_failure(&self) -> bool {
        matches!(self, Self::Store { .. } | Self::Serialize(_))
    }

    /// Returns `true` if the underlying I/O error is `PermissionDenied`.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Store { source, .. } if source.kind() == std::io::ErrorKind::PermissionDenied)
    }
}
