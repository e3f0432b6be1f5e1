//! Block-list download transport.

use crate::error::{AdblockError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Timeouts applied to one download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTimeouts {
    /// Time allowed to establish the connection.
    pub connect: Duration,
    /// Time allowed for the whole transfer.
    pub total: Duration,
}

impl Default for FetchTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            total: Duration::from_secs(120),
        }
    }
}

/// Something that can download a block-list.
///
/// Implementations return [`AdblockError::FetchFailed`] for every transport
/// problem, with whatever diagnostics they have in `reason`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeouts: FetchTimeouts) -> Result<Vec<u8>>;
}

/// HTTP(S) fetcher backed by `reqwest`.
pub struct HttpFetcher {
    user_agent: String,
}

impl HttpFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            user_agent: concat!("hosts-adblock/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    fn client(&self, timeouts: FetchTimeouts) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.total)
            .build()
            .map_err(|e| fetch_failed(&e))
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeouts: FetchTimeouts) -> Result<Vec<u8>> {
        tracing::info!(url, "Fetching block-list");

        let response = self
            .client(timeouts)?
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| fetch_failed(&e))?;

        let body = response.bytes().await.map_err(|e| fetch_failed(&e))?;
        tracing::debug!(url, bytes = body.len(), "Fetched block-list");
        Ok(body.to_vec())
    }
}

fn fetch_failed(e: &reqwest::Error) -> AdblockError {
    let kind = if e.is_timeout() {
        "timed out"
    } else if e.is_connect() {
        "connection failed"
    } else if e.is_status() {
        "bad status"
    } else if e.is_builder() {
        "invalid URL"
    } else {
        "transfer failed"
    };

    // Walk the source chain; the interesting detail (DNS, TLS) is nested.
    let mut reason = format!("{kind}: {e}");
    let mut source = std::error::Error::source(e);
    while let Some(inner) = source {
        reason.push_str(": ");
        reason.push_str(&inner.to_string());
        source = std::error::Error::source(inner);
    }
    AdblockError::FetchFailed { reason }
}
