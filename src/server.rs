//! Control server startup.
//!
//! If something is already listening on the port, startup is skipped and
//! the occupant is left alone. A previous instance of this server is the
//! usual occupant.

use crate::api::router;
use crate::control::ControlApi;
use crate::error::{AdblockError, Result};
use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

/// Port the UI expects the control server on.
pub const DEFAULT_PORT: u16 = 8888;

const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Returns `true` if a loopback connection to `port` succeeds.
pub async fn port_in_use(port: u16) -> bool {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    matches!(
        tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

/// Binds `addr` and serves until `shutdown` resolves.
///
/// Returns `false` without binding if the port is already taken.
///
/// # Errors
///
/// Returns [`AdblockError::Server`] if binding fails or the server stops
/// with an I/O error.
pub async fn run(
    api: Arc<ControlApi>,
    web_root: PathBuf,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<bool> {
    if port_in_use(addr.port()).await {
        tracing::warn!(port = addr.port(), "Port already in use, skipping startup");
        api.activity_log()
            .note(&format!("Port {} already in use, skipping startup", addr.port()));
        return Ok(false);
    }

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| AdblockError::Server { addr, source })?;
    serve(listener, api, web_root, shutdown).await?;
    Ok(true)
}

/// Serves the control API on an already bound listener.
///
/// # Errors
///
/// Returns [`AdblockError::Server`] if the server stops with an I/O error.
pub async fn serve(
    listener: TcpListener,
    api: Arc<ControlApi>,
    web_root: PathBuf,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener
        .local_addr()
        .map_err(|source| AdblockError::Server {
            addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            source,
        })?;

    tracing::info!(%addr, web_root = %web_root.display(), "Control server listening");
    api.activity_log().note("Control server started");

    axum::serve(listener, router(api, web_root))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|source| AdblockError::Server { addr, source })
}
