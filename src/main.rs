use anyhow::Context;
use clap::Parser;
use hosts_adblock::server::{self, DEFAULT_PORT};
use hosts_adblock::{ControlApi, HttpFetcher, ModuleLayout};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

/// Hosts-file ad blocking control server.
#[derive(Parser, Debug)]
#[command(name = "hosts-adblock")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Module data root. Probed from the usual install locations if unset.
    #[arg(long, env = "ADBLOCK_ROOT")]
    root: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "ADBLOCK_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "ADBLOCK_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn setup_logging(default_filter: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    let layout = ModuleLayout::discover(cli.root);
    tracing::info!(root = %layout.root().display(), "Starting hosts-adblock");
    layout
        .ensure_dirs()
        .context("Failed to prepare module directories")?;

    let api = Arc::new(ControlApi::new(&layout, Arc::new(HttpFetcher::new())));
    if api
        .config()
        .ensure_source_url()
        .context("Failed to initialize config")?
    {
        tracing::info!("Source URL was empty, restored default");
    }

    let addr = SocketAddr::new(cli.bind, cli.port);
    let served = server::run(api, layout.web_root(), addr, shutdown_signal())
        .await
        .context("Control server failed")?;
    if !served {
        tracing::info!(port = cli.port, "Another process owns the port, exiting");
    }
    Ok(())
}
