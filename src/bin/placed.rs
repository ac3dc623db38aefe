//! Place server - authoritative shared canvas
//!
//! Accepts TCP clients, keeps the board and broadcasts every change.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: 127.0.0.1:5555, 100x100 board, 1 s cooldown
//! placed
//!
//! # Settings from a file, with command-line overrides
//! placed --config place.toml --port 6000 --dim 64
//! ```
//!
//! Configuration precedence: defaults, then the TOML file (`--config` or
//! `PLACE_CONFIG`), then flags.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use placed::config::ServerConfig;
use placed::server::PlaceServer;

/// Place server - shared-canvas multiplayer board
#[derive(Parser, Debug)]
#[command(name = "placed", version, about)]
struct Args {
    /// TOML configuration file (falls back to $PLACE_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Board side length
    #[arg(short, long)]
    dim: Option<u32>,

    /// Minimum time between two changes from one session, in milliseconds
    #[arg(long)]
    cooldown_ms: Option<u64>,

    /// Seconds a new connection has to log in
    #[arg(long)]
    login_timeout_secs: Option<u64>,

    /// Messages queued per client before it is dropped as too slow
    #[arg(long)]
    outbound_buffer: Option<usize>,
}

impl Args {
    /// Loads the file (if any) and applies flag overrides.
    fn into_config(self) -> Result<ServerConfig> {
        let mut config = ServerConfig::load(self.config.as_deref())
            .context("Failed to load configuration")?;

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dim) = self.dim {
            config.dim = dim;
        }
        if let Some(cooldown_ms) = self.cooldown_ms {
            config.cooldown_ms = cooldown_ms;
        }
        if let Some(secs) = self.login_timeout_secs {
            config.login_timeout_secs = secs;
        }
        if let Some(buffer) = self.outbound_buffer {
            config.outbound_buffer = buffer;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("placed=info".parse()?)
                .add_directive("place_core=info".parse()?)
                .add_directive("place_protocol=info".parse()?),
        )
        .init();

    let config = Args::parse().into_config()?;
    let addr = config.socket_addr()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        dim = config.dim,
        cooldown_ms = config.cooldown_ms,
        "Place server starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let server = PlaceServer::from_config(&config, cancel_token)
        .context("Failed to create server")?;

    if let Err(e) = server.run(addr).await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Place server stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
