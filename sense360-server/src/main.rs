//! Sense360 device registry server
//!
//! Backs the browser flashing tool: boards register by MAC address, and
//! everything that leaves the service refers to them by an opaque public id.

mod config;
mod error;
mod handlers;
mod server;
mod state;

use clap::Parser;
use sense360_core::{AccessLog, DeviceRegistry};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sense360-server", about = "Sense360 device registry server")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "server.toml")]
    config: PathBuf,

    /// Listen address override
    #[arg(short, long)]
    listen: Option<String>,

    /// Access log file override
    #[arg(short, long)]
    access_log: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut cfg = if cli.config.exists() {
        config::ServerConfig::load(&cli.config)?
    } else {
        tracing::info!("No config file found, using defaults");
        config::ServerConfig::default()
    };

    if let Some(listen) = cli.listen {
        cfg.listen_addr = listen;
    }
    if let Some(access_log) = cli.access_log {
        cfg.access_log_path = Some(access_log);
    }

    let access_log = match &cfg.access_log_path {
        Some(path) => AccessLog::with_file(path)?,
        None => AccessLog::new(),
    };

    tracing::info!("Starting Sense360 registry on {}", cfg.listen_addr);

    let state = state::AppState::new(
        DeviceRegistry::new(),
        access_log,
        cfg.access_log_default_limit,
    );
    let app = server::build_router(state, &cfg);

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
