//! MusicRoom Server - standalone headless server for MusicRoom.
//!
//! Hosts listening rooms and playlists behind an HTTP/WebSocket API and
//! notifies the configured rendering backend of every state change.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use musicroom_core::{bootstrap_services, start_server, AppState};
use parking_lot::RwLock;
use tokio::signal;

use crate::config::ServerConfig;

/// MusicRoom Server - collaborative listening rooms and playlists.
#[derive(Parser, Debug)]
#[command(name = "musicroom-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "MUSICROOM_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "MUSICROOM_BIND_PORT")]
    port: Option<u16>,

    /// Rendering backend base URL (overrides config file).
    #[arg(short = 'b', long, env = "MUSICROOM_BACKEND_URL")]
    backend_url: Option<String>,

    /// Track catalog base URL (overrides config file).
    #[arg(long, env = "MUSICROOM_CATALOG_URL")]
    catalog_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("MusicRoom Server v{}", env!("CARGO_PKG_VERSION"));

    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // CLI overrides
    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(url) = args.backend_url {
        config.backend_url = url;
    }
    if let Some(url) = args.catalog_url {
        config.catalog_url = url;
    }

    log::info!(
        "Configuration: bind_port={}, backend_url={}, catalog_url={}",
        config.bind_port,
        config.backend_url,
        config.catalog_url
    );

    let core_config = config.to_core_config();
    let services = bootstrap_services(&core_config).context("Failed to bootstrap services")?;
    log::info!("Services bootstrapped successfully");

    let app_state = AppState::new(&services, Arc::new(RwLock::new(core_config)));
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(app_state).await {
            log::error!("Server error: {}", e);
        }
    });

    shutdown_signal().await;
    log::info!("Shutdown signal received, cleaning up...");

    // Cancels the server and closes WebSocket connections before stopping rooms.
    services.shutdown().await;

    if let Err(e) = server_handle.await {
        log::warn!("Server task ended abnormally: {}", e);
    }

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
