//! Torrent Relay Watcher - Main entry point
//!
//! Watches a download directory and relays finished torrent files to the
//! configured remote hosts.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use torrent_relay::daemon::shutdown::ShutdownCoordinator;
use torrent_relay::relay::{Relay, SshTransport};
use torrent_relay::state::StateRecorder;
use torrent_relay::watch::{PowerMonitor, Watcher};
use torrent_relay::{api, utils, Config};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Status API port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::from_file(&args.config)?;
    if let Some(port) = args.port {
        config.http.port = port;
    }

    // State directory first; the log file lives inside it
    let recorder = Arc::new(StateRecorder::start(&config.state.state_dir)?);

    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level, &recorder.log_file())?;

    tracing::info!(
        "Starting torrent-relay v{} ({} targets, watching {})",
        env!("CARGO_PKG_VERSION"),
        config.relay.targets.len(),
        config.watch.directory.display()
    );

    let shutdown = ShutdownCoordinator::new();

    // Relay pipeline over the real SSH transport
    let relay = Arc::new(Relay::new(&config.relay, Arc::new(SshTransport)));

    // Sleep/wake monitor feeding the watcher
    let (wake_tx, wake_rx) = mpsc::channel(4);
    let power_handle = tokio::spawn(PowerMonitor::new().run(wake_tx, shutdown.token()));

    // Directory watcher
    let watcher = Watcher::new(
        &config.watch,
        relay,
        recorder.clone(),
        wake_rx,
        shutdown.token(),
    );
    let watcher_handle = tokio::spawn(watcher.run());

    // Status API; a bind failure is logged and the watcher continues
    let addr = format!("{}:{}", config.http.bind, config.http.port);
    let server_handle = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => {
            tracing::info!("Status API on http://{}/status", addr);
            let app = api::create_router(recorder.clone());
            let token = shutdown.token();
            Some(tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move { token.cancelled().await })
                    .await
            }))
        }
        Err(e) => {
            tracing::warn!("Could not bind status API on {}: {}", addr, e);
            None
        }
    };

    // Wait for shutdown signal, then cancel everything
    shutdown.wait_for_signal().await;

    if let Err(e) = tokio::time::timeout(std::time::Duration::from_secs(10), watcher_handle).await {
        tracing::warn!("Watcher shutdown timeout: {}", e);
    }
    let _ = tokio::time::timeout(std::time::Duration::from_secs(3), power_handle).await;

    if let Some(handle) = server_handle {
        match tokio::time::timeout(std::time::Duration::from_secs(5), handle).await {
            Ok(Ok(Ok(()))) => tracing::info!("Status API shutdown complete"),
            Ok(Ok(Err(e))) => tracing::error!("Status API error during shutdown: {}", e),
            Ok(Err(e)) => tracing::error!("Status API task panicked: {}", e),
            Err(_) => tracing::warn!("Status API shutdown timeout, forcing exit"),
        }
    }

    tracing::info!(
        "Stopped after processing {} files this run",
        recorder.processed_count()
    );
    Ok(())
}
