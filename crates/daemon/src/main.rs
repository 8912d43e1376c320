//! Recplay daemon

use clap::Parser;
use recplay_daemon::{api, reaper::Reaper, AppContext, DaemonConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "recplayd")]
#[command(about = "Recplay daemon - browser test recording, replay and AI assistance")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "RECPLAY_CONFIG")]
    config: Option<PathBuf>,

    /// Store directory
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// HTTP listen address
    #[arg(short, long)]
    listen: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    info!("Recplay daemon v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration, command-line flags win
    let config_path = cli.config.unwrap_or_else(recplay_common::default_config_path);
    let mut config = DaemonConfig::load(&config_path)?;
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    let addr: SocketAddr = config.listen.parse()?;

    // Ensure store directory exists
    tokio::fs::create_dir_all(&config.store_path).await?;
    info!("Store: {}", config.store_path.display());

    let ctx = AppContext::from_config(&config)?;

    // Start reaper
    let reaper = Reaper::new(ctx.recorder.clone(), config.recorder.reap_interval());
    let reaper_handle = tokio::spawn(async move { reaper.run().await });

    // Start HTTP API
    let api_handle = tokio::spawn(api::serve(ctx.clone(), addr));

    info!("Daemon started on http://{}", addr);

    // Wait for shutdown signal
    tokio::select! {
        _ = shutdown_signal() => {
            info!("Received shutdown signal");
        }
        result = api_handle => {
            match result {
                Ok(Err(e)) => error!("HTTP server error: {}", e),
                Err(e) => error!("HTTP server task failed: {}", e),
                Ok(Ok(())) => {}
            }
        }
        result = reaper_handle => {
            if let Err(e) = result {
                error!("Reaper error: {}", e);
            }
        }
    }

    // Recorder processes must not outlive the daemon
    ctx.recorder.shutdown().await;

    info!("Daemon shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                error!("Cannot install SIGTERM handler: {}", e);
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
