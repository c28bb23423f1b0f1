//! Deckhand Daemon - application supervisor

use anyhow::Result;
use deckhand_core::Config;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deckhandd::Daemon;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deckhandd=info,deckhand_registry=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!("Deckhand daemon starting in {}", config.home.display());
    config.ensure_dirs()?;

    // refuse to double-run against a live daemon
    let socket_path = config.socket_path();
    if socket_path.exists() {
        match tokio::net::UnixStream::connect(&socket_path).await {
            Ok(_) => {
                error!("daemon is already running");
                std::process::exit(1);
            }
            Err(_) => {
                info!("removing stale socket file");
                std::fs::remove_file(&socket_path)?;
            }
        }
    }

    let daemon = Daemon::new(config).await?;

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    tokio::select! {
        result = daemon.run() => {
            if let Err(e) = result {
                error!("daemon error: {}", e);
                daemon.shutdown().await;
                return Err(e.into());
            }
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down");
        }
        _ = sigint.recv() => {
            info!("received SIGINT, shutting down");
        }
    }

    daemon.shutdown().await;
    info!("daemon shutdown complete");
    Ok(())
}
