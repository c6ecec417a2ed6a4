//! PigMap server binary.
//!
//! Reads `pigmap.toml` (or the path given with `--config`), opens the
//! database, blob storage and snapshot store, starts the live coordinator and
//! serves the HTTP gateway until ctrl-c.

mod settings;

use std::path::PathBuf;

use anyhow::Context as _;
use api::AppState;
use clap::Parser;
use storage::Storage;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

#[derive(Parser)]
#[command(author, version, about = "PigMap report server")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "pigmap.toml")]
    config: PathBuf,

    /// Override the listen port.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;
    if let Some(port) = cli.port {
        settings.server.port = port;
    }

    db::init(settings.database.clone())
        .await
        .with_context(|| format!("failed to open database at {}", settings.database.endpoint))?;

    let storage = Storage::new(settings.storage.clone())
        .await
        .context("failed to open blob storage")?;

    let snapshots = actors::open_snapshot_store(&settings.live.snapshot, &storage)
        .await
        .context("failed to open snapshot store")?;
    let (coordinator, coordinator_handle) = actors::start_coordinator(&settings.live, snapshots)
        .await
        .context("failed to start live coordinator")?;

    let state = AppState::new(coordinator.clone(), storage, settings.reports.clone());
    let app = api::router(state);
    let address = settings.server.address();

    tracing::info!("Listening on http://{address}");
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Stopping live coordinator");
    if let Err(e) = coordinator.shutdown().await {
        tracing::warn!("Live coordinator shutdown: {}", e);
    }
    coordinator_handle
        .await
        .context("live coordinator task failed")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
