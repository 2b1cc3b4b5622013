mod alerts;
mod calibration;
mod config;
mod db;
mod dead_letter;
mod drain;
mod normalize;
mod staging;
#[cfg(test)]
mod testing;

use anyhow::Result;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{
    config::Config,
    db::PgTelemetryStore,
    dead_letter::DeadLetterLog,
    drain::DrainService,
    staging::PgStagingStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent; env vars may be set externally)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    // The pool backs both the staging buffer and the reference tables.
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    info!("Database ready");

    let dead_letter = DeadLetterLog::new(&config.dead_letter_dir);
    info!(dir = %dead_letter.dir().display(), "Malformed payloads will be dead-lettered");

    let service = DrainService::new(
        PgStagingStore::new(pool.clone()),
        PgTelemetryStore::new(pool.clone()),
        dead_letter,
        config.drain_interval(),
    );

    let cancel = CancellationToken::new();
    let drain = tokio::spawn({
        let cancel = cancel.clone();
        async move { service.run(cancel).await }
    });

    shutdown_signal().await;

    // The drain finishes the key it is on before observing cancellation.
    cancel.cancel();
    if let Err(e) = drain.await {
        tracing::error!(error = %e, "Drain task panicked");
    }

    pool.close().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
