//! PrizeCraft Daemon Binary
//!
//! Runs the settlement scheduler until interrupted.

use std::sync::Arc;

use prizecraft_daemon::{DaemonError, DaemonService};
use prizecraft_logging::init_logging;
use prizecraft_settings::Settings;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    init_logging(false);

    tracing::info!("Starting PrizeCraft daemon...");

    let settings = Settings::load_or_default()?;
    let daemon = Arc::new(DaemonService::with_mock_collaborators(settings)?);

    tracing::info!("Daemon ticking every {:?}", daemon.tick_interval());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = {
        let daemon = daemon.clone();
        tokio::spawn(async move { daemon.run(shutdown_rx).await })
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Received shutdown signal");

    // Let an in-flight tick finish before exiting
    let _ = shutdown_tx.send(true);
    if let Err(e) = runner.await {
        tracing::error!("Scheduler task failed: {}", e);
    }

    tracing::info!("Daemon stopped");
    Ok(())
}
