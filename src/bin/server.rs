//! Emberlog server binary: runs the TCP broker and the group liveness sweep.
//!
//! Configured through `EMBERLOG_ADDR`, `EMBERLOG_SESSION_TIMEOUT_MS`,
//! `EMBERLOG_MIN_SESSION_TIMEOUT_MS`, `EMBERLOG_MAX_SESSION_TIMEOUT_MS` and
//! `EMBERLOG_SWEEP_INTERVAL_MS`.

use emberlog::{server, Broker, GroupCoordinator, ServerConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("emberlog=info".parse()?))
        .init();

    let config = ServerConfig::from_env()?;
    let broker = Arc::new(Broker::new());
    let coordinator = Arc::new(GroupCoordinator::new(
        Arc::clone(&broker),
        config.coordinator.clone(),
    ));
    coordinator.start_liveness_sweep()?;

    let main_broker = Arc::clone(&broker);
    let main_coordinator = Arc::clone(&coordinator);
    let addr = config.addr.clone();
    let main =
        tokio::spawn(async move { server::run_server(main_broker, main_coordinator, &addr).await });

    tokio::select! {
        res = main => res??,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }

    coordinator.shutdown().await;
    Ok(())
}
