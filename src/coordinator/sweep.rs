//! Background liveness sweep.

use super::Shared;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Periodically expire members whose session has lapsed, until `shutdown`
/// is cancelled.
pub(crate) async fn run(shared: Arc<Shared>, interval: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(interval_ms = interval.as_millis() as u64, "liveness sweep started");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let removed = shared.sweep(Instant::now());
                if removed > 0 {
                    info!(removed, "liveness sweep expired members");
                }
            }
        }
    }
    debug!("liveness sweep stopped");
}
