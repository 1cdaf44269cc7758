//! The Expiry Sweeper: runs every 10 seconds, reconciling
//! offers whose arming process crashed or whose timer was otherwise lost.
//! Sweeper failures log and continue — they never abort the process.

use std::time::Duration;

use dispatch_db::PickupStore;
use dispatch_engine::DispatchEngine;
use tracing::{error, info};

const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Spawn the sweeper as a background task. Detached: the daemon does not
/// await it, matching the rest of the engine's timer model (§5, §9).
pub fn spawn<S: PickupStore + 'static>(engine: DispatchEngine<S>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match engine.sweep_expired().await {
                Ok(0) => {}
                Ok(n) => info!(advanced = n, "sweeper reclaimed expired offers"),
                Err(e) => error!(error = %e, "sweeper tick failed, continuing"),
            }
        }
    });
}
