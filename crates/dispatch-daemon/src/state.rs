//! Shared runtime state for dispatch-daemon.
//!
//! Generic over `dispatch_db::PickupStore` so `dispatch-testkit`'s
//! in-memory fake can stand in for Postgres when exercising the bare
//! router in integration tests — the production binary instantiates
//! `AppState<dispatch_db::PgStore>`.

use std::sync::Arc;

use dispatch_db::PickupStore;
use dispatch_engine::DispatchEngine;

/// Cloneable (Arc-backed) handle shared across every Axum handler.
pub struct AppState<S: PickupStore> {
    pub engine: DispatchEngine<S>,
    pub vendor_webhook_secret: String,
    pub deploy_env: dispatch_config::DeployEnv,
}

impl<S: PickupStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            vendor_webhook_secret: self.vendor_webhook_secret.clone(),
            deploy_env: self.deploy_env,
        }
    }
}

pub type SharedState<S> = Arc<AppState<S>>;
