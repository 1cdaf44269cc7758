//! dispatch-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, resolves config,
//! connects to Postgres and runs migrations, builds the shared state, wires
//! middleware, and starts the HTTP server. All route handlers live in
//! `routes.rs`; all shared state types live in `state.rs`.

use std::sync::Arc;

use anyhow::Context;
use dispatch_config::DispatcherConfig;
use dispatch_db::PgStore;
use dispatch_engine::DispatchEngine;
use dispatch_transport::OfferTransport;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use dispatch_daemon::{routes, state::AppState, sweeper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dev-time .env.local loading; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let config = DispatcherConfig::from_env().context("failed to resolve configuration")?;
    info!(?config, "dispatch-daemon starting");

    let pool = dispatch_db::connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    // Fail closed: the daemon refuses to bind its listener if migration fails.
    dispatch_db::migrate(&pool)
        .await
        .context("database migration failed")?;

    let store = Arc::new(PgStore::new(pool));
    let transport = OfferTransport::new(config.outbound_bearer.clone(), config.deploy_env);
    let engine = DispatchEngine::new(store, transport);

    sweeper::spawn(engine.clone());

    let shared = Arc::new(AppState {
        engine,
        vendor_webhook_secret: config.vendor_webhook_secret.clone(),
        deploy_env: config.deploy_env,
    });

    let app = routes::build_router(shared)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive());

    let addr: std::net::SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("invalid DISPATCH_ADDR: {}", config.bind_addr))?;
    info!("dispatch-daemon listening on http://{addr}");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
