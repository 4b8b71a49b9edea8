//! Lookyloo Web Server
//!
//! Run with: cargo run -p lookyloo-web

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lookyloo_config::{load_or_create_secret_key, Config};
use lookyloo_engine::Lookyloo;
use lookyloo_web::{
    router::build_router,
    state::{AppState, BUNDLED_STATIC_DIR},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Lookyloo web server...");

    let secret = load_or_create_secret_key(&config.secret_key_path())?;
    let engine = Arc::new(Lookyloo::new(&config)?);

    let static_dir = config
        .server
        .static_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(BUNDLED_STATIC_DIR));

    // Create app state
    let state = AppState::new(engine, secret.expose_secret(), static_dir)?;

    // Build router
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
