//! Shared application state for the web server.

use std::path::PathBuf;
use std::sync::Arc;

use lookyloo_engine::CaptureEngine;

use crate::session::SessionSigner;
use crate::templates::Templates;

/// Assets shipped with this crate, used when no static directory is configured.
pub const BUNDLED_STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/static");

/// Shared state injected into every Axum handler.
pub struct AppState {
    pub engine: Arc<dyn CaptureEngine>,
    pub sessions: SessionSigner,
    pub templates: Templates,
    /// Directory served under /static
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(
        engine: Arc<dyn CaptureEngine>,
        secret_key: &[u8],
        static_dir: PathBuf,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            engine,
            sessions: SessionSigner::new(secret_key),
            templates: Templates::new()?,
            static_dir,
        })
    }
}

pub type SharedState = Arc<AppState>;
