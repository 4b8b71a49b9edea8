//! Axum router — maps all URL paths to handlers.

use axum::{
    Router,
    routing::get,
};
use tower::ServiceBuilder;
use tower_http::{
    services::ServeDir,
    trace::TraceLayer,
    compression::CompressionLayer,
};
use std::sync::Arc;
use crate::state::{AppState, SharedState};
use crate::handlers::{
    index::{index, index_head},
    scrape::{scrape_page, scrape_web},
    submit::submit,
    tree::{hostnode_details, hostnode_details_text, image, tree, urlnode_details},
};

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    let static_dir = ServeDir::new(&state.static_dir);
    let shared: SharedState = Arc::new(state);

    Router::new()
        // Pages
        .route("/",       get(index).head(index_head))
        .route("/scrape", get(scrape_page).post(scrape_web))
        .route("/submit", get(submit).post(submit))

        // Capture tree
        .route("/tree/hostname/{node_uuid}/text", get(hostnode_details_text))
        .route("/tree/hostname/{node_uuid}",      get(hostnode_details))
        .route("/tree/url/{node_uuid}",           get(urlnode_details))
        .route("/tree/{tree_uuid}/image",         get(image))
        .route("/tree/{tree_uuid}",               get(tree))

        // Static files
        .nest_service("/static", static_dir)

        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new()),
        )
        .with_state(shared)
}
