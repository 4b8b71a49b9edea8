//! JSON capture submission.

use axum::{
    body::Bytes,
    extract::State,
    http::header,
    response::IntoResponse,
};

use lookyloo_common::error::ApiError;
use lookyloo_common::ScrapeRequest;

use crate::state::SharedState;

/// POST|GET /submit - queue a capture, answer with its identifier.
///
/// The body is parsed as JSON whatever the declared content type.
pub async fn submit(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: ScrapeRequest = serde_json::from_slice(&body)?;
    let uuid = state.engine.enqueue_scrape(request).await?;
    tracing::info!(%uuid, "capture submitted");
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], uuid.to_string()))
}
