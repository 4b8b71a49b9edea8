//! HTTP handlers for all web routes.

pub mod index;
pub mod scrape;
pub mod submit;
pub mod tree;

use axum::{
    http::header,
    response::{IntoResponse, Response},
};

/// Binary download with the given content type and file name.
pub(crate) fn attachment(body: Vec<u8>, content_type: &'static str, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        body,
    )
        .into_response()
}
