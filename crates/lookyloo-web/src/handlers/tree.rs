//! Capture tree explorer: tree page, host / URL details, screenshot.

use std::io::{Cursor, Write};

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use minijinja::context;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use lookyloo_common::error::{ApiError, LookylooError};
use lookyloo_common::tree::{CaptureTree, UrlDetails};
use lookyloo_engine::sanejs;

use crate::handlers::attachment;
use crate::state::SharedState;

const EMPTY_BODY_NAME: &str = "file.txt";
const EMPTY_BODY: &[u8] = b"Response body empty";

/// Tree loaded by the last `/tree/{uuid}` visit of this session.
async fn session_tree(state: &SharedState, jar: &CookieJar) -> Result<CaptureTree, ApiError> {
    let snapshot = state
        .sessions
        .load(jar)
        .tree()
        .ok_or_else(|| ApiError::BadRequest("no capture tree loaded in this session".to_string()))?;

    CaptureTree::read_snapshot(&snapshot).await.map_err(|e| match e {
        LookylooError::NotFound(_) => {
            ApiError::BadRequest("capture tree expired, reload the capture".to_string())
        }
        other => other.into(),
    })
}

/// GET /tree/hostname/{node_uuid}/text - URL list of a host as markdown
pub async fn hostnode_details_text(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path(node_uuid): Path<String>,
) -> Result<Response, ApiError> {
    let tree = session_tree(&state, &jar).await?;
    let hostnode = tree
        .host_node(&node_uuid)
        .ok_or_else(|| ApiError::NotFound(format!("host node {node_uuid}")))?;

    let urls: Vec<&str> = hostnode.urls.iter().map(|u| u.name.as_str()).collect();
    let content = format!("# URLs\n\n{}\n", urls.join("\n"));
    Ok(attachment(content.into_bytes(), "text/markdown", "file.md"))
}

/// GET /tree/hostname/{node_uuid} - URL nodes of a host, with SaneJS matches
pub async fn hostnode_details(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path(node_uuid): Path<String>,
) -> Result<Json<Vec<UrlDetails>>, ApiError> {
    let tree = session_tree(&state, &jar).await?;
    let hostnode = tree
        .host_node(&node_uuid)
        .ok_or_else(|| ApiError::NotFound(format!("host node {node_uuid}")))?;

    let mut urls = Vec::with_capacity(hostnode.urls.len());
    for url in &hostnode.urls {
        let mut details = url.details();
        if let Some(hash) = &url.body_hash {
            let lookup = state.engine.sane_js_query(hash).await;
            if let Some(found) = sanejs::details(&lookup) {
                tracing::debug!(url = %url.name, "body matches a known library");
                details.sane_js_details = Some(found.clone());
            }
        }
        urls.push(details);
    }
    Ok(Json(urls))
}

/// GET /tree/url/{node_uuid} - response body of a URL, zipped
pub async fn urlnode_details(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path(node_uuid): Path<String>,
) -> Result<Response, ApiError> {
    let tree = session_tree(&state, &jar).await?;
    let urlnode = tree
        .url_node(&node_uuid)
        .ok_or_else(|| ApiError::NotFound(format!("URL node {node_uuid}")))?;

    let archive = match urlnode.body() {
        Some(body) => zip_single(&urlnode.filename, body),
        None => zip_single(EMPTY_BODY_NAME, EMPTY_BODY),
    }
    .map_err(|e| {
        tracing::error!(error = %e, "building zip archive failed");
        ApiError::Internal("cannot build archive".to_string())
    })?;

    Ok(attachment(archive, "application/zip", "file.zip"))
}

/// Deflated zip archive holding one file.
pub fn zip_single(name: &str, data: &[u8]) -> zip::result::ZipResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    writer.start_file(name, options)?;
    writer.write_all(data)?;
    Ok(writer.finish()?.into_inner())
}

/// GET /tree/{tree_uuid}/image - screenshot of the capture
pub async fn image(
    State(state): State<SharedState>,
    Path(tree_uuid): Path<String>,
) -> Result<Response, ApiError> {
    let Some(report_dir) = state.engine.lookup_report_dir(&tree_uuid).await? else {
        return Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], "Not available.").into_response());
    };
    let png = state.engine.load_image(&report_dir).await?;
    Ok(attachment(png, "image/png", "image.png"))
}

/// GET /tree/{tree_uuid} - capture tree page
///
/// Loading a tree resets the session and remembers the new tree snapshot.
pub async fn tree(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path(tree_uuid): Path<String>,
) -> Result<Response, ApiError> {
    let Some(report_dir) = state.engine.lookup_report_dir(&tree_uuid).await? else {
        return Ok(Redirect::to("/").into_response());
    };

    let mut session = state.sessions.load(&jar);
    session.clear();

    match state.engine.load_tree(&report_dir).await {
        Ok(loaded) => {
            session.set_tree(&loaded.snapshot_path);
            let jar = state.sessions.save(jar, &session);
            let page = state.templates.render(
                "tree.html",
                context! {
                    tree_json => loaded.tree_json,
                    start_time => loaded.start_time,
                    user_agent => loaded.user_agent,
                    root_url => loaded.root_url,
                    tree_uuid => tree_uuid,
                    meta => loaded.meta,
                },
            )?;
            Ok((jar, page).into_response())
        }
        Err(e @ LookylooError::NoValidHarFile(_)) => {
            tracing::warn!(uuid = %tree_uuid, error = %e, "capture has no usable HAR");
            let jar = state.sessions.save(jar, &session);
            let page = state
                .templates
                .render("error.html", context! { error_message => e.to_string() })?;
            Ok((jar, page).into_response())
        }
        Err(e) => Err(e.into()),
    }
}
