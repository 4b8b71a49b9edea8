//! Index page: the list of stored captures.

use axum::{extract::State, response::Html};
use axum_extra::extract::cookie::CookieJar;
use minijinja::context;

use lookyloo_common::error::ApiError;

use crate::session::Session;
use crate::state::SharedState;

/// HEAD / - liveness probe
pub async fn index_head() -> &'static str {
    "Ack"
}

/// GET / - housekeeping, then list every listed capture as (uuid, title)
pub async fn index(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<(CookieJar, Html<String>), ApiError> {
    if let Err(e) = state.engine.cleanup_old_tmpfiles().await {
        tracing::warn!(error = %e, "tree snapshot cleanup failed");
    }
    state.engine.update_user_agents().await;
    let jar = state.sessions.save(jar, &Session::default());

    let mut titles: Vec<(String, String)> = Vec::new();
    for report_dir in state.engine.report_dirs().await? {
        match state.engine.report_cache(&report_dir).await {
            Ok(Some(cached)) if cached.is_listed() => titles.push((cached.uuid, cached.title)),
            Ok(_) => {}
            Err(e) => tracing::warn!(dir = %report_dir.display(), error = %e, "skipping unreadable capture"),
        }
    }

    let page = state.templates.render("index.html", context! { titles => titles })?;
    Ok((jar, page))
}
