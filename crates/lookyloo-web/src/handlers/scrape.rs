//! Capture form: render it, or run the capture it posted.

use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use minijinja::context;
use serde::Deserialize;

use lookyloo_common::error::{ApiError, LookylooError};
use lookyloo_common::scrape::{parse_depth, parse_flag, ScrapeRequest, DEFAULT_DEPTH};

use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct ScrapeForm {
    pub url: Option<String>,
    pub depth: Option<String>,
    /// Checkbox: absent when unticked.
    pub listing: Option<String>,
    pub user_agent: Option<String>,
    pub os: Option<String>,
    pub browser: Option<String>,
}

impl ScrapeForm {
    /// The capture to run, if a URL was filled in.
    pub fn into_request(self) -> Option<ScrapeRequest> {
        let url = self.url.filter(|u| !u.trim().is_empty())?;
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Some(ScrapeRequest {
            url,
            depth: self.depth.as_deref().map_or(DEFAULT_DEPTH, parse_depth),
            listing: self.listing.as_deref().is_some_and(parse_flag),
            user_agent: non_empty(self.user_agent),
            os: non_empty(self.os),
            browser: non_empty(self.browser),
        })
    }
}

/// GET /scrape - the capture form. Query parameters never start a capture.
pub async fn scrape_page(State(state): State<SharedState>) -> Result<Html<String>, ApiError> {
    render_form(&state).await
}

/// POST /scrape - run the capture described by the form body
pub async fn scrape_web(
    State(state): State<SharedState>,
    Form(form): Form<ScrapeForm>,
) -> Result<Response, ApiError> {
    let Some(request) = form.into_request() else {
        return Ok(render_form(&state).await?.into_response());
    };

    let url = request.url.clone();
    match state.engine.scrape(request).await {
        Ok(uuid) => Ok(Redirect::to(&format!("/tree/{uuid}")).into_response()),
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "capture failed");
            let error_message = match &e {
                LookylooError::InvalidUrl(_) | LookylooError::NonGlobalTarget(_) => e.to_string(),
                _ => format!("Unable to capture {url}."),
            };
            Ok(state
                .templates
                .render("error.html", context! { error_message => error_message })?
                .into_response())
        }
    }
}

async fn render_form(state: &SharedState) -> Result<Html<String>, ApiError> {
    let user_agents = state.engine.user_agents().await.by_os;
    state
        .templates
        .render("scrape.html", context! { user_agents => user_agents })
}
