//! Splash rendering service client.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use lookyloo_common::error::{LookylooError, Result};

/// One rendered page.
#[derive(Debug, Clone)]
pub struct SplashCapture {
    pub url: String,
    pub har: Value,
    pub png: Option<Vec<u8>>,
    pub html: Option<String>,
}

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    url: &'a str,
    har: u8,
    png: u8,
    html: u8,
    response_body: u8,
    wait: f64,
    timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    har: Option<Value>,
    #[serde(default)]
    png: Option<String>,
    #[serde(default)]
    html: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SplashClient {
    client: reqwest::Client,
    base_url: String,
    wait_secs: f64,
    timeout_secs: u64,
}

impl SplashClient {
    pub fn new(base_url: &str, wait_secs: f64, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            // Leave Splash its own timeout plus some slack.
            .timeout(Duration::from_secs(timeout_secs + 10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            wait_secs,
            timeout_secs,
        })
    }

    /// Render one page through `render.json`.
    pub async fn render(&self, url: &str, user_agent: Option<&str>) -> Result<SplashCapture> {
        let request = RenderRequest {
            url,
            har: 1,
            png: 1,
            html: 1,
            response_body: 1,
            wait: self.wait_secs,
            timeout: self.timeout_secs,
            headers: user_agent.map(|ua| serde_json::json!({ "User-Agent": ua })),
        };

        tracing::debug!(url, splash = %self.base_url, "rendering page");
        let resp = self
            .client
            .post(format!("{}/render.json", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LookylooError::Splash(format!("{status} rendering {url}: {body}")));
        }

        let rendered: RenderResponse = resp.json().await?;
        decode_render(rendered, url)
    }
}

/// Turn a `render.json` answer into a capture of `url`.
fn decode_render(rendered: RenderResponse, url: &str) -> Result<SplashCapture> {
    let har = rendered
        .har
        .ok_or_else(|| LookylooError::Splash(format!("no HAR returned for {url}")))?;
    let png = rendered
        .png
        .map(|encoded| STANDARD.decode(encoded))
        .transpose()
        .map_err(|e| LookylooError::Splash(format!("bad screenshot encoding: {e}")))?;

    Ok(SplashCapture {
        url: rendered.url.unwrap_or_else(|| url.to_string()),
        har,
        png,
        html: rendered.html,
    })
}
