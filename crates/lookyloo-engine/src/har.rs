//! HAR 1.2 parsing and flat capture-tree construction.
//!
//! Only the fields the tree needs are modelled; everything else in the
//! archive is ignored.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use sha2::{Digest, Sha512};
use uuid::Uuid;

use lookyloo_common::error::{LookylooError, Result};
use lookyloo_common::tree::{CaptureTree, HostNode, UrlNode, DEFAULT_FILENAME};

#[derive(Debug, Deserialize)]
pub struct Har {
    pub log: HarLog,
}

#[derive(Debug, Deserialize)]
pub struct HarLog {
    #[serde(default)]
    pub pages: Vec<HarPage>,
    #[serde(default)]
    pub entries: Vec<HarEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarPage {
    #[serde(default)]
    pub started_date_time: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarEntry {
    #[serde(default)]
    pub started_date_time: Option<String>,
    pub request: HarRequest,
    pub response: HarResponse,
}

#[derive(Debug, Deserialize)]
pub struct HarRequest {
    pub url: String,
    #[serde(default)]
    pub headers: Vec<HarHeader>,
}

#[derive(Debug, Deserialize)]
pub struct HarHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct HarResponse {
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub content: HarContent,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarContent {
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

impl HarContent {
    fn decoded(&self) -> Option<Vec<u8>> {
        let text = self.text.as_deref()?;
        match self.encoding.as_deref() {
            Some("base64") => STANDARD.decode(text.trim()).ok(),
            _ => Some(text.as_bytes().to_vec()),
        }
    }
}

impl Har {
    pub fn from_slice(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }

    pub fn root_url(&self) -> Option<&str> {
        self.log.entries.first().map(|e| e.request.url.as_str())
    }

    pub fn start_time(&self) -> Option<&str> {
        self.log
            .pages
            .first()
            .and_then(|p| p.started_date_time.as_deref())
            .or_else(|| self.log.entries.first().and_then(|e| e.started_date_time.as_deref()))
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.log.entries.first().and_then(|e| {
            e.request
                .headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case("user-agent"))
                .map(|h| h.value.as_str())
        })
    }

    /// Page title, falling back to the root URL.
    pub fn title(&self) -> Option<&str> {
        self.log
            .pages
            .first()
            .and_then(|p| p.title.as_deref())
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.root_url())
    }
}

/// Read and parse every HAR file of a capture directory, in file-name order.
pub async fn read_hars(report_dir: &Path) -> Result<Vec<Har>> {
    let mut paths = Vec::new();
    let mut dir = tokio::fs::read_dir(report_dir).await?;
    while let Some(entry) = dir.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "har") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut hars = Vec::with_capacity(paths.len());
    for path in paths {
        let data = tokio::fs::read(&path).await?;
        match Har::from_slice(&data) {
            Ok(har) => hars.push(har),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unparsable HAR"),
        }
    }
    Ok(hars)
}

/// Build the flat tree: one host node per hostname, in order of first
/// appearance, each holding the URLs it served.
pub fn build_tree(capture_uuid: &str, hars: &[Har], report_dir: &Path) -> Result<CaptureTree> {
    let no_valid = || LookylooError::NoValidHarFile(report_dir.display().to_string());

    let first = hars.iter().find(|h| !h.log.entries.is_empty()).ok_or_else(no_valid)?;

    let mut host_nodes: Vec<HostNode> = Vec::new();
    for entry in hars.iter().flat_map(|h| h.log.entries.iter()) {
        let node = url_node(entry);
        match host_nodes.iter_mut().find(|h| h.name == node.hostname) {
            Some(host) => host.urls.push(node),
            None => host_nodes.push(HostNode {
                uuid: Uuid::new_v4().to_string(),
                name: node.hostname.clone(),
                urls: vec![node],
            }),
        }
    }

    Ok(CaptureTree {
        uuid: capture_uuid.to_string(),
        root_url: first.root_url().unwrap_or_default().to_string(),
        start_time: first.start_time().unwrap_or_default().to_string(),
        user_agent: first.user_agent().unwrap_or_default().to_string(),
        host_nodes,
    })
}

fn url_node(entry: &HarEntry) -> UrlNode {
    let parsed = url::Url::parse(&entry.request.url).ok();
    let hostname = parsed
        .as_ref()
        .and_then(|u| u.host_str())
        .unwrap_or_default()
        .to_string();
    let filename = parsed
        .as_ref()
        .and_then(|u| u.path_segments())
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_FILENAME)
        .to_string();

    let body = entry.response.content.decoded().filter(|b| !b.is_empty());
    let body_hash = body.as_ref().map(|b| hex::encode(Sha512::digest(b)));

    UrlNode {
        uuid: Uuid::new_v4().to_string(),
        name: entry.request.url.clone(),
        hostname,
        filename,
        status: entry.response.status.and_then(|s| u16::try_from(s).ok()),
        mimetype: entry.response.content.mime_type.clone(),
        body,
        body_hash,
    }
}
