//! On-disk capture storage: one directory per capture under `scraped/`.
//!
//! A capture directory holds:
//!   - `uuid`: the capture identifier
//!   - `<n>.har`, `<n>.png`, `<n>.html`: one triple per rendered page
//!   - `meta`: JSON with the requested os / browser / user agent (optional)
//!   - `no_index`: marker for captures hidden from the index (optional)

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use lookyloo_common::error::{LookylooError, Result};
use lookyloo_common::{ReportCache, ScrapeRequest};

use crate::har;
use crate::splash::SplashCapture;

const UUID_FILE: &str = "uuid";
const META_FILE: &str = "meta";
const NO_INDEX_FILE: &str = "no_index";

pub struct ReportStore {
    root: PathBuf,
    cache: RwLock<HashMap<PathBuf, ReportCache>>,
    uuid_index: RwLock<HashMap<String, PathBuf>>,
}

impl ReportStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            cache: RwLock::new(HashMap::new()),
            uuid_index: RwLock::new(HashMap::new()),
        }
    }

    /// Capture directories, newest first.
    pub async fn report_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(dirs),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort_by(|a, b| b.cmp(a));
        Ok(dirs)
    }

    /// Directory of the capture with this identifier.
    pub async fn lookup(&self, uuid: &str) -> Result<Option<PathBuf>> {
        if let Some(dir) = self.uuid_index.read().await.get(uuid) {
            if tokio::fs::try_exists(dir).await.unwrap_or(false) {
                return Ok(Some(dir.clone()));
            }
        }

        // Captures may have been added by another process; rebuild the index.
        let mut index = HashMap::new();
        for dir in self.report_dirs().await? {
            if let Some(id) = read_uuid(&dir).await {
                index.insert(id, dir);
            }
        }
        let found = index.get(uuid).cloned();
        *self.uuid_index.write().await = index;
        Ok(found)
    }

    /// Index summary of a capture, memoised.
    /// `None` when the directory has no identifier or no usable HAR.
    pub async fn cache(&self, dir: &Path) -> Result<Option<ReportCache>> {
        if let Some(cached) = self.cache.read().await.get(dir) {
            return Ok(Some(cached.clone()));
        }

        let Some(uuid) = read_uuid(dir).await else {
            return Ok(None);
        };
        let hars = har::read_hars(dir).await?;
        let Some(first) = hars.iter().find(|h| !h.log.entries.is_empty()) else {
            tracing::debug!(dir = %dir.display(), "capture without usable HAR");
            return Ok(None);
        };

        let cached = ReportCache {
            uuid: uuid.clone(),
            title: first.title().unwrap_or_default().to_string(),
            timestamp: first.start_time().unwrap_or_default().to_string(),
            url: first.root_url().unwrap_or_default().to_string(),
            no_index: tokio::fs::try_exists(dir.join(NO_INDEX_FILE)).await.unwrap_or(false),
        };

        self.uuid_index.write().await.insert(uuid, dir.to_path_buf());
        self.cache.write().await.insert(dir.to_path_buf(), cached.clone());
        Ok(Some(cached))
    }

    /// Write a finished capture to a fresh directory.
    pub async fn save_capture(
        &self,
        uuid: &str,
        request: &ScrapeRequest,
        pages: &[SplashCapture],
    ) -> Result<PathBuf> {
        let dir = self.root.join(Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string());
        tokio::fs::create_dir_all(&dir).await?;

        for (i, page) in pages.iter().enumerate() {
            tokio::fs::write(dir.join(format!("{i}.har")), serde_json::to_vec(&page.har)?).await?;
            if let Some(png) = &page.png {
                tokio::fs::write(dir.join(format!("{i}.png")), png).await?;
            }
            if let Some(html) = &page.html {
                tokio::fs::write(dir.join(format!("{i}.html")), html).await?;
            }
        }

        if request.user_agent().is_some() || request.os.is_some() || request.browser.is_some() {
            let meta = json!({
                "os": request.os,
                "browser": request.browser,
                "user_agent": request.user_agent(),
            });
            tokio::fs::write(dir.join(META_FILE), serde_json::to_vec(&meta)?).await?;
        }
        if !request.listing {
            tokio::fs::write(dir.join(NO_INDEX_FILE), b"").await?;
        }
        // Written last: a directory without identifier is ignored by the index.
        tokio::fs::write(dir.join(UUID_FILE), uuid).await?;

        self.uuid_index.write().await.insert(uuid.to_string(), dir.clone());
        tracing::info!(uuid, dir = %dir.display(), pages = pages.len(), "capture stored");
        Ok(dir)
    }
}

pub async fn read_uuid(dir: &Path) -> Option<String> {
    let raw = tokio::fs::read_to_string(dir.join(UUID_FILE)).await.ok()?;
    let uuid = raw.trim();
    (!uuid.is_empty()).then(|| uuid.to_string())
}

/// Capture metadata; an empty object when absent or unreadable.
pub async fn read_meta(dir: &Path) -> Value {
    match tokio::fs::read(dir.join(META_FILE)).await {
        Ok(data) => serde_json::from_slice(&data).unwrap_or_else(|_| json!({})),
        Err(_) => json!({}),
    }
}

/// Screenshot of the first rendered page.
pub async fn load_image(dir: &Path) -> Result<Vec<u8>> {
    let mut pngs = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "png") {
            pngs.push(path);
        }
    }
    pngs.sort();
    let first = pngs
        .into_iter()
        .next()
        .ok_or_else(|| LookylooError::NotFound(format!("screenshot in {}", dir.display())))?;
    Ok(tokio::fs::read(first).await?)
}
