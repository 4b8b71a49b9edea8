//! User agents offered on the scrape form, grouped by OS and browser.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use lookyloo_common::error::Result;

/// os → browser → user agents.
pub type UserAgentsByOs = BTreeMap<String, BTreeMap<String, Vec<String>>>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserAgents {
    #[serde(default)]
    pub by_frequency: Vec<String>,
    #[serde(flatten)]
    pub by_os: UserAgentsByOs,
}

impl UserAgents {
    /// Group a frequency-ordered list of user agents.
    pub fn from_list(list: Vec<String>) -> Self {
        let mut by_os = UserAgentsByOs::new();
        for ua in &list {
            let (os, browser) = classify(ua);
            by_os
                .entry(os.to_string())
                .or_default()
                .entry(browser.to_string())
                .or_default()
                .push(ua.clone());
        }
        Self { by_frequency: list, by_os }
    }

    pub fn builtin() -> Self {
        Self::from_list(
            [
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
                "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        )
    }
}

/// Rough (os, browser) classification from the user agent string.
pub fn classify(ua: &str) -> (&'static str, &'static str) {
    let os = if ua.contains("Android") {
        "Android"
    } else if ua.contains("iPhone") || ua.contains("iPad") {
        "iOS"
    } else if ua.contains("Windows") {
        "Windows"
    } else if ua.contains("Macintosh") || ua.contains("Mac OS X") {
        "Mac OS X"
    } else if ua.contains("Linux") || ua.contains("X11") {
        "Linux"
    } else {
        "Other"
    };
    // Order matters: Edge and Chrome both claim Safari, Edge claims Chrome.
    let browser = if ua.contains("Edg/") || ua.contains("Edge/") {
        "Edge"
    } else if ua.contains("Firefox/") {
        "Firefox"
    } else if ua.contains("Chrome/") {
        "Chrome"
    } else if ua.contains("Safari/") {
        "Safari"
    } else {
        "Other"
    };
    (os, browser)
}

#[derive(Debug, Clone)]
pub struct UserAgentStore {
    dir: PathBuf,
    source_url: Option<String>,
    client: reqwest::Client,
}

impl UserAgentStore {
    pub fn new(dir: PathBuf, source_url: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self { dir, source_url, client })
    }

    fn path_for(&self, day: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.json", day.format("%Y-%m-%d")))
    }

    /// Newest stored list, or the built-in one.
    pub async fn latest(&self) -> UserAgents {
        match newest_file(&self.dir).await {
            Some(path) => match read_file(&path).await {
                Ok(agents) => agents,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "unreadable user agents file");
                    UserAgents::builtin()
                }
            },
            None => UserAgents::builtin(),
        }
    }

    /// Fetch and store today's list unless it already exists.
    /// Returns whether a new file was written.
    pub async fn update(&self, today: NaiveDate) -> bool {
        let Some(source) = self.source_url.as_deref() else {
            return false;
        };
        let path = self.path_for(today);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return false;
        }
        match self.fetch_and_store(source, &path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "user agents refreshed");
                true
            }
            Err(e) => {
                tracing::warn!(source, error = %e, "user agents refresh failed");
                false
            }
        }
    }

    async fn fetch_and_store(&self, source: &str, path: &Path) -> Result<()> {
        let list: Vec<String> = self
            .client
            .get(source)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let agents = UserAgents::from_list(list);
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(path, serde_json::to_vec_pretty(&agents)?).await?;
        Ok(())
    }
}

async fn newest_file(dir: &Path) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let mut newest: Option<PathBuf> = None;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json")
            && newest.as_ref().map_or(true, |n| path.file_name() > n.file_name())
        {
            newest = Some(path);
        }
    }
    newest
}

async fn read_file(path: &Path) -> Result<UserAgents> {
    let data = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&data)?)
}
