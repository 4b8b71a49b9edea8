//! Default capture engine: Splash for rendering, the local filesystem for
//! storage, an in-process queue for asynchronous submissions.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;
use uuid::Uuid;

use lookyloo_common::error::Result;
use lookyloo_common::{LoadedTree, ReportCache, ScrapeRequest};
use lookyloo_config::{Config, EngineConfig};

use crate::crawl;
use crate::engine::CaptureEngine;
use crate::har;
use crate::reports::{self, ReportStore};
use crate::sanejs::SaneJsClient;
use crate::splash::{SplashCapture, SplashClient};
use crate::user_agents::{UserAgentStore, UserAgents};

/// Links followed per rendered page when crawling deeper than one level.
const LINKS_PER_PAGE: usize = 5;
/// Hard cap on pages rendered for one capture.
const MAX_PAGES: usize = 25;
const SNAPSHOT_PREFIX: &str = "lookyloo-";

struct QueuedScrape {
    uuid: Uuid,
    request: ScrapeRequest,
}

struct Inner {
    config: EngineConfig,
    reports: ReportStore,
    splash: SplashClient,
    sanejs: Option<SaneJsClient>,
    user_agents: UserAgentStore,
    tmp_dir: PathBuf,
}

pub struct Lookyloo {
    inner: Arc<Inner>,
    queue: mpsc::UnboundedSender<QueuedScrape>,
}

impl Lookyloo {
    /// Build the engine and spawn the queue worker. Must be called inside a
    /// tokio runtime.
    pub fn new(config: &Config) -> Result<Self> {
        let engine = &config.engine;
        let inner = Arc::new(Inner {
            config: engine.clone(),
            reports: ReportStore::new(config.scraped_dir()),
            splash: SplashClient::new(&engine.splash_url, engine.splash_wait_secs, engine.splash_timeout_secs)?,
            sanejs: engine.sanejs_url.as_deref().map(SaneJsClient::new).transpose()?,
            user_agents: UserAgentStore::new(config.user_agents_dir(), engine.user_agents_url.clone())?,
            tmp_dir: config.tmp_dir(),
        });

        let (tx, mut rx) = mpsc::unbounded_channel::<QueuedScrape>();
        let worker = Arc::clone(&inner);
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match worker.scrape_with(job.uuid, &job.request).await {
                    Ok(dir) => tracing::info!(uuid = %job.uuid, dir = %dir.display(), "queued capture done"),
                    Err(e) => tracing::error!(uuid = %job.uuid, url = %job.request.url, error = %e, "queued capture failed"),
                }
            }
        });

        tracing::info!(splash = %engine.splash_url, home = %config.home.display(), "capture engine ready");
        Ok(Self { inner, queue: tx })
    }
}

impl Inner {
    async fn scrape_with(&self, uuid: Uuid, request: &ScrapeRequest) -> Result<PathBuf> {
        let root = crawl::normalize_url(&request.url)?;
        if self.config.only_global_lookups {
            crawl::ensure_global(&root).await?;
        }

        let depth = request.depth.clamp(1, self.config.max_depth.max(1));
        let pages = self.crawl(root, depth, request.user_agent()).await?;
        self.reports.save_capture(&uuid.to_string(), request, &pages).await
    }

    /// Breadth-first render: level 1 is the root page, each further level
    /// follows same-site links of the previous one.
    async fn crawl(&self, root: Url, depth: u32, user_agent: Option<&str>) -> Result<Vec<SplashCapture>> {
        let first = self.splash.render(root.as_str(), user_agent).await?;
        let mut seen = vec![root];
        let mut level = vec![first];
        let mut pages = Vec::new();

        for _ in 1..depth {
            let mut next = Vec::new();
            for page in &level {
                let (Some(html), Ok(base)) = (page.html.as_deref(), Url::parse(&page.url)) else {
                    continue;
                };
                for link in crawl::same_site_links(&base, html, LINKS_PER_PAGE) {
                    if seen.contains(&link) || pages.len() + level.len() + next.len() >= MAX_PAGES {
                        continue;
                    }
                    seen.push(link.clone());
                    match self.splash.render(link.as_str(), user_agent).await {
                        Ok(rendered) => next.push(rendered),
                        Err(e) => tracing::warn!(url = %link, error = %e, "skipping page"),
                    }
                }
            }
            pages.append(&mut level);
            if next.is_empty() {
                break;
            }
            level = next;
        }
        pages.append(&mut level);
        Ok(pages)
    }

    fn snapshot_path(&self) -> PathBuf {
        self.tmp_dir.join(format!("{SNAPSHOT_PREFIX}{}.json", Uuid::new_v4()))
    }
}

#[async_trait]
impl CaptureEngine for Lookyloo {
    async fn enqueue_scrape(&self, request: ScrapeRequest) -> Result<Uuid> {
        // Reject garbage before handing out an identifier.
        crawl::normalize_url(&request.url)?;
        let uuid = Uuid::new_v4();
        self.queue
            .send(QueuedScrape { uuid, request })
            .map_err(|_| anyhow::anyhow!("capture queue worker is gone"))?;
        tracing::debug!(%uuid, "capture queued");
        Ok(uuid)
    }

    async fn scrape(&self, request: ScrapeRequest) -> Result<Uuid> {
        let uuid = Uuid::new_v4();
        self.inner.scrape_with(uuid, &request).await?;
        Ok(uuid)
    }

    async fn lookup_report_dir(&self, uuid: &str) -> Result<Option<PathBuf>> {
        self.inner.reports.lookup(uuid).await
    }

    async fn load_tree(&self, report_dir: &Path) -> Result<LoadedTree> {
        let capture_uuid = reports::read_uuid(report_dir).await.unwrap_or_else(|| {
            report_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        let hars = har::read_hars(report_dir).await?;
        let tree = har::build_tree(&capture_uuid, &hars, report_dir)?;

        tokio::fs::create_dir_all(&self.inner.tmp_dir).await?;
        let snapshot_path = self.inner.snapshot_path();
        tree.write_snapshot(&snapshot_path).await?;

        Ok(LoadedTree {
            snapshot_path,
            tree_json: tree.to_tree_json(),
            start_time: tree.start_time,
            user_agent: tree.user_agent,
            root_url: tree.root_url,
            meta: reports::read_meta(report_dir).await,
        })
    }

    async fn sane_js_query(&self, body_hash: &str) -> Value {
        match &self.inner.sanejs {
            Some(client) => client.query(body_hash).await,
            None => Value::Object(Default::default()),
        }
    }

    async fn cleanup_old_tmpfiles(&self) -> Result<usize> {
        let max_age = Duration::from_secs(self.inner.config.tmp_max_age_hours * 3600);
        remove_older_than(&self.inner.tmp_dir, max_age, SystemTime::now()).await
    }

    async fn load_image(&self, report_dir: &Path) -> Result<Vec<u8>> {
        reports::load_image(report_dir).await
    }

    async fn report_dirs(&self) -> Result<Vec<PathBuf>> {
        self.inner.reports.report_dirs().await
    }

    async fn report_cache(&self, report_dir: &Path) -> Result<Option<ReportCache>> {
        self.inner.reports.cache(report_dir).await
    }

    async fn user_agents(&self) -> UserAgents {
        self.inner.user_agents.latest().await
    }

    async fn update_user_agents(&self) {
        self.inner.user_agents.update(chrono::Utc::now().date_naive()).await;
    }
}

/// Delete snapshot files last modified before `now - max_age`.
async fn remove_older_than(dir: &Path, max_age: Duration, now: SystemTime) -> Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_name().to_string_lossy().starts_with(SNAPSHOT_PREFIX) {
            continue;
        }
        // A concurrent sweep may have removed the file already.
        let modified = match entry.metadata().await {
            Ok(meta) => meta.modified()?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        let age = now.duration_since(modified).unwrap_or_default();
        if age > max_age {
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
    if removed > 0 {
        tracing::debug!(removed, dir = %dir.display(), "old tree snapshots removed");
    }
    Ok(removed)
}
