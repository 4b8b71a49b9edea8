//! The capture engine seam used by the web layer.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use lookyloo_common::error::Result;
use lookyloo_common::{LoadedTree, ReportCache, ScrapeRequest};

use crate::user_agents::UserAgents;

#[async_trait]
pub trait CaptureEngine: Send + Sync {
    /// Queue a capture and return its identifier without waiting for it.
    async fn enqueue_scrape(&self, request: ScrapeRequest) -> Result<Uuid>;

    /// Run a capture to completion.
    async fn scrape(&self, request: ScrapeRequest) -> Result<Uuid>;

    async fn lookup_report_dir(&self, uuid: &str) -> Result<Option<PathBuf>>;

    /// Build the capture tree of a report and snapshot it to disk.
    async fn load_tree(&self, report_dir: &Path) -> Result<LoadedTree>;

    /// SaneJS lookup for a SHA-512 body hash.
    async fn sane_js_query(&self, body_hash: &str) -> Value;

    /// Drop tree snapshots past their maximum age.
    async fn cleanup_old_tmpfiles(&self) -> Result<usize>;

    async fn load_image(&self, report_dir: &Path) -> Result<Vec<u8>>;

    /// Report directories, newest first.
    async fn report_dirs(&self) -> Result<Vec<PathBuf>>;

    async fn report_cache(&self, report_dir: &Path) -> Result<Option<ReportCache>>;

    async fn user_agents(&self) -> UserAgents;

    async fn update_user_agents(&self);
}
