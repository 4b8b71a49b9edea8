//! lookyloo-common — Shared types and errors used across all Lookyloo crates.

pub mod error;
pub mod report;
pub mod scrape;
pub mod tree;

// Re-export commonly used types
pub use report::ReportCache;
pub use scrape::ScrapeRequest;
pub use tree::{CaptureTree, HostNode, LoadedTree, UrlNode};
