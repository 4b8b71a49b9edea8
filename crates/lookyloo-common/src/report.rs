//! Summary of a stored capture, as listed on the index page.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportCache {
    pub uuid: String,
    pub title: String,
    pub timestamp: String,
    pub url: String,
    /// Set when the capture was requested without listing.
    #[serde(default)]
    pub no_index: bool,
}

impl ReportCache {
    pub fn is_listed(&self) -> bool {
        !self.no_index
    }
}
