//! Capture requests, as submitted through the JSON API or the scrape form.

use serde::{Deserialize, Deserializer, Serialize};

/// Depth used when the request does not specify one.
pub const DEFAULT_DEPTH: u32 = 1;

/// One capture request.
///
/// Every field except `url` is optional. `depth` and `listing` accept both
/// JSON scalars and the strings an HTML form sends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub url: String,
    #[serde(default = "default_depth", deserialize_with = "lenient_depth")]
    pub depth: u32,
    /// Whether the capture shows up on the index page.
    #[serde(default = "default_listing", deserialize_with = "lenient_flag")]
    pub listing: bool,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub browser: Option<String>,
}

fn default_depth() -> u32 { DEFAULT_DEPTH }
fn default_listing() -> bool { true }

impl ScrapeRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: DEFAULT_DEPTH,
            listing: true,
            user_agent: None,
            os: None,
            browser: None,
        }
    }

    /// The user agent to send, if a non-empty one was requested.
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref().map(str::trim).filter(|ua| !ua.is_empty())
    }
}

/// Interpret a form value as a boolean flag.
///
/// Checkboxes send their value only when ticked, so anything but an explicit
/// negative counts as set.
pub fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

/// Interpret a form value as a crawl depth, falling back to the default.
pub fn parse_depth(value: &str) -> u32 {
    value.trim().parse::<u32>().ok().filter(|d| *d > 0).unwrap_or(DEFAULT_DEPTH)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Null(()),
}

fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Bool(b) => b,
        Scalar::Int(i) => i != 0,
        Scalar::Float(f) => f != 0.0,
        Scalar::Text(s) => parse_flag(&s),
        Scalar::Null(()) => true,
    })
}

fn lenient_depth<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Int(i) if i > 0 => u32::try_from(i).unwrap_or(u32::MAX),
        // Saturating cast: 2.7 gives 2, huge values give u32::MAX.
        Scalar::Float(f) if f >= 1.0 => f as u32,
        Scalar::Text(s) => parse_depth(&s),
        _ => DEFAULT_DEPTH,
    })
}
