//! Configuration loading for Lookyloo.
//! Reads lookyloo.toml from the current directory or the path in the
//! LOOKYLOO_CONFIG env var. Every field has a default, so the file is optional.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod secret;


pub use secret::{load_or_create_secret_key, SecretKey, SECRET_KEY_LEN};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Secret key error: {0}")]
    Secret(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the on-disk state: captures, snapshots, user agents, secret key.
    #[serde(default = "default_home")]
    pub home: PathBuf,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_home() -> PathBuf { PathBuf::from(".") }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory served under /static; the web crate's bundled assets when unset.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_bind()       -> String  { "0.0.0.0:5100".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_splash_url")]
    pub splash_url: String,
    /// SaneJS lookup endpoint; body hash lookups are skipped when unset.
    #[serde(default)]
    pub sanejs_url: Option<String>,
    /// Refuse to capture hosts resolving to private or reserved addresses.
    /// Set it on publicly reachable instances.
    #[serde(default)]
    pub only_global_lookups: bool,
    #[serde(default = "default_tmp_max_age_hours")]
    pub tmp_max_age_hours: u64,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_splash_wait")]
    pub splash_wait_secs: f64,
    #[serde(default = "default_splash_timeout")]
    pub splash_timeout_secs: u64,
    /// Remote list of user agents, refreshed once a day.
    #[serde(default)]
    pub user_agents_url: Option<String>,
}

fn default_splash_url()        -> String { "http://127.0.0.1:8050".to_string() }
fn default_tmp_max_age_hours() -> u64    { 10 }
fn default_max_depth()         -> u32    { 5 }
fn default_splash_wait()       -> f64    { 2.0 }
fn default_splash_timeout()    -> u64    { 90 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind(), static_dir: None }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            splash_url: default_splash_url(),
            sanejs_url: None,
            only_global_lookups: false,
            tmp_max_age_hours: default_tmp_max_age_hours(),
            max_depth: default_max_depth(),
            splash_wait_secs: default_splash_wait(),
            splash_timeout_secs: default_splash_timeout(),
            user_agents_url: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            home: default_home(),
            server: ServerConfig::default(),
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load `.env`, the TOML file (if any), then apply env overrides.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let explicit = std::env::var("LOOKYLOO_CONFIG").ok().map(PathBuf::from);
        let path = explicit.clone().unwrap_or_else(|| PathBuf::from("lookyloo.toml"));

        let mut config = if explicit.is_some() || path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// SPLASH_URL and LOOKYLOO_HOME win over the file.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SPLASH_URL").filter(|v| !v.is_empty()) {
            self.engine.splash_url = url;
        }
        if let Some(home) = lookup("LOOKYLOO_HOME").filter(|v| !v.is_empty()) {
            self.home = PathBuf::from(home);
        }
    }

    pub fn scraped_dir(&self) -> PathBuf { self.home.join("scraped") }
    pub fn tmp_dir(&self) -> PathBuf { self.home.join("tmp") }
    pub fn user_agents_dir(&self) -> PathBuf { self.home.join("user_agents") }
    pub fn secret_key_path(&self) -> PathBuf { self.home.join("secret_key") }
}
