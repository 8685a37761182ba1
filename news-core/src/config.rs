use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::error::ConfigError;
use crate::news::{SortMode, DEFAULT_PAGE_SIZE};

pub const CONFIG_PATH_ENV: &str = "NEWS_TRACKER_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub tracker: TrackerConfig,
    pub server: ServerConfig,
    pub trending: TrendingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub news_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Refresh schedule used when a subscriber does not name one.
    pub default_interval: String,
    pub default_page_size: u32,
    pub default_sort: SortMode,
    pub delivery_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendingConfig {
    pub keywords: Vec<String>,
    pub page_size: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openapi.naver.com/v1/search".to_owned(),
            news_endpoint: "/news.json".to_owned(),
            client_id: String::new(),
            client_secret: String::new(),
            request_timeout_seconds: 10,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            // every five minutes
            default_interval: "*/5 * * * *".to_owned(),
            default_page_size: DEFAULT_PAGE_SIZE,
            default_sort: SortMode::Date,
            delivery_timeout_ms: 5_000,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_owned(),
            port: 3000,
        }
    }
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            keywords: vec!["뉴스".to_owned(), "속보".to_owned(), "이슈".to_owned()],
            page_size: 5,
        }
    }
}

impl ApiConfig {
    /// Full URL of the news search endpoint.
    pub fn endpoint_url(&self) -> Result<Url, url::ParseError> {
        let base = self.base_url.trim_end_matches('/');
        let path = self.news_endpoint.trim_start_matches('/');
        Url::parse(&format!("{base}/{path}"))
    }
}

impl TrackerConfig {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

impl AppConfig {
    /// Default location: `$NEWS_TRACKER_CONFIG`, else `<config dir>/news-tracker/config.json`.
    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("news-tracker").join("config.json"))
    }

    /// Loads the configuration from the default location, falling back to defaults.
    pub fn load() -> Self {
        let config = match Self::config_file_path() {
            Ok(path) => Self::load_from(&path),
            Err(e) => {
                warn!(error = %e, "no configuration path, using defaults");
                Self::default()
            }
        };
        config.apply_env()
    }

    /// Loads `path`, or defaults when the file is missing or unreadable.
    pub fn load_from(path: &Path) -> Self {
        match Self::read_file(path) {
            Ok(config) => config,
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to load configuration, using defaults");
                Self::default()
            }
        }
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Overrides credentials and port from the process environment.
    pub fn apply_env(self) -> Self {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    pub fn apply_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(id) = lookup("NAVER_CLIENT_ID") {
            self.api.client_id = id;
        }
        if let Some(secret) = lookup("NAVER_CLIENT_SECRET") {
            self.api.client_secret = secret;
        }
        if let Some(port) = lookup("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(%port, "ignoring invalid PORT"),
            }
        }
        self
    }
}
