use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use zsearch_api::{
    ContentSize, RecencyFilter, RetryConfig, SearchEngine, WebSearchClient, WebSearchRequest,
    DEFAULT_BASE_URL,
};

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "BIGMODEL_API_KEY";
/// Environment variable overriding the endpoint
pub const BASE_URL_ENV: &str = "ZSEARCH_BASE_URL";

/// Main configuration structure
///
/// Loaded from the config file, then env vars, then CLI flags.
/// Priority: CLI > Env > File > Defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub search: SearchDefaults,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Load config from the default location, falling back to defaults
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load config from an explicit path; a missing file means defaults
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let contents = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents).map_err(|e| {
                crate::Error::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
            })?;
            Ok(config)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> crate::Result<PathBuf> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the config file path (XDG on Linux, AppData on Windows)
    pub fn config_path() -> crate::Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| crate::Error::ConfigError("Could not find config directory".into()))?
            .join("zsearch");

        Ok(config_dir.join("config.toml"))
    }

    /// Overlay environment variables on top of file values
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            debug!("Using API key from {}", API_KEY_ENV);
            self.api.key = Some(key);
        }
        if let Some(url) = lookup(BASE_URL_ENV).filter(|u| !u.trim().is_empty()) {
            debug!("Using endpoint from {}", BASE_URL_ENV);
            self.api.base_url = url;
        }
    }

    /// Overlay command-line flags; these win over both file and environment
    pub fn apply_overrides(&mut self, api_key: Option<String>, base_url: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.api.key = Some(key);
        }
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.api.base_url = url;
        }
    }

    /// The configured API key, or an error telling the user where to put one
    pub fn api_key(&self) -> crate::Result<String> {
        self.api
            .key
            .as_ref()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| zsearch_api::ApiError::MissingApiKey.into())
    }

    /// Build a client from the resolved settings
    pub fn client(&self) -> crate::Result<WebSearchClient> {
        Ok(WebSearchClient::new(self.api_key()?)
            .with_base_url(self.api.base_url.clone())
            .with_timeout(Duration::from_secs(self.api.timeout_secs))
            .with_retry_config(self.retry.clone()))
    }

    /// A request pre-filled with the configured defaults
    pub fn request(&self, query: impl Into<String>) -> WebSearchRequest {
        WebSearchRequest::new(query)
            .engine(self.search.engine)
            .count(self.search.count)
            .recency(self.search.recency)
            .content_size(self.search.content_size)
    }

    /// Copy safe to print: the key is masked down to its last four characters
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.api.key = self.api.key.as_deref().map(mask_key);
        copy
    }
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// BigModel API key, get one at https://open.bigmodel.cn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: None,
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Defaults applied to every search unless overridden on the command line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDefaults {
    #[serde(default)]
    pub engine: SearchEngine,

    #[serde(default = "default_count")]
    pub count: u32,

    #[serde(default)]
    pub recency: RecencyFilter,

    #[serde(default)]
    pub content_size: ContentSize,
}

fn default_count() -> u32 {
    zsearch_api::types::DEFAULT_COUNT
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            engine: SearchEngine::default(),
            count: default_count(),
            recency: RecencyFilter::default(),
            content_size: ContentSize::default(),
        }
    }
}
