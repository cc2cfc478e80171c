//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (MARKCACHE_*)
//! 2. TOML config file (if MARKCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::types::ThumbnailSizes;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (MARKCACHE_*)
/// 2. TOML config file (if MARKCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
///
/// Provider credentials are all optional. A missing key switches the
/// corresponding provider off instead of failing startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the blob storage service (e.g. `https://xyz.supabase.co`).
    ///
    /// Set via MARKCACHE_STORAGE_URL. Without it the durable cache is disabled.
    #[serde(default)]
    pub storage_url: Option<String>,

    /// Service key used to authenticate against blob storage.
    ///
    /// Set via MARKCACHE_STORAGE_KEY.
    #[serde(default)]
    pub storage_key: Option<String>,

    /// Bucket holding cached favicons.
    #[serde(default = "default_favicon_bucket")]
    pub favicon_bucket: String,

    /// Bucket holding cached screenshots.
    #[serde(default = "default_screenshot_bucket")]
    pub screenshot_bucket: String,

    /// Token for the logo API favicon provider.
    ///
    /// Set via MARKCACHE_LOGO_API_TOKEN.
    #[serde(default)]
    pub logo_api_token: Option<String>,

    /// Access key for the screenshot rendering API.
    ///
    /// Set via MARKCACHE_SCREENSHOT_API_KEY.
    #[serde(default)]
    pub screenshot_api_key: Option<String>,

    /// Endpoint of the screenshot rendering API.
    #[serde(default = "default_screenshot_api_url")]
    pub screenshot_api_url: String,

    /// Whether the headless browser renderer may be used for screenshots.
    ///
    /// Only consulted when no screenshot API key is configured.
    #[serde(default)]
    pub render_enabled: bool,

    /// User-Agent string for outbound HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Refuse outbound requests to hosts resolving to private addresses.
    #[serde(default = "default_true")]
    pub block_private_hosts: bool,

    /// Minimum spacing between new resolutions for the same origin.
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,

    /// Upper bound for the durable cache existence check.
    #[serde(default = "default_cache_check_timeout_ms")]
    pub cache_check_timeout_ms: u64,

    /// Optional maximum age of a cached object. Unset means entries never expire.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,

    /// Pixel dimensions of the screenshot thumbnails.
    #[serde(default)]
    pub thumbnail_sizes: ThumbnailSizes,
}

fn default_favicon_bucket() -> String {
    "favicons".into()
}

fn default_screenshot_bucket() -> String {
    "screenshots".into()
}

fn default_screenshot_api_url() -> String {
    "https://api.screenshotone.com/take".into()
}

fn default_user_agent() -> String {
    "markcache/0.1".into()
}

fn default_min_request_interval_ms() -> u64 {
    1_000
}

fn default_cache_check_timeout_ms() -> u64 {
    2_000
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_url: None,
            storage_key: None,
            favicon_bucket: default_favicon_bucket(),
            screenshot_bucket: default_screenshot_bucket(),
            logo_api_token: None,
            screenshot_api_key: None,
            screenshot_api_url: default_screenshot_api_url(),
            render_enabled: false,
            user_agent: default_user_agent(),
            block_private_hosts: true,
            min_request_interval_ms: default_min_request_interval_ms(),
            cache_check_timeout_ms: default_cache_check_timeout_ms(),
            cache_ttl_secs: None,
            thumbnail_sizes: ThumbnailSizes::default(),
        }
    }
}

impl AppConfig {
    /// Minimum per-origin request spacing as a Duration.
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    /// Durable cache existence check timeout as a Duration.
    pub fn cache_check_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_check_timeout_ms)
    }

    /// Maximum age of cached objects, if expiry is configured.
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }

    /// Storage base URL and key, when blob storage is configured.
    pub fn storage_credentials(&self) -> Option<(&str, &str)> {
        match (self.storage_url.as_deref(), self.storage_key.as_deref()) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => Some((url, key)),
            _ => None,
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `MARKCACHE_`
    /// 2. TOML file from `MARKCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("MARKCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("MARKCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
