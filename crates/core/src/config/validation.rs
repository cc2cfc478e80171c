//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `min_request_interval_ms` exceeds one minute
    /// - `cache_check_timeout_ms` is outside 100ms..=30s
    /// - `cache_ttl_secs` is zero
    /// - `user_agent` or a bucket name is empty
    /// - a thumbnail dimension is zero
    ///
    /// Returns `ConfigError::Missing` if only one of `storage_url` and
    /// `storage_key` is set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_request_interval_ms > 60_000 {
            return Err(ConfigError::Invalid {
                field: "min_request_interval_ms".into(),
                reason: "must not exceed 1 minute (60000ms)".into(),
            });
        }

        if self.cache_check_timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "cache_check_timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.cache_check_timeout_ms > 30_000 {
            return Err(ConfigError::Invalid {
                field: "cache_check_timeout_ms".into(),
                reason: "must not exceed 30 seconds (30000ms)".into(),
            });
        }

        if self.cache_ttl_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: "cache_ttl_secs".into(),
                reason: "must be greater than 0 when set".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        for (field, bucket) in [("favicon_bucket", &self.favicon_bucket), ("screenshot_bucket", &self.screenshot_bucket)]
        {
            if bucket.is_empty() {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must not be empty".into() });
            }
        }

        for (name, dims) in self.thumbnail_sizes.iter() {
            if dims.width == 0 || dims.height == 0 {
                return Err(ConfigError::Invalid {
                    field: format!("thumbnail_sizes.{name}"),
                    reason: "width and height must be greater than 0".into(),
                });
            }
        }

        match (&self.storage_url, &self.storage_key) {
            (Some(_), None) => {
                return Err(ConfigError::Missing {
                    field: "storage_key".into(),
                    hint: "Set MARKCACHE_STORAGE_KEY alongside MARKCACHE_STORAGE_URL".into(),
                });
            }
            (None, Some(_)) => {
                return Err(ConfigError::Missing {
                    field: "storage_url".into(),
                    hint: "Set MARKCACHE_STORAGE_URL alongside MARKCACHE_STORAGE_KEY".into(),
                });
            }
            _ => {}
        }

        if self.render_enabled && self.screenshot_api_key.is_some() {
            tracing::warn!("Both render_enabled and screenshot_api_key are set; the screenshot API takes precedence");
        }

        Ok(())
    }
}
