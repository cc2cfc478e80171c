//! Request options and result types shared by the favicon and screenshot caches.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Largest favicon edge length accepted.
pub const MAX_FAVICON_SIZE: u32 = 512;

/// Longest post-load wait accepted for screenshots.
pub const MAX_WAIT_FOR_MS: u64 = 60_000;

/// Provenance of a resolved resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Served from the durable cache without running the source chain.
    Cache,
    /// Google's size-parameterized favicon redirect service.
    Google,
    /// Keyed logo API.
    LogoApi,
    /// DuckDuckGo icon API.
    #[serde(rename = "duckduckgo")]
    DuckDuckGo,
    /// Probed directly on the bookmarked site.
    Direct,
    /// Hosted screenshot rendering API.
    ScreenshotApi,
    /// Local headless browser.
    Headless,
    /// Deterministic placeholder.
    Fallback,
}

impl ResolutionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionSource::Cache => "cache",
            ResolutionSource::Google => "google",
            ResolutionSource::LogoApi => "logo_api",
            ResolutionSource::DuckDuckGo => "duckduckgo",
            ResolutionSource::Direct => "direct",
            ResolutionSource::ScreenshotApi => "screenshot_api",
            ResolutionSource::Headless => "headless",
            ResolutionSource::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a favicon lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaviconOptions {
    /// Edge length in pixels.
    pub size: u32,
    /// Consult and populate the durable cache.
    pub use_cache: bool,
    /// Per-strategy attempt timeout.
    pub timeout_ms: u64,
    /// Use the per-domain lettered avatar as fallback; otherwise a neutral icon.
    pub fallback_to_generic: bool,
}

impl Default for FaviconOptions {
    fn default() -> Self {
        Self { size: 32, use_cache: true, timeout_ms: 5_000, fallback_to_generic: true }
    }
}

impl FaviconOptions {
    pub fn validate(&self) -> Result<(), Error> {
        if self.size == 0 || self.size > MAX_FAVICON_SIZE {
            return Err(Error::InvalidInput(format!("size must be between 1 and {MAX_FAVICON_SIZE}")));
        }
        if self.timeout_ms == 0 {
            return Err(Error::InvalidInput("timeout_ms must be greater than 0".into()));
        }
        Ok(())
    }
}

/// Options for a screenshot lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotOptions {
    /// Consult and populate the durable cache.
    pub use_cache: bool,
    /// Per-strategy attempt timeout.
    pub timeout_ms: u64,
    /// Image quality, 1-100.
    pub quality: u8,
    /// Capture the full scrollable page instead of the viewport.
    pub full_page: bool,
    /// Produce small/medium/large thumbnail URLs.
    pub generate_thumbnails: bool,
    /// Delay after page load before capturing.
    pub wait_for_ms: u64,
}

impl Default for ScreenshotOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            timeout_ms: 15_000,
            quality: 80,
            full_page: false,
            generate_thumbnails: true,
            wait_for_ms: 2_000,
        }
    }
}

impl ScreenshotOptions {
    pub fn validate(&self) -> Result<(), Error> {
        if self.timeout_ms == 0 {
            return Err(Error::InvalidInput("timeout_ms must be greater than 0".into()));
        }
        if self.quality == 0 || self.quality > 100 {
            return Err(Error::InvalidInput("quality must be between 1 and 100".into()));
        }
        if self.wait_for_ms > MAX_WAIT_FOR_MS {
            return Err(Error::InvalidInput(format!("wait_for_ms must not exceed {MAX_WAIT_FOR_MS}")));
        }
        Ok(())
    }
}

/// Resolved favicon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FaviconResult {
    pub url: String,
    pub source: ResolutionSource,
    pub cached: bool,
    pub size: u32,
}

/// Thumbnail URLs for a screenshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Thumbnails {
    pub small: String,
    pub medium: String,
    pub large: String,
}

impl Thumbnails {
    /// All three sizes pointing at the same image.
    pub fn uniform(url: &str) -> Self {
        Self { small: url.to_string(), medium: url.to_string(), large: url.to_string() }
    }
}

/// Resolved screenshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ScreenshotResult {
    pub url: String,
    pub thumbnails: Thumbnails,
    pub source: ResolutionSource,
    pub cached: bool,
}

/// Pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Target sizes for screenshot thumbnails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailSizes {
    #[serde(default = "default_small")]
    pub small: Dimensions,
    #[serde(default = "default_medium")]
    pub medium: Dimensions,
    #[serde(default = "default_large")]
    pub large: Dimensions,
}

fn default_small() -> Dimensions {
    Dimensions::new(320, 180)
}

fn default_medium() -> Dimensions {
    Dimensions::new(640, 360)
}

fn default_large() -> Dimensions {
    Dimensions::new(1280, 720)
}

impl Default for ThumbnailSizes {
    fn default() -> Self {
        Self { small: default_small(), medium: default_medium(), large: default_large() }
    }
}

impl ThumbnailSizes {
    /// Named sizes in small → large order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Dimensions)> {
        [("small", self.small), ("medium", self.medium), ("large", self.large)].into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_favicon_defaults() {
        let opts = FaviconOptions::default();
        assert_eq!(opts.size, 32);
        assert!(opts.use_cache);
        assert_eq!(opts.timeout_ms, 5_000);
        assert!(opts.fallback_to_generic);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_screenshot_defaults() {
        let opts = ScreenshotOptions::default();
        assert!(opts.use_cache);
        assert_eq!(opts.timeout_ms, 15_000);
        assert_eq!(opts.quality, 80);
        assert!(!opts.full_page);
        assert!(opts.generate_thumbnails);
        assert_eq!(opts.wait_for_ms, 2_000);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_favicon_options_rejected() {
        let zero_timeout = FaviconOptions { timeout_ms: 0, ..Default::default() };
        assert!(matches!(zero_timeout.validate(), Err(Error::InvalidInput(_))));

        let huge = FaviconOptions { size: 1024, ..Default::default() };
        assert!(matches!(huge.validate(), Err(Error::InvalidInput(_))));

        let zero = FaviconOptions { size: 0, ..Default::default() };
        assert!(matches!(zero.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_screenshot_options_rejected() {
        let bad_quality = ScreenshotOptions { quality: 0, ..Default::default() };
        assert!(matches!(bad_quality.validate(), Err(Error::InvalidInput(_))));

        let bad_quality = ScreenshotOptions { quality: 101, ..Default::default() };
        assert!(matches!(bad_quality.validate(), Err(Error::InvalidInput(_))));

        let long_wait = ScreenshotOptions { wait_for_ms: 60_001, ..Default::default() };
        assert!(matches!(long_wait.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_source_serialization() {
        assert_eq!(serde_json::to_string(&ResolutionSource::DuckDuckGo).unwrap(), "\"duckduckgo\"");
        assert_eq!(serde_json::to_string(&ResolutionSource::LogoApi).unwrap(), "\"logo_api\"");
        assert_eq!(serde_json::to_string(&ResolutionSource::Fallback).unwrap(), "\"fallback\"");
        assert_eq!(ResolutionSource::ScreenshotApi.to_string(), "screenshot_api");
    }

    #[test]
    fn test_thumbnails_uniform() {
        let thumbs = Thumbnails::uniform("https://cdn.example.com/shot.png");
        assert_eq!(thumbs.small, thumbs.large);
        assert_eq!(thumbs.medium, "https://cdn.example.com/shot.png");
    }
}
