//! Screenshot rendering backends.
//!
//! A renderer turns a page URL into image bytes, or into a URL that serves
//! the rendered image and may be handed to callers as is.

#[cfg(feature = "render")]
mod headless;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use markcache_core::{Dimensions, Error, ResolutionSource, ScreenshotOptions};

use crate::fetch::{HttpClient, is_image_content_type};

#[cfg(feature = "render")]
pub use headless::HeadlessRenderer;

/// Errors that can occur while rendering a page.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// Failed to launch or connect to browser.
    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    /// Failed to navigate to URL.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Screenshot capture failed.
    #[error("capture failed: {0}")]
    Capture(String),

    /// Provider request could not be built.
    #[error("invalid provider request: {0}")]
    Request(String),

    /// Provider request failed or returned something other than an image.
    #[error("provider request failed: {0}")]
    Provider(String),
}

impl From<RenderError> for Error {
    fn from(err: RenderError) -> Self {
        Error::RenderFailed(err.to_string())
    }
}

/// Options for a single capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOptions {
    pub full_page: bool,
    /// Image quality, 1-100. Ignored by lossless formats.
    pub quality: u8,
    /// Delay after load before capturing.
    pub wait_for_ms: u64,
    /// Viewport dimensions (default: 1280x720).
    pub viewport: Dimensions,
    /// Budget for the whole capture.
    pub timeout: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        CaptureOptions::from(&ScreenshotOptions::default())
    }
}

impl From<&ScreenshotOptions> for CaptureOptions {
    fn from(options: &ScreenshotOptions) -> Self {
        Self {
            full_page: options.full_page,
            quality: options.quality,
            wait_for_ms: options.wait_for_ms,
            viewport: Dimensions::new(1280, 720),
            timeout: Duration::from_millis(options.timeout_ms),
        }
    }
}

/// Output of a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    /// Public URL that serves the rendered image. Must not embed credentials.
    Remote(String),
    /// Rendered image bytes.
    Image { bytes: Bytes, content_type: String },
}

/// Screenshot backend.
#[async_trait]
pub trait ScreenshotRenderer: Send + Sync {
    fn name(&self) -> &str;

    /// Provenance tag for screenshots from this renderer.
    fn source(&self) -> ResolutionSource;

    async fn capture(&self, url: &Url, options: &CaptureOptions) -> Result<Capture, RenderError>;
}

/// Hosted screenshot API addressed by query string.
///
/// The request URL carries the access key and every fetch of it is a billed
/// render, so the renderer downloads the image itself and never hands the
/// URL out.
pub struct ApiRenderer {
    http: Arc<dyn HttpClient>,
    endpoint: String,
    access_key: String,
}

impl ApiRenderer {
    pub fn new(http: Arc<dyn HttpClient>, endpoint: impl Into<String>, access_key: impl Into<String>) -> Self {
        Self { http, endpoint: endpoint.into(), access_key: access_key.into() }
    }

    fn request_url(&self, url: &Url, options: &CaptureOptions) -> Result<Url, RenderError> {
        let delay_secs = options.wait_for_ms.div_ceil(1000).to_string();
        let quality = options.quality.to_string();
        let width = options.viewport.width.to_string();
        let height = options.viewport.height.to_string();

        Url::parse_with_params(
            &self.endpoint,
            &[
                ("access_key", self.access_key.as_str()),
                ("url", url.as_str()),
                ("format", "png"),
                ("full_page", if options.full_page { "true" } else { "false" }),
                ("delay", delay_secs.as_str()),
                ("image_quality", quality.as_str()),
                ("viewport_width", width.as_str()),
                ("viewport_height", height.as_str()),
            ],
        )
        .map_err(|e| RenderError::Request(format!("{}: {e}", self.endpoint)))
    }

    /// Error text with the access key blanked out.
    fn redact(&self, message: impl std::fmt::Display) -> String {
        let message = message.to_string();
        if self.access_key.is_empty() { message } else { message.replace(&self.access_key, "[redacted]") }
    }
}

#[async_trait]
impl ScreenshotRenderer for ApiRenderer {
    fn name(&self) -> &str {
        "screenshot_api"
    }

    fn source(&self) -> ResolutionSource {
        ResolutionSource::ScreenshotApi
    }

    async fn capture(&self, url: &Url, options: &CaptureOptions) -> Result<Capture, RenderError> {
        let request = self.request_url(url, options)?;

        let response = self
            .http
            .get(request.as_str(), options.timeout)
            .await
            .map_err(|e| RenderError::Provider(self.redact(e)))?;

        match response.content_type {
            Some(content_type) if is_image_content_type(&content_type) => {
                Ok(Capture::Image { bytes: response.bytes, content_type })
            }
            other => Err(RenderError::Provider(format!(
                "{} answered with content type {}",
                self.endpoint,
                other.as_deref().unwrap_or("<none>")
            ))),
        }
    }
}
