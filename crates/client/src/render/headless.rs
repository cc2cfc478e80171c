//! Headless Chrome/Chromium renderer using chromiumoxide.

use async_trait::async_trait;
use bytes::Bytes;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use futures_util::StreamExt;
use std::time::Duration;
use url::Url;

use markcache_core::{Dimensions, ResolutionSource};

use super::{Capture, CaptureOptions, RenderError, ScreenshotRenderer};

/// Local browser capturing PNG screenshots.
pub struct HeadlessRenderer {
    browser: Browser,
}

impl HeadlessRenderer {
    /// Launch a headless browser with the given viewport.
    ///
    /// The browser uses a background task to handle Chrome DevTools Protocol
    /// events for as long as it lives.
    pub async fn launch(viewport: Dimensions) -> Result<Self, RenderError> {
        let config = BrowserConfig::builder()
            .window_size(viewport.width, viewport.height)
            .build()
            .map_err(RenderError::BrowserLaunch)?;

        let (browser, mut handler) =
            Browser::launch(config).await.map_err(|e| RenderError::BrowserLaunch(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler event error: {e}");
                    break;
                }
            }
        });

        tracing::info!("headless browser launched");
        Ok(Self { browser })
    }
}

#[async_trait]
impl ScreenshotRenderer for HeadlessRenderer {
    fn name(&self) -> &str {
        "headless"
    }

    fn source(&self) -> ResolutionSource {
        ResolutionSource::Headless
    }

    async fn capture(&self, url: &Url, options: &CaptureOptions) -> Result<Capture, RenderError> {
        let page = self
            .browser
            .new_page(url.as_str())
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))?;
        let guard = OpenPage(Some(page.clone()));

        let result = screenshot(&page, url, options).await;
        guard.close().await;
        result
    }
}

/// Navigate, settle and capture. Navigation plus the settle delay must fit
/// in the capture budget.
async fn screenshot(page: &Page, url: &Url, options: &CaptureOptions) -> Result<Capture, RenderError> {
    let settle = Duration::from_millis(options.wait_for_ms);
    let navigation_budget = options.timeout.saturating_sub(settle);

    match tokio::time::timeout(navigation_budget, page.wait_for_navigation()).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => return Err(RenderError::Navigation(e.to_string())),
        Err(_) => {
            return Err(RenderError::Navigation(format!(
                "{url} did not load within {}ms",
                navigation_budget.as_millis()
            )));
        }
    }

    if !settle.is_zero() {
        tokio::time::sleep(settle).await;
    }

    let params = ScreenshotParams::builder()
        .format(CaptureScreenshotFormat::Png)
        .full_page(options.full_page)
        .build();

    let bytes = page.screenshot(params).await.map_err(|e| RenderError::Capture(e.to_string()))?;
    Ok(Capture::Image { bytes: Bytes::from(bytes), content_type: "image/png".to_string() })
}

/// A browser tab that is closed on every exit path.
///
/// Dropping it unclosed, as happens when the capture future is cancelled by
/// a timeout, spawns the close onto the runtime.
struct OpenPage(Option<Page>);

impl OpenPage {
    async fn close(mut self) {
        if let Some(page) = self.0.take()
            && let Err(e) = page.close().await
        {
            tracing::debug!("failed to close page: {e}");
        }
    }
}

impl Drop for OpenPage {
    fn drop(&mut self) {
        let Some(page) = self.0.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = page.close().await {
                        tracing::debug!("failed to close abandoned page: {e}");
                    }
                });
            }
            Err(_) => tracing::warn!("no runtime to close abandoned page"),
        }
    }
}
