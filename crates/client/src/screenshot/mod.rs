//! Screenshot cache.
//!
//! Same lookup shape as the favicon cache, keyed by canonical page URL and
//! rate-limited per host. The chain holds a single rendering backend: the
//! hosted API when a key is configured, otherwise the local browser when
//! rendering is enabled. Both produce image bytes that are served from blob
//! storage, so without storage the chain is empty and every lookup is a
//! placeholder.

pub mod fallback;
pub mod thumbnail;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use markcache_core::cache::screenshot_cache_key;
use markcache_core::{
    AppConfig, CacheKey, Error, ResolutionSource, ScreenshotOptions, ScreenshotResult, ThumbnailSizes, Thumbnails,
};

pub use fallback::fallback_screenshot;
pub use thumbnail::{PassthroughThumbnails, ThumbnailGenerator};

use crate::bulk;
use crate::cache::DurableCache;
use crate::fetch::{HttpClient, normalize_page_url, origin_of};
use crate::gate::{Admission, RequestGate, Ticket};
use crate::render::{ApiRenderer, Capture, CaptureOptions, ScreenshotRenderer};
use crate::resolve::{Resource, SourceChain, SourceStrategy};

/// What screenshot strategies are asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotRequest {
    /// Canonical page URL.
    pub url: Url,
    pub capture: CaptureOptions,
}

/// Adapts a [`ScreenshotRenderer`] to the source chain.
pub struct RenderStrategy {
    renderer: Arc<dyn ScreenshotRenderer>,
}

impl RenderStrategy {
    pub fn new(renderer: Arc<dyn ScreenshotRenderer>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl SourceStrategy<ScreenshotRequest> for RenderStrategy {
    fn name(&self) -> &str {
        self.renderer.name()
    }

    fn source(&self) -> ResolutionSource {
        self.renderer.source()
    }

    async fn candidate(&self, request: &ScreenshotRequest, _timeout: Duration) -> Result<Resource, Error> {
        match self.renderer.capture(&request.url, &request.capture).await? {
            Capture::Remote(url) => Ok(Resource::remote(url)),
            Capture::Image { bytes, content_type } => Ok(Resource::Inline { bytes, content_type }),
        }
    }
}

/// The screenshot chain for `config`.
pub async fn default_screenshot_chain(http: Arc<dyn HttpClient>, config: &AppConfig) -> SourceChain<ScreenshotRequest> {
    let chain = SourceChain::new(Arc::clone(&http));

    if config.storage_credentials().is_none() {
        tracing::info!("blob storage not configured, screenshots will be placeholders");
        return chain;
    }

    if let Some(key) = config.screenshot_api_key.as_deref().filter(|k| !k.is_empty()) {
        tracing::info!(endpoint = %config.screenshot_api_url, "screenshots rendered by hosted API");
        let renderer = ApiRenderer::new(http, config.screenshot_api_url.as_str(), key);
        return chain.with_strategy(RenderStrategy::new(Arc::new(renderer)));
    }

    if config.render_enabled
        && let Some(renderer) = launch_headless(config).await
    {
        return chain.with_strategy(RenderStrategy::new(renderer));
    }

    tracing::info!("no screenshot renderer configured, screenshots will be placeholders");
    chain
}

#[cfg(feature = "render")]
async fn launch_headless(config: &AppConfig) -> Option<Arc<dyn ScreenshotRenderer>> {
    match crate::render::HeadlessRenderer::launch(config.thumbnail_sizes.large).await {
        Ok(renderer) => Some(Arc::new(renderer)),
        Err(e) => {
            tracing::warn!(error = %e, "headless renderer unavailable");
            None
        }
    }
}

#[cfg(not(feature = "render"))]
async fn launch_headless(_config: &AppConfig) -> Option<Arc<dyn ScreenshotRenderer>> {
    tracing::warn!("render_enabled is set but this build has no headless renderer");
    None
}

struct Inner {
    chain: SourceChain<ScreenshotRequest>,
    cache: DurableCache,
    gate: RequestGate<ScreenshotResult>,
    thumbnails: Arc<dyn ThumbnailGenerator>,
    sizes: ThumbnailSizes,
}

/// Screenshot lookups with deduplication, caching and fallback.
#[derive(Clone)]
pub struct ScreenshotService {
    inner: Arc<Inner>,
}

impl ScreenshotService {
    pub fn new(
        chain: SourceChain<ScreenshotRequest>, cache: DurableCache, gate: RequestGate<ScreenshotResult>,
        thumbnails: Arc<dyn ThumbnailGenerator>, sizes: ThumbnailSizes,
    ) -> Self {
        Self { inner: Arc::new(Inner { chain, cache, gate, thumbnails, sizes }) }
    }

    pub fn gate(&self) -> &RequestGate<ScreenshotResult> {
        &self.inner.gate
    }

    /// Resolve a screenshot of the page at `url`.
    ///
    /// Only invalid input is an error; every other failure ends in a
    /// placeholder result.
    pub async fn resolve(&self, url: &str, options: &ScreenshotOptions) -> Result<ScreenshotResult, Error> {
        options.validate()?;
        let url = normalize_page_url(url)?;
        let origin = origin_of(&url);
        let key = screenshot_cache_key(url.as_str(), &origin, options.quality, options.full_page);

        match self.inner.gate.acquire(&key, &origin) {
            Admission::Joined(in_flight) => {
                tracing::debug!(key = %key, "joining in-flight screenshot lookup");
                in_flight.wait().await
            }
            Admission::RateLimited => {
                if let Some(cached) = self.inner.cached(&key, options).await {
                    return Ok(cached);
                }
                tracing::debug!(origin = %origin, "screenshot lookup rate limited, using placeholder");
                Ok(fallback_screenshot(&origin, &self.inner.sizes, options.generate_thumbnails))
            }
            Admission::Proceed(ticket) => {
                let inner = Arc::clone(&self.inner);
                let options = options.clone();
                // Callers may be cancelled; the shared lookup must not be.
                let lookup = tokio::spawn(async move {
                    let result = inner.lookup(url, &origin, &ticket, &options).await;
                    ticket.settle(Ok(result.clone()));
                    result
                });
                lookup
                    .await
                    .map_err(|e| Error::Internal(format!("screenshot lookup for {key} failed: {e}")))
            }
        }
    }

    /// Resolve many pages concurrently, keyed by the input strings.
    ///
    /// Pages whose lookup fails are left out of the map.
    pub async fn resolve_many(
        &self, urls: Vec<String>, options: &ScreenshotOptions,
    ) -> HashMap<String, ScreenshotResult> {
        let options = options.clone();
        bulk::resolve_many(urls, |url: String| {
            let service = self.clone();
            let options = options.clone();
            async move { service.resolve(&url, &options).await }
        })
        .await
    }
}

impl Inner {
    /// The durable cache's answer for `key`, when caching is requested.
    async fn cached(&self, key: &CacheKey, options: &ScreenshotOptions) -> Option<ScreenshotResult> {
        if !options.use_cache {
            return None;
        }
        let url = self.cache.get(key).await?;
        Some(self.finish(url, ResolutionSource::Cache, true, options).await)
    }

    async fn lookup(
        &self, url: Url, origin: &str, ticket: &Ticket<ScreenshotResult>, options: &ScreenshotOptions,
    ) -> ScreenshotResult {
        let key = ticket.key();
        if let Some(cached) = self.cached(key, options).await {
            ticket.refund_attempt();
            return cached;
        }

        let request = ScreenshotRequest { url, capture: CaptureOptions::from(options) };
        let timeout = Duration::from_millis(options.timeout_ms);

        if let Some(resolved) = self.chain.resolve(&request, key.as_str(), timeout).await {
            if let Some(published) = self.cache.publish(key, &resolved.resource, options.use_cache).await {
                return self.finish(published, resolved.source, false, options).await;
            }
            tracing::warn!(key = %key, strategy = %resolved.strategy, "rendered screenshot could not be published");
        }

        fallback_screenshot(origin, &self.sizes, options.generate_thumbnails)
    }

    async fn finish(
        &self, url: String, source: ResolutionSource, cached: bool, options: &ScreenshotOptions,
    ) -> ScreenshotResult {
        let thumbnails = if options.generate_thumbnails {
            match self.thumbnails.thumbnails(&url, &self.sizes).await {
                Ok(thumbnails) => thumbnails,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "thumbnail generation failed");
                    Thumbnails::uniform(&url)
                }
            }
        } else {
            Thumbnails::uniform(&url)
        };

        ScreenshotResult { url, thumbnails, source, cached }
    }
}
