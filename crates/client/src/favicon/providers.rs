//! Favicon source strategies.
//!
//! The hosted providers only build a URL; the chain's `HEAD` validation is
//! what actually talks to them. The domain goes into those URLs escaped, as
//! a query value or a single path segment. Direct probes guess well-known paths on the
//! site itself, and link discovery reads the homepage.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use markcache_core::{Error, ResolutionSource};

use super::FaviconRequest;
use crate::fetch::HttpClient;
use crate::resolve::{Resource, SourceStrategy};

/// Well-known icon paths probed on the site, in order.
pub const DIRECT_PATHS: [&str; 3] = ["/favicon.ico", "/favicon.png", "/apple-touch-icon.png"];

/// Google's size-parameterized favicon service.
#[derive(Debug, Clone, Default)]
pub struct GoogleFavicons;

#[async_trait]
impl SourceStrategy<FaviconRequest> for GoogleFavicons {
    fn name(&self) -> &str {
        "google"
    }

    fn source(&self) -> ResolutionSource {
        ResolutionSource::Google
    }

    async fn candidate(&self, request: &FaviconRequest, _timeout: Duration) -> Result<Resource, Error> {
        let size = request.size.to_string();
        let url = Url::parse_with_params(
            "https://www.google.com/s2/favicons",
            &[("domain", request.domain.as_str()), ("sz", size.as_str())],
        )
        .map_err(|e| Error::Internal(format!("google favicon URL: {e}")))?;
        Ok(Resource::remote(url))
    }
}

/// Keyed logo API. Disabled without a token.
///
/// Its URLs carry the token, so winners are only ever served from storage.
#[derive(Debug, Clone, Default)]
pub struct LogoApi {
    token: Option<String>,
}

impl LogoApi {
    pub fn new(token: Option<String>) -> Self {
        Self { token: token.filter(|t| !t.trim().is_empty()) }
    }
}

#[async_trait]
impl SourceStrategy<FaviconRequest> for LogoApi {
    fn name(&self) -> &str {
        "logo_api"
    }

    fn source(&self) -> ResolutionSource {
        ResolutionSource::LogoApi
    }

    fn enabled(&self) -> bool {
        self.token.is_some()
    }

    async fn candidate(&self, request: &FaviconRequest, _timeout: Duration) -> Result<Resource, Error> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| Error::ProviderUnavailable("logo API token not configured".into()))?;
        let mut url = with_segment("https://img.logo.dev/", &request.domain)?;
        url.query_pairs_mut()
            .append_pair("token", token)
            .append_pair("size", &request.size.to_string())
            .append_pair("format", "png");
        Ok(Resource::credentialed(url))
    }
}

/// DuckDuckGo icon service.
#[derive(Debug, Clone, Default)]
pub struct DuckDuckGoIcons;

#[async_trait]
impl SourceStrategy<FaviconRequest> for DuckDuckGoIcons {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    fn source(&self) -> ResolutionSource {
        ResolutionSource::DuckDuckGo
    }

    async fn candidate(&self, request: &FaviconRequest, _timeout: Duration) -> Result<Resource, Error> {
        let url = with_segment("https://icons.duckduckgo.com/ip3/", &format!("{}.ico", request.domain))?;
        Ok(Resource::remote(url))
    }
}

/// `base` with `segment` appended as one escaped path segment.
fn with_segment(base: &str, segment: &str) -> Result<Url, Error> {
    let mut url = Url::parse(base).map_err(|e| Error::Internal(format!("{base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| Error::Internal(format!("{base} cannot take path segments")))?
        .pop_if_empty()
        .push(segment);
    Ok(url)
}

/// Guess a well-known icon path on the site.
#[derive(Debug, Clone)]
pub struct DirectProbe {
    name: String,
    path: &'static str,
    www: bool,
}

impl DirectProbe {
    /// Probe `path` on the bare host, or on its `www.` form when `www` is set.
    pub fn new(path: &'static str, www: bool) -> Self {
        let name = if www { format!("direct:www{path}") } else { format!("direct:{path}") };
        Self { name, path, www }
    }

    fn url_for(&self, domain: &str) -> String {
        let prefix = if self.www { "www." } else { "" };
        format!("https://{prefix}{domain}{}", self.path)
    }
}

#[async_trait]
impl SourceStrategy<FaviconRequest> for DirectProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self) -> ResolutionSource {
        ResolutionSource::Direct
    }

    async fn candidate(&self, request: &FaviconRequest, _timeout: Duration) -> Result<Resource, Error> {
        Ok(Resource::remote(self.url_for(&request.domain)))
    }
}

/// Read the homepage and follow its `<link rel="icon">`.
pub struct LinkDiscovery {
    http: Arc<dyn HttpClient>,
}

impl LinkDiscovery {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SourceStrategy<FaviconRequest> for LinkDiscovery {
    fn name(&self) -> &str {
        "link_discovery"
    }

    fn source(&self) -> ResolutionSource {
        ResolutionSource::Direct
    }

    async fn candidate(&self, request: &FaviconRequest, timeout: Duration) -> Result<Resource, Error> {
        let homepage = format!("https://{}/", request.domain);
        let response = self.http.get(&homepage, timeout).await?;

        let base = Url::parse(&response.final_url).map_err(|e| Error::InvalidUrl(format!("{homepage}: {e}")))?;
        let html = String::from_utf8_lossy(&response.bytes);

        discover_icon(&html, &base)?
            .map(Resource::remote)
            .ok_or_else(|| Error::ProviderUnavailable(format!("no icon link on {homepage}")))
    }
}

/// Find the best icon link in a document, resolved against `base`.
///
/// `rel="icon"` (including `shortcut icon`) wins over `apple-touch-icon`;
/// within a kind the first link in document order wins. `data:` URLs are
/// skipped since they cannot be served by URL.
pub fn discover_icon(html: &str, base: &Url) -> Result<Option<String>, Error> {
    let selector =
        Selector::parse("link[rel][href]").map_err(|e| Error::Internal(format!("icon selector: {e}")))?;
    let document = Html::parse_document(html);

    let mut touch_icon = None;
    for link in document.select(&selector) {
        let (Some(rel), Some(href)) = (link.value().attr("rel"), link.value().attr("href")) else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.to_ascii_lowercase().starts_with("data:") {
            continue;
        }
        let Ok(resolved) = base.join(href) else {
            continue;
        };

        let rel = rel.to_ascii_lowercase();
        let mut tokens = rel.split_ascii_whitespace();
        if tokens.clone().any(|t| t == "icon") {
            return Ok(Some(resolved.to_string()));
        }
        if touch_icon.is_none() && tokens.any(|t| t == "apple-touch-icon" || t == "apple-touch-icon-precomposed") {
            touch_icon = Some(resolved.to_string());
        }
    }

    Ok(touch_icon)
}
