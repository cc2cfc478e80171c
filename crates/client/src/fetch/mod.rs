//! Outbound HTTP for the cache layer.
//!
//! ### Capabilities
//! - `HEAD` probes used to validate candidate images and check cache objects
//! - `GET` downloads of validated images and homepages
//! - A per-call timeout on both
//!
//! ### Safety Gates
//! - http/https only, hosts canonicalized before use
//! - Optional refusal of private/reserved addresses (see [`ssrf`])
//! - Max redirects: 5, each hop re-checked against the private-address rules
//! - Max body bytes: 10MB (configurable)

pub mod ssrf;
pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode, header};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, canonicalize, normalize_domain, normalize_page_url, origin_of};
pub use ssrf::{SsrfError, ensure_public_host, ensure_public_target, validate_ip};

use markcache_core::Error;

/// Whether a Content-Type header value denotes an image.
///
/// Accepts `image/*` and anything mentioning `icon`, which covers the
/// non-standard types some servers use for `.ico` files.
pub fn is_image_content_type(content_type: &str) -> bool {
    let ct = content_type.trim().to_ascii_lowercase();
    ct.starts_with("image/") || ct.contains("icon")
}

/// Outbound HTTP capability the resolvers depend on.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issue a `HEAD` request. Non-2xx responses are returned, not errors.
    async fn head(&self, url: &str, timeout: Duration) -> Result<ProbeResponse, Error>;

    /// Issue a `GET` request. Non-2xx responses are errors.
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchResponse, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "markcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 10MB)
    pub max_bytes: usize,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Refuse hosts resolving to private addresses (default: true)
    pub block_private_hosts: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "markcache/0.1".to_string(),
            max_bytes: 10 * 1024 * 1024,
            max_redirects: 5,
            block_private_hosts: true,
        }
    }
}

impl From<&markcache_core::AppConfig> for FetchConfig {
    fn from(config: &markcache_core::AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            block_private_hosts: config.block_private_hosts,
            ..Default::default()
        }
    }
}

/// Response to a `HEAD` probe.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
}

impl ProbeResponse {
    /// Successful status and an image content type.
    pub fn is_image(&self) -> bool {
        self.status.is_success() && self.content_type.as_deref().is_some_and(is_image_content_type)
    }
}

/// Response from a `GET` request.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The final URL after redirects
    pub final_url: String,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub bytes: Bytes,
}

/// reqwest-backed [`HttpClient`].
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(redirect_policy(config.max_redirects, config.block_private_hosts))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn prepare(&self, url_str: &str) -> Result<::url::Url, Error> {
        let url = canonicalize(url_str)?;
        if self.config.block_private_hosts {
            ensure_public_host(&url).await?;
        }
        Ok(url)
    }
}

/// Follow at most `max_redirects` hops, refusing hops onto private targets
/// when `block_private` is set.
fn redirect_policy(max_redirects: usize, block_private: bool) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() > max_redirects {
            return attempt.error(format!("more than {max_redirects} redirects"));
        }
        if block_private && let Err(e) = ensure_public_target(attempt.url()) {
            tracing::warn!(target_url = %attempt.url(), error = %e, "refusing redirect");
            return attempt.error(e);
        }
        attempt.follow()
    })
}

fn map_send_error(url: &str, timeout: Duration, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(format!("{url} after {}ms", timeout.as_millis()))
    } else {
        Error::HttpError(format!("network error: {err}"))
    }
}

fn header_str(headers: &header::HeaderMap, name: header::HeaderName) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(|s| s.to_string())
}

#[async_trait]
impl HttpClient for FetchClient {
    async fn head(&self, url_str: &str, timeout: Duration) -> Result<ProbeResponse, Error> {
        let url = self.prepare(url_str).await?;

        let response = self
            .http
            .head(url.as_str())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_send_error(url_str, timeout, e))?;

        let probe = ProbeResponse {
            status: response.status(),
            content_type: header_str(response.headers(), header::CONTENT_TYPE),
        };

        tracing::debug!("HEAD {} -> {} ({:?})", url, probe.status.as_u16(), probe.content_type);

        Ok(probe)
    }

    async fn get(&self, url_str: &str, timeout: Duration) -> Result<FetchResponse, Error> {
        let start = Instant::now();
        let url = self.prepare(url_str).await?;

        let response = self
            .http
            .get(url.as_str())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_send_error(url_str, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpError(format!("status {} for {}", status.as_u16(), url)));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::HttpError(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().to_string();
        let content_type = header_str(response.headers(), header::CONTENT_TYPE);

        let bytes = response.bytes().await.map_err(|e| map_send_error(url_str, timeout, e))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::HttpError(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!("fetched {} -> {} in {}ms ({} bytes)", url, final_url, fetch_ms, bytes.len());

        Ok(FetchResponse { final_url, content_type, bytes })
    }
}
