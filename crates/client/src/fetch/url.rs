//! Lookup key normalization.
//!
//! Favicons are keyed by bare domain, screenshots by canonical page URL.
//! Domain normalization never fails on merely odd input: a favicon lookup
//! must not stand in the way of creating a bookmark, so anything that is not
//! URL-shaped is cleaned up on a best-effort basis instead.

use markcache_core::Error;
use url::Url;

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<UrlError> for Error {
    fn from(err: UrlError) -> Self {
        match err {
            UrlError::Empty => Error::InvalidInput("lookup key is empty".into()),
            other => Error::InvalidUrl(other.to_string()),
        }
    }
}

/// Canonicalize a URL string.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host, drop default ports, normalize an empty path to `/`
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlError::InvalidUrl(format!("missing host in {trimmed}")));
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Normalize a page URL for screenshot lookups.
///
/// Unlike [`normalize_domain`] this is strict: a screenshot needs a real URL
/// to render.
pub fn normalize_page_url(input: &str) -> Result<Url, UrlError> {
    canonicalize(input)
}

/// Normalize a domain (or anything URL-shaped) for favicon lookups.
///
/// `https://www.Example.com/page` becomes `example.com`. Input the URL
/// parser rejects is cleaned up by hand; only input that is empty after
/// cleanup is an error.
pub fn normalize_domain(input: &str) -> Result<String, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    if let Ok(url) = canonicalize(trimmed)
        && let Some(host) = url.host_str()
    {
        return finish_host(host);
    }

    tracing::debug!(input = trimmed, "domain is not URL-shaped, cleaning up by hand");

    let lower = trimmed.to_lowercase();
    let rest = lower.split_once("://").map_or(lower.as_str(), |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or_default();
    let host = match host_port.split_once(':') {
        Some((host, _port)) if !host_port.starts_with('[') => host,
        _ => host_port,
    };

    finish_host(host.trim())
}

/// Rate-limit origin of a page URL: its host without a leading `www.`.
pub fn origin_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    strip_www(&host).trim_end_matches('.').to_string()
}

fn finish_host(host: &str) -> Result<String, UrlError> {
    let host = strip_www(host).trim_end_matches('.');
    if host.is_empty() {
        return Err(UrlError::Empty);
    }
    Ok(host.to_lowercase())
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}
