//! Favicon cache.
//!
//! ### Lookup
//! 1. Normalize the domain and derive the cache key
//! 2. Pass the request gate (join, rate-limit, or proceed)
//! 3. Durable cache check
//! 4. Source chain: google → logo API → duckduckgo → direct probes → link discovery
//! 5. Lettered avatar when everything else failed

pub mod fallback;
pub mod providers;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use markcache_core::cache::favicon_cache_key;
use markcache_core::{AppConfig, CacheKey, Error, FaviconOptions, FaviconResult, ResolutionSource};

pub use fallback::fallback_favicon;
pub use providers::{DIRECT_PATHS, DirectProbe, DuckDuckGoIcons, GoogleFavicons, LinkDiscovery, LogoApi};

use crate::bulk;
use crate::cache::DurableCache;
use crate::fetch::{HttpClient, normalize_domain};
use crate::gate::{Admission, RequestGate, Ticket};
use crate::resolve::SourceChain;

/// What favicon strategies are asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaviconRequest {
    /// Normalized bare domain.
    pub domain: String,
    pub size: u32,
}

/// The standard favicon chain.
///
/// Logo API winners can only be served from storage, so the provider stays
/// disabled unless blob storage is configured.
pub fn default_favicon_chain(http: Arc<dyn HttpClient>, config: &AppConfig) -> SourceChain<FaviconRequest> {
    let mut logo_token = config.logo_api_token.clone();
    if logo_token.is_some() && config.storage_credentials().is_none() {
        tracing::warn!("logo API token set without blob storage, logo API disabled");
        logo_token = None;
    }

    let mut chain = SourceChain::new(Arc::clone(&http))
        .with_strategy(GoogleFavicons)
        .with_strategy(LogoApi::new(logo_token))
        .with_strategy(DuckDuckGoIcons);

    for www in [false, true] {
        for path in DIRECT_PATHS {
            chain.push(Arc::new(DirectProbe::new(path, www)));
        }
    }

    chain.with_strategy(LinkDiscovery::new(http))
}

struct Inner {
    chain: SourceChain<FaviconRequest>,
    cache: DurableCache,
    gate: RequestGate<FaviconResult>,
}

/// Favicon lookups with deduplication, caching and fallback.
#[derive(Clone)]
pub struct FaviconService {
    inner: Arc<Inner>,
}

impl FaviconService {
    pub fn new(chain: SourceChain<FaviconRequest>, cache: DurableCache, gate: RequestGate<FaviconResult>) -> Self {
        Self { inner: Arc::new(Inner { chain, cache, gate }) }
    }

    pub fn gate(&self) -> &RequestGate<FaviconResult> {
        &self.inner.gate
    }

    /// Resolve the favicon for `domain`.
    ///
    /// Only invalid input is an error; every other failure ends in a
    /// fallback result.
    pub async fn resolve(&self, domain: &str, options: &FaviconOptions) -> Result<FaviconResult, Error> {
        options.validate()?;
        let domain = normalize_domain(domain)?;
        let key = favicon_cache_key(&domain, options.size);

        match self.inner.gate.acquire(&key, &domain) {
            Admission::Joined(in_flight) => {
                tracing::debug!(key = %key, "joining in-flight favicon lookup");
                in_flight.wait().await
            }
            Admission::RateLimited => {
                if let Some(cached) = self.inner.cached(&key, options).await {
                    return Ok(cached);
                }
                tracing::debug!(domain = %domain, "favicon lookup rate limited, using fallback");
                Ok(fallback_favicon(&domain, options))
            }
            Admission::Proceed(ticket) => {
                let inner = Arc::clone(&self.inner);
                let options = options.clone();
                // Callers may be cancelled; the shared lookup must not be.
                let lookup = tokio::spawn(async move {
                    let result = inner.lookup(&domain, &ticket, &options).await;
                    ticket.settle(Ok(result.clone()));
                    result
                });
                lookup
                    .await
                    .map_err(|e| Error::Internal(format!("favicon lookup for {key} failed: {e}")))
            }
        }
    }

    /// Resolve many domains concurrently, keyed by the input strings.
    ///
    /// Domains whose lookup fails are left out of the map.
    pub async fn resolve_many(&self, domains: Vec<String>, options: &FaviconOptions) -> HashMap<String, FaviconResult> {
        let options = options.clone();
        bulk::resolve_many(domains, |domain: String| {
            let service = self.clone();
            let options = options.clone();
            async move { service.resolve(&domain, &options).await }
        })
        .await
    }
}

impl Inner {
    /// The durable cache's answer for `key`, when caching is requested.
    async fn cached(&self, key: &CacheKey, options: &FaviconOptions) -> Option<FaviconResult> {
        if !options.use_cache {
            return None;
        }
        let url = self.cache.get(key).await?;
        Some(FaviconResult { url, source: ResolutionSource::Cache, cached: true, size: options.size })
    }

    async fn lookup(
        &self, domain: &str, ticket: &Ticket<FaviconResult>, options: &FaviconOptions,
    ) -> FaviconResult {
        let key = ticket.key();
        if let Some(cached) = self.cached(key, options).await {
            ticket.refund_attempt();
            return cached;
        }

        let request = FaviconRequest { domain: domain.to_string(), size: options.size };
        let timeout = Duration::from_millis(options.timeout_ms);

        if let Some(resolved) = self.chain.resolve(&request, key.as_str(), timeout).await {
            if let Some(url) = self.cache.publish(key, &resolved.resource, options.use_cache).await {
                return FaviconResult { url, source: resolved.source, cached: false, size: options.size };
            }
            tracing::warn!(key = %key, strategy = %resolved.strategy, "resolved favicon could not be published");
        }

        fallback_favicon(domain, options)
    }
}
