//! Ordered source chains.
//!
//! A chain tries its strategies one at a time and returns the first candidate
//! that passes validation. Each attempt (candidate plus validation) is raced
//! against the caller's timeout; failures and timeouts are logged and the
//! chain moves on. Exhaustion is `None`, never an error.

pub mod strategy;

use std::sync::Arc;
use std::time::Duration;

use markcache_core::{Error, ResolutionSource};

pub use strategy::{Resource, SourceStrategy};

use crate::fetch::{HttpClient, is_image_content_type};

/// A validated winner of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub source: ResolutionSource,
    /// Name of the strategy that produced the resource.
    pub strategy: String,
    pub resource: Resource,
}

/// Strategies for one kind of request, in priority order.
pub struct SourceChain<Q: Sync> {
    strategies: Vec<Arc<dyn SourceStrategy<Q>>>,
    http: Arc<dyn HttpClient>,
}

impl<Q: Sync> SourceChain<Q> {
    /// An empty chain validating remote candidates through `http`.
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { strategies: Vec::new(), http }
    }

    pub fn with_strategy(mut self, strategy: impl SourceStrategy<Q> + 'static) -> Self {
        self.push(Arc::new(strategy));
        self
    }

    pub fn push(&mut self, strategy: Arc<dyn SourceStrategy<Q>>) {
        self.strategies.push(strategy);
    }

    /// Strategy names in the order they are tried.
    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Run the chain for `request`. `label` identifies the request in logs.
    pub async fn resolve(&self, request: &Q, label: &str, timeout: Duration) -> Option<Resolved> {
        for strategy in &self.strategies {
            if !strategy.enabled() {
                tracing::debug!(strategy = strategy.name(), key = label, "strategy disabled, skipping");
                continue;
            }

            let attempt = async {
                let resource = strategy.candidate(request, timeout).await?;
                self.validate(resource, timeout).await
            };

            match tokio::time::timeout(timeout, attempt).await {
                Ok(Ok(resource)) => {
                    tracing::debug!(strategy = strategy.name(), key = label, "strategy succeeded");
                    return Some(Resolved {
                        source: strategy.source(),
                        strategy: strategy.name().to_string(),
                        resource,
                    });
                }
                Ok(Err(e)) => {
                    tracing::warn!(strategy = strategy.name(), key = label, error = %e, "strategy failed");
                }
                Err(_) => {
                    tracing::warn!(
                        strategy = strategy.name(),
                        key = label,
                        timeout_ms = timeout.as_millis() as u64,
                        "strategy timed out"
                    );
                }
            }
        }

        tracing::debug!(key = label, "source chain exhausted");
        None
    }

    /// Accept a candidate only if it really is an image.
    async fn validate(&self, resource: Resource, timeout: Duration) -> Result<Resource, Error> {
        match resource {
            Resource::Remote { url, credentialed, .. } => {
                let probe = self.http.head(&url, timeout).await?;
                if !probe.status.is_success() {
                    return Err(Error::HttpError(format!("status {} for {url}", probe.status.as_u16())));
                }
                if !probe.is_image() {
                    return Err(Error::NotAnImage(format!(
                        "{url} has content type {}",
                        probe.content_type.as_deref().unwrap_or("<none>")
                    )));
                }
                Ok(Resource::Remote { url, content_type: probe.content_type, credentialed })
            }
            Resource::Inline { bytes, content_type } => {
                if bytes.is_empty() {
                    return Err(Error::NotAnImage("empty image body".into()));
                }
                if !is_image_content_type(&content_type) {
                    return Err(Error::NotAnImage(format!("inline content type {content_type}")));
                }
                Ok(Resource::Inline { bytes, content_type })
            }
        }
    }
}
