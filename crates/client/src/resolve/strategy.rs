//! Source strategies: one way of producing a candidate resource.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use markcache_core::{Error, ResolutionSource};

/// A candidate (or, after validation, accepted) resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// Image fetchable somewhere on the web.
    ///
    /// `credentialed` URLs carry a provider secret in their query string and
    /// must never be handed to callers; they are served from storage only.
    Remote { url: String, content_type: Option<String>, credentialed: bool },
    /// Image bytes produced locally that still need a home in storage.
    Inline { bytes: Bytes, content_type: String },
}

impl Resource {
    pub fn remote(url: impl Into<String>) -> Self {
        Resource::Remote { url: url.into(), content_type: None, credentialed: false }
    }

    /// A remote resource whose URL embeds a credential.
    pub fn credentialed(url: impl Into<String>) -> Self {
        Resource::Remote { url: url.into(), content_type: None, credentialed: true }
    }
}

/// One entry in a source chain.
///
/// `Q` is the request type of the chain (favicon or screenshot request).
/// Strategies only produce candidates; validation is the chain's job.
#[async_trait]
pub trait SourceStrategy<Q: Sync>: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Provenance tag reported when this strategy wins.
    fn source(&self) -> ResolutionSource;

    /// Capability flag. Disabled strategies are skipped without an attempt.
    fn enabled(&self) -> bool {
        true
    }

    async fn candidate(&self, request: &Q, timeout: Duration) -> Result<Resource, Error>;
}
