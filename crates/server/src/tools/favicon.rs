//! favicon_resolve and favicon_batch tool implementations.

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use markcache_client::FaviconService;
use markcache_core::{Error, FaviconOptions, FaviconResult};

use super::{json_result, split_batch};

/// Largest number of domains accepted by favicon_batch.
pub const MAX_FAVICON_BATCH: usize = 10;

/// Lookup options shared by both favicon tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FaviconOptionParams {
    /// Icon edge length in pixels, 1-512 (default: 32).
    #[serde(default = "default_size")]
    pub size: u32,

    /// Consult and populate the durable cache (default: true).
    #[serde(default = "default_true")]
    pub use_cache: bool,

    /// Timeout per source attempt in milliseconds (default: 5000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Per-domain lettered placeholder when nothing resolves; otherwise a neutral icon (default: true).
    #[serde(default = "default_true")]
    pub fallback_to_generic: bool,
}

fn default_size() -> u32 {
    32
}

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    5000
}

impl Default for FaviconOptionParams {
    fn default() -> Self {
        Self { size: default_size(), use_cache: true, timeout_ms: default_timeout_ms(), fallback_to_generic: true }
    }
}

impl From<FaviconOptionParams> for FaviconOptions {
    fn from(params: FaviconOptionParams) -> Self {
        Self {
            size: params.size,
            use_cache: params.use_cache,
            timeout_ms: params.timeout_ms,
            fallback_to_generic: params.fallback_to_generic,
        }
    }
}

/// Input parameters for favicon_resolve tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct FaviconResolveParams {
    /// Domain or URL whose favicon to resolve.
    pub domain: String,

    #[serde(flatten)]
    pub options: FaviconOptionParams,
}

/// Input parameters for favicon_batch tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct FaviconBatchParams {
    /// Domains or URLs to resolve (at most 10).
    pub domains: Vec<String>,

    #[serde(flatten)]
    pub options: FaviconOptionParams,
}

/// Output structure for favicon_batch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FaviconBatchOutput {
    /// Results keyed by the input string.
    pub results: BTreeMap<String, FaviconResult>,
    /// Inputs that could not be resolved (invalid or failed lookups).
    pub failed: Vec<String>,
}

/// Implementation of the favicon_resolve tool.
pub async fn resolve_impl(service: &FaviconService, params: FaviconResolveParams) -> Result<CallToolResult, McpError> {
    let options = FaviconOptions::from(params.options);
    let result = service.resolve(&params.domain, &options).await?;
    json_result(&result)
}

/// Implementation of the favicon_batch tool.
pub async fn batch_impl(service: &FaviconService, params: FaviconBatchParams) -> Result<CallToolResult, McpError> {
    if params.domains.is_empty() {
        return Err(Error::InvalidInput("domains cannot be empty".into()).into());
    }
    if params.domains.len() > MAX_FAVICON_BATCH {
        return Err(Error::InvalidInput(format!("at most {MAX_FAVICON_BATCH} domains per batch")).into());
    }

    let options = FaviconOptions::from(params.options);
    options.validate()?;

    let resolved = service.resolve_many(params.domains.clone(), &options).await;
    let (results, failed) = split_batch(&params.domains, resolved);

    json_result(&FaviconBatchOutput { results, failed })
}
