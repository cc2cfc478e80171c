//! screenshot_resolve and screenshot_batch tool implementations.

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use markcache_client::ScreenshotService;
use markcache_core::{Error, ScreenshotOptions, ScreenshotResult};

use super::{json_result, split_batch};

/// Largest number of pages accepted by screenshot_batch.
pub const MAX_SCREENSHOT_BATCH: usize = 5;

/// Lookup options shared by both screenshot tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScreenshotOptionParams {
    /// Consult and populate the durable cache (default: true).
    #[serde(default = "default_true")]
    pub use_cache: bool,

    /// Render timeout in milliseconds (default: 15000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Image quality, 1-100 (default: 80).
    #[serde(default = "default_quality")]
    pub quality: u8,

    /// Capture the full scrollable page (default: false).
    #[serde(default)]
    pub full_page: bool,

    /// Produce small/medium/large thumbnails (default: true).
    #[serde(default = "default_true")]
    pub generate_thumbnails: bool,

    /// Delay after page load before capturing, at most 60000 (default: 2000).
    #[serde(default = "default_wait_for_ms")]
    pub wait_for_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    15000
}

fn default_quality() -> u8 {
    80
}

fn default_wait_for_ms() -> u64 {
    2000
}

impl Default for ScreenshotOptionParams {
    fn default() -> Self {
        Self {
            use_cache: true,
            timeout_ms: default_timeout_ms(),
            quality: default_quality(),
            full_page: false,
            generate_thumbnails: true,
            wait_for_ms: default_wait_for_ms(),
        }
    }
}

impl From<ScreenshotOptionParams> for ScreenshotOptions {
    fn from(params: ScreenshotOptionParams) -> Self {
        Self {
            use_cache: params.use_cache,
            timeout_ms: params.timeout_ms,
            quality: params.quality,
            full_page: params.full_page,
            generate_thumbnails: params.generate_thumbnails,
            wait_for_ms: params.wait_for_ms,
        }
    }
}

/// Input parameters for screenshot_resolve tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ScreenshotResolveParams {
    /// Page URL to capture.
    pub url: String,

    #[serde(flatten)]
    pub options: ScreenshotOptionParams,
}

/// Input parameters for screenshot_batch tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ScreenshotBatchParams {
    /// Page URLs to capture (at most 5).
    pub urls: Vec<String>,

    #[serde(flatten)]
    pub options: ScreenshotOptionParams,
}

/// Output structure for screenshot_batch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScreenshotBatchOutput {
    /// Results keyed by the input string.
    pub results: BTreeMap<String, ScreenshotResult>,
    /// Inputs that could not be resolved (invalid or failed lookups).
    pub failed: Vec<String>,
}

/// Implementation of the screenshot_resolve tool.
pub async fn resolve_impl(
    service: &ScreenshotService, params: ScreenshotResolveParams,
) -> Result<CallToolResult, McpError> {
    let options = ScreenshotOptions::from(params.options);
    let result = service.resolve(&params.url, &options).await?;
    json_result(&result)
}

/// Implementation of the screenshot_batch tool.
pub async fn batch_impl(service: &ScreenshotService, params: ScreenshotBatchParams) -> Result<CallToolResult, McpError> {
    if params.urls.is_empty() {
        return Err(Error::InvalidInput("urls cannot be empty".into()).into());
    }
    if params.urls.len() > MAX_SCREENSHOT_BATCH {
        return Err(Error::InvalidInput(format!("at most {MAX_SCREENSHOT_BATCH} urls per batch")).into());
    }

    let options = ScreenshotOptions::from(params.options);
    options.validate()?;

    let resolved = service.resolve_many(params.urls.clone(), &options).await;
    let (results, failed) = split_batch(&params.urls, resolved);

    json_result(&ScreenshotBatchOutput { results, failed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use markcache_client::{
        DurableCache, FetchClient, FetchConfig, HttpClient, PassthroughThumbnails, RequestGate, SourceChain,
    };
    use markcache_core::{ResolutionSource, ThumbnailSizes};
    use std::sync::Arc;
    use std::time::Duration;

    /// Service without a renderer, so every lookup ends in a placeholder.
    fn offline_service() -> ScreenshotService {
        let http: Arc<dyn HttpClient> = Arc::new(FetchClient::new(FetchConfig::default()).unwrap());
        ScreenshotService::new(
            SourceChain::new(http),
            DurableCache::disabled(),
            RequestGate::new(Duration::ZERO),
            Arc::new(PassthroughThumbnails),
            ThumbnailSizes::default(),
        )
    }

    fn text_of(result: &CallToolResult) -> String {
        result.content.first().and_then(|c| c.as_text()).map(|t| t.text.clone()).unwrap()
    }

    #[test]
    fn test_params_defaults() {
        let params: ScreenshotResolveParams = serde_json::from_str(r#"{"url": "https://example.com"}"#).unwrap();
        assert_eq!(ScreenshotOptions::from(params.options), ScreenshotOptions::default());
    }

    #[tokio::test]
    async fn test_resolve_placeholder() {
        let params = ScreenshotResolveParams { url: "https://example.com/docs".into(), ..Default::default() };
        let result = resolve_impl(&offline_service(), params).await.unwrap();

        let output: ScreenshotResult = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(output.source, ResolutionSource::Fallback);
        assert_eq!(output.url, output.thumbnails.large);
        assert!(output.thumbnails.small.contains("320x180"));
    }

    #[tokio::test]
    async fn test_resolve_rejects_bad_input() {
        let service = offline_service();

        let params = ScreenshotResolveParams { url: "ftp://example.com/file".into(), ..Default::default() };
        assert_eq!(resolve_impl(&service, params).await.unwrap_err().code.0, -32003);

        let params = ScreenshotResolveParams {
            url: "https://example.com".into(),
            options: ScreenshotOptionParams { wait_for_ms: 120_000, ..Default::default() },
        };
        assert_eq!(resolve_impl(&service, params).await.unwrap_err().code.0, -32602);
    }

    #[tokio::test]
    async fn test_batch_limits() {
        let service = offline_service();
        assert!(batch_impl(&service, ScreenshotBatchParams::default()).await.is_err());

        let too_many = ScreenshotBatchParams {
            urls: (0..=MAX_SCREENSHOT_BATCH).map(|i| format!("https://site{i}.example/")).collect(),
            ..Default::default()
        };
        assert!(batch_impl(&service, too_many).await.is_err());
    }

    #[tokio::test]
    async fn test_batch() {
        let params = ScreenshotBatchParams {
            urls: vec!["https://a.example/".into(), "https://b.example/x".into()],
            options: ScreenshotOptionParams { generate_thumbnails: false, ..Default::default() },
        };
        let result = batch_impl(&offline_service(), params).await.unwrap();

        let output: ScreenshotBatchOutput = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(output.results.len(), 2);
        assert!(output.failed.is_empty());
        let b = &output.results["https://b.example/x"];
        assert_eq!(b.thumbnails.small, b.url);
    }
}
