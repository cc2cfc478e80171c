//! markcache server entry point.
//!
//! This is the main binary and the composition root: it loads configuration,
//! builds the HTTP client, blob stores, caches, gates and source chains, and
//! boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use markcache_client::{
    CacheSettings, DurableCache, FaviconService, FetchClient, FetchConfig, HttpBlobStore, HttpClient,
    PassthroughThumbnails, RequestGate, ScreenshotService, StorageConfig, default_favicon_chain,
    default_screenshot_chain,
};
use markcache_core::AppConfig;

mod handler;
mod tools;

/// How often stale rate-limit entries are dropped.
const PRUNE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;

    tracing::info!("Starting markcache server on stdio transport");

    let http: Arc<dyn HttpClient> = Arc::new(FetchClient::new(FetchConfig::from(&config))?);

    let favicons = FaviconService::new(
        default_favicon_chain(Arc::clone(&http), &config),
        durable_cache(&config, &config.favicon_bucket, &http).await?,
        RequestGate::new(config.min_request_interval()),
    );

    let screenshots = ScreenshotService::new(
        default_screenshot_chain(Arc::clone(&http), &config).await,
        durable_cache(&config, &config.screenshot_bucket, &http).await?,
        RequestGate::new(config.min_request_interval()),
        Arc::new(PassthroughThumbnails),
        config.thumbnail_sizes,
    );

    spawn_pruner(favicons.clone(), screenshots.clone());

    let handler = handler::MarkcacheServer::new(favicons, screenshots);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}

/// Durable cache for `bucket`, or a disabled one when storage is not configured.
async fn durable_cache(config: &AppConfig, bucket: &str, http: &Arc<dyn HttpClient>) -> Result<DurableCache> {
    let Some((url, key)) = config.storage_credentials() else {
        tracing::info!(bucket, "blob storage not configured, durable cache disabled");
        return Ok(DurableCache::disabled());
    };

    let store = HttpBlobStore::new(StorageConfig::new(url, key, bucket))?;
    Ok(DurableCache::connect(Arc::new(store), Arc::clone(http), CacheSettings::from(config)).await)
}

/// Periodically drop rate-limit entries that can no longer limit anything.
fn spawn_pruner(favicons: FaviconService, screenshots: ScreenshotService) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            favicons.gate().prune_rate_limits();
            screenshots.gate().prune_rate_limits();
        }
    });
}
