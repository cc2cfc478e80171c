//! Durable cache over a blob store.
//!
//! Reads are existence checks bounded by a short timeout; writes are upserts.
//! Nothing in here fails a lookup: every storage problem is logged and
//! treated as a miss or a skipped write.

use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use markcache_core::{AppConfig, BlobStore, CacheKey};

use crate::fetch::{HttpClient, is_image_content_type};
use crate::resolve::Resource;

/// Content type used when the source did not report a usable one.
const DEFAULT_CONTENT_TYPE: &str = "image/png";

/// Timing knobs for a [`DurableCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Bound on the existence check (default: 2s).
    pub check_timeout: Duration,
    /// Bound on downloading a remote resource before upload (default: 10s).
    pub download_timeout: Duration,
    /// Entries older than this are misses (default: never expire).
    pub ttl: Option<Duration>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { check_timeout: Duration::from_secs(2), download_timeout: Duration::from_secs(10), ttl: None }
    }
}

impl From<&AppConfig> for CacheSettings {
    fn from(config: &AppConfig) -> Self {
        Self { check_timeout: config.cache_check_timeout(), ttl: config.cache_ttl(), ..Default::default() }
    }
}

struct Backend {
    store: Arc<dyn BlobStore>,
    http: Arc<dyn HttpClient>,
    settings: CacheSettings,
}

/// Cache of resolved resources, keyed by [`CacheKey`].
#[derive(Clone)]
pub struct DurableCache {
    backend: Option<Arc<Backend>>,
}

impl DurableCache {
    /// Wrap `store`, making sure its bucket exists.
    ///
    /// Bucket problems are logged; the cache is still usable afterwards and
    /// individual operations simply fail soft.
    pub async fn connect(store: Arc<dyn BlobStore>, http: Arc<dyn HttpClient>, settings: CacheSettings) -> Self {
        ensure_bucket(store.as_ref()).await;
        Self { backend: Some(Arc::new(Backend { store, http, settings })) }
    }

    /// A cache that never hits and never stores.
    pub fn disabled() -> Self {
        Self { backend: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Public URL of the cached object for `key`, if there is a fresh one.
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        let backend = self.backend.as_ref()?;
        let path = key.object_path();

        let meta = match tokio::time::timeout(backend.settings.check_timeout, backend.store.stat(&path)).await {
            Ok(Ok(Some(meta))) => meta,
            Ok(Ok(None)) => {
                tracing::debug!(key = %key, "cache miss");
                return None;
            }
            Ok(Err(e)) => {
                tracing::warn!(key = %key, error = %e, "cache check failed");
                return None;
            }
            Err(_) => {
                tracing::warn!(key = %key, "cache check timed out");
                return None;
            }
        };

        if let Some(ttl) = backend.settings.ttl
            && meta.is_older_than(ttl, Utc::now())
        {
            tracing::debug!(key = %key, "cache entry expired");
            return None;
        }

        tracing::debug!(key = %key, "cache hit");
        Some(backend.store.public_url(&path))
    }

    /// Store `resource` under `key`, returning its public URL.
    pub async fn put(&self, key: &CacheKey, resource: &Resource) -> Option<String> {
        let backend = self.backend.as_ref()?;

        let (bytes, content_type) = match backend.bytes_of(resource).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "could not download resource for caching");
                return None;
            }
        };

        let path = key.object_path();
        match backend.store.upload(&path, bytes, &content_type, true).await {
            Ok(()) => {
                tracing::debug!(key = %key, "cached resource");
                Some(backend.store.public_url(&path))
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to cache resource");
                None
            }
        }
    }

    /// URL to hand out for a freshly resolved `resource`.
    ///
    /// Plain remote resources are served from where they were found, and
    /// copied into the cache when `use_cache` is set. Inline and credentialed
    /// resources have no URL a caller may see, so they are always stored;
    /// `None` means that failed.
    pub async fn publish(&self, key: &CacheKey, resource: &Resource, use_cache: bool) -> Option<String> {
        match resource {
            Resource::Remote { url, credentialed: false, .. } => {
                if use_cache {
                    self.put(key, resource).await;
                }
                Some(url.clone())
            }
            Resource::Remote { credentialed: true, .. } | Resource::Inline { .. } => self.put(key, resource).await,
        }
    }
}

impl Backend {
    async fn bytes_of(&self, resource: &Resource) -> Result<(Bytes, String), markcache_core::Error> {
        match resource {
            Resource::Inline { bytes, content_type } => Ok((bytes.clone(), content_type.clone())),
            Resource::Remote { url, content_type, .. } => {
                let response = self.http.get(url, self.settings.download_timeout).await?;
                let content_type = response
                    .content_type
                    .or_else(|| content_type.clone())
                    .filter(|ct| is_image_content_type(ct))
                    .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
                Ok((response.bytes, content_type))
            }
        }
    }
}

async fn ensure_bucket(store: &dyn BlobStore) {
    match store.bucket_exists().await {
        Ok(true) => {}
        Ok(false) => {
            if let Err(e) = store.create_bucket().await {
                tracing::warn!(bucket = store.bucket(), error = %e, "failed to create storage bucket");
            }
        }
        Err(e) => {
            tracing::warn!(bucket = store.bucket(), error = %e, "failed to look up storage bucket");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHttp;
    use markcache_core::MemoryBlobStore;
    use markcache_core::cache::favicon_cache_key;

    const ICON: &str = "https://icons.test/example.png";

    async fn cache_with(store: &MemoryBlobStore, http: &Arc<FakeHttp>, settings: CacheSettings) -> DurableCache {
        DurableCache::connect(Arc::new(store.clone()), http.clone() as Arc<dyn HttpClient>, settings).await
    }

    #[tokio::test]
    async fn test_connect_creates_missing_bucket() {
        let store = MemoryBlobStore::without_bucket("favicons");
        let http = Arc::new(FakeHttp::new());
        let cache = cache_with(&store, &http, CacheSettings::default()).await;
        assert!(cache.is_enabled());
        assert!(store.has_bucket());
    }

    #[tokio::test]
    async fn test_connect_survives_bucket_failure() {
        let store = MemoryBlobStore::without_bucket("favicons");
        store.fail_writes(true);
        let http = Arc::new(FakeHttp::new());
        let cache = cache_with(&store, &http, CacheSettings::default()).await;
        assert!(cache.is_enabled());
        assert!(!store.has_bucket());
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemoryBlobStore::new("favicons");
        let http = Arc::new(FakeHttp::new());
        http.image(ICON);
        let cache = cache_with(&store, &http, CacheSettings::default()).await;
        let key = favicon_cache_key("example.com", 32);

        assert_eq!(cache.get(&key).await, None);

        let url = cache.put(&key, &Resource::remote(ICON)).await.unwrap();
        assert_eq!(url, store.public_url(&key.object_path()));
        assert_eq!(cache.get(&key).await, Some(url));
        assert_eq!(http.get_calls(), 1);
        assert_eq!(store.get(&key.object_path()).await.unwrap(), Bytes::from_static(b"\x89PNG\r\n\x1a\nfake"));
    }

    #[tokio::test]
    async fn test_put_falls_back_to_png_content_type() {
        let store = MemoryBlobStore::new("favicons");
        let http = Arc::new(FakeHttp::new());
        http.body(ICON, Bytes::from_static(b"icon"), Some("application/octet-stream"));
        let cache = cache_with(&store, &http, CacheSettings::default()).await;
        let key = favicon_cache_key("example.com", 32);

        cache.put(&key, &Resource::remote(ICON)).await.unwrap();
        let meta = store.stat(&key.object_path()).await.unwrap().unwrap();
        assert_eq!(meta.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_put_failures_are_swallowed() {
        let store = MemoryBlobStore::new("favicons");
        let http = Arc::new(FakeHttp::new());
        http.image(ICON);
        let cache = cache_with(&store, &http, CacheSettings::default()).await;
        let key = favicon_cache_key("example.com", 32);

        store.fail_writes(true);
        assert_eq!(cache.put(&key, &Resource::remote(ICON)).await, None);

        store.fail_writes(false);
        assert_eq!(cache.put(&key, &Resource::remote("https://icons.test/missing.png")).await, None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_ttl_expires_old_entries() {
        let store = MemoryBlobStore::new("favicons");
        let http = Arc::new(FakeHttp::new());
        let settings = CacheSettings { ttl: Some(Duration::from_secs(3600)), ..Default::default() };
        let cache = cache_with(&store, &http, settings).await;

        let fresh = favicon_cache_key("fresh.com", 32);
        let stale = favicon_cache_key("stale.com", 32);
        store.insert_at(&fresh.object_path(), Bytes::from_static(b"x"), "image/png", Utc::now()).await;
        store
            .insert_at(
                &stale.object_path(),
                Bytes::from_static(b"x"),
                "image/png",
                Utc::now() - chrono::Duration::hours(2),
            )
            .await;

        assert!(cache.get(&fresh).await.is_some());
        assert!(cache.get(&stale).await.is_none());
    }

    #[tokio::test]
    async fn test_publish() {
        let store = MemoryBlobStore::new("screenshots");
        let http = Arc::new(FakeHttp::new());
        http.image(ICON);
        let cache = cache_with(&store, &http, CacheSettings::default()).await;
        let key = favicon_cache_key("example.com", 32);

        assert_eq!(cache.publish(&key, &Resource::remote(ICON), false).await.as_deref(), Some(ICON));
        assert_eq!(store.upload_count(), 0);

        assert_eq!(cache.publish(&key, &Resource::remote(ICON), true).await.as_deref(), Some(ICON));
        assert_eq!(store.upload_count(), 1);

        let inline = Resource::Inline { bytes: Bytes::from_static(b"png"), content_type: "image/png".into() };
        let url = cache.publish(&key, &inline, false).await.unwrap();
        assert_eq!(url, store.public_url(&key.object_path()));

        store.fail_writes(true);
        assert_eq!(cache.publish(&key, &inline, true).await, None);
    }

    #[tokio::test]
    async fn test_credentialed_resources_are_served_from_storage() {
        const KEYED: &str = "https://logos.test/example.com?token=secret-token";
        let store = MemoryBlobStore::new("favicons");
        let http = Arc::new(FakeHttp::new());
        http.image(KEYED);
        let cache = cache_with(&store, &http, CacheSettings::default()).await;
        let key = favicon_cache_key("example.com", 32);

        let url = cache.publish(&key, &Resource::credentialed(KEYED), false).await.unwrap();
        assert_eq!(url, store.public_url(&key.object_path()));
        assert!(!url.contains("secret-token"));
        assert_eq!(store.upload_count(), 1);

        store.fail_writes(true);
        assert_eq!(cache.publish(&key, &Resource::credentialed(KEYED), true).await, None);
        assert_eq!(DurableCache::disabled().publish(&key, &Resource::credentialed(KEYED), true).await, None);
    }

    #[tokio::test]
    async fn test_disabled_cache() {
        let cache = DurableCache::disabled();
        let key = favicon_cache_key("example.com", 32);
        assert!(!cache.is_enabled());
        assert_eq!(cache.get(&key).await, None);
        assert_eq!(cache.put(&key, &Resource::remote(ICON)).await, None);
        assert_eq!(cache.publish(&key, &Resource::remote(ICON), true).await.as_deref(), Some(ICON));
    }
}
