//! Blob storage over the Supabase-style storage REST API.
//!
//! ### Endpoints
//! - `GET  {base}/storage/v1/bucket/{bucket}` bucket lookup
//! - `POST {base}/storage/v1/bucket` bucket creation (public)
//! - `POST {base}/storage/v1/object/{bucket}/{path}` upload, `x-upsert` header
//! - `HEAD {base}/storage/v1/object/public/{bucket}/{path}` existence check
//!
//! Requests authenticate with the service key as both `apikey` and bearer
//! token.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{StatusCode, header};
use std::time::Duration;

use markcache_core::{BlobStore, Error, ObjectMeta};

/// Default timeout for storage calls other than the existence check.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Storage client configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    pub base_url: String,
    /// Service key.
    pub service_key: String,
    /// Bucket name.
    pub bucket: String,
    /// Timeout for storage requests (default: 30s).
    pub timeout: Duration,
}

impl StorageConfig {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            bucket: bucket.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// [`BlobStore`] backed by a remote storage service.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    http: reqwest::Client,
    config: StorageConfig,
}

impl HttpBlobStore {
    pub fn new(config: StorageConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Storage(format!("failed to build storage client: {e}")))?;

        Ok(Self { http, config })
    }

    fn bucket_url(&self) -> String {
        format!("{}/storage/v1/bucket/{}", self.config.base_url, self.config.bucket)
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.config.base_url, self.config.bucket, path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }
}

fn storage_error(context: &str, err: reqwest::Error) -> Error {
    Error::Storage(format!("{context}: {err}"))
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    fn bucket(&self) -> &str {
        &self.config.bucket
    }

    async fn bucket_exists(&self) -> Result<bool, Error> {
        let response = self
            .authorized(self.http.get(self.bucket_url()))
            .send()
            .await
            .map_err(|e| storage_error("bucket lookup", e))?;

        match response.status() {
            s if s.is_success() => Ok(true),
            // The storage API answers 400 with a "not found" body for unknown buckets.
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => Ok(false),
            s => Err(Error::Storage(format!("bucket lookup returned status {}", s.as_u16()))),
        }
    }

    async fn create_bucket(&self) -> Result<(), Error> {
        let body = serde_json::json!({
            "id": self.config.bucket,
            "name": self.config.bucket,
            "public": true,
        });

        let response = self
            .authorized(self.http.post(format!("{}/storage/v1/bucket", self.config.base_url)))
            .json(&body)
            .send()
            .await
            .map_err(|e| storage_error("bucket creation", e))?;

        let status = response.status();
        // Another process may have created it between our lookup and this call.
        if status.is_success() || status == StatusCode::CONFLICT {
            tracing::info!(bucket = %self.config.bucket, "storage bucket ready");
            Ok(())
        } else {
            Err(Error::Storage(format!("bucket creation returned status {}", status.as_u16())))
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.config.base_url, self.config.bucket, path)
    }

    async fn upload(&self, path: &str, bytes: Bytes, content_type: &str, upsert: bool) -> Result<(), Error> {
        let size = bytes.len();
        let response = self
            .authorized(self.http.post(self.object_url(path)))
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(bytes)
            .send()
            .await
            .map_err(|e| storage_error("upload", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Storage(format!("upload of {path} returned status {}", status.as_u16())));
        }

        tracing::debug!(path, size, "uploaded object");
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<Option<ObjectMeta>, Error> {
        let response = self
            .http
            .head(self.public_url(path))
            .send()
            .await
            .map_err(|e| storage_error("existence check", e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::Storage(format!("existence check returned status {}", status.as_u16())));
        }

        let headers = response.headers();
        let last_modified = headers
            .get(header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|d| d.with_timezone(&Utc));

        Ok(Some(ObjectMeta {
            content_type: headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string()),
            size: response.content_length(),
            last_modified,
        }))
    }
}
