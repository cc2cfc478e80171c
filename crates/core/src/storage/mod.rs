//! Blob storage abstraction backing the durable cache.
//!
//! The cache layer needs very little from storage: a bucket that can be
//! created on demand, public URLs for stored objects, upsert uploads and an
//! existence check. Implementations live wherever their transport does; this
//! crate ships only the in-memory store used by tests.

pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::Error;

pub use memory::MemoryBlobStore;

/// Metadata of a stored object, as far as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectMeta {
    pub content_type: Option<String>,
    pub size: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    /// Whether the object is older than `max_age` at `now`.
    ///
    /// Objects without a modification time are never considered stale.
    pub fn is_older_than(&self, max_age: std::time::Duration, now: DateTime<Utc>) -> bool {
        let Some(modified) = self.last_modified else {
            return false;
        };
        match chrono::Duration::from_std(max_age) {
            Ok(max_age) => now.signed_duration_since(modified) > max_age,
            Err(_) => false,
        }
    }
}

/// A bucket of publicly readable objects.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Name of the bucket this store writes to.
    fn bucket(&self) -> &str;

    async fn bucket_exists(&self) -> Result<bool, Error>;

    /// Create the bucket with public read access.
    async fn create_bucket(&self) -> Result<(), Error>;

    /// Publicly fetchable URL of the object at `path`.
    fn public_url(&self, path: &str) -> String;

    async fn upload(&self, path: &str, bytes: Bytes, content_type: &str, upsert: bool) -> Result<(), Error>;

    /// Look up an object, returning `None` when it does not exist.
    async fn stat(&self, path: &str) -> Result<Option<ObjectMeta>, Error>;
}
