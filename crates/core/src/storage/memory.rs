//! In-memory blob store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{BlobStore, ObjectMeta};
use crate::Error;

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Bytes,
    content_type: String,
    modified_at: DateTime<Utc>,
}

/// Blob store kept in process memory.
///
/// Public URLs use the `memory://` scheme and are only meaningful to this
/// store. Clones share the same objects.
#[derive(Debug, Clone)]
pub struct MemoryBlobStore {
    bucket: String,
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    bucket_created: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    uploads: Arc<AtomicUsize>,
}

impl MemoryBlobStore {
    /// Create a store whose bucket already exists.
    pub fn new(bucket: impl Into<String>) -> Self {
        let store = Self::without_bucket(bucket);
        store.bucket_created.store(true, Ordering::SeqCst);
        store
    }

    /// Create a store whose bucket has not been created yet.
    pub fn without_bucket(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::new(RwLock::new(HashMap::new())),
            bucket_created: Arc::new(AtomicBool::new(false)),
            fail_writes: Arc::new(AtomicBool::new(false)),
            uploads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make every subsequent upload and bucket creation fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Store an object with an explicit modification time.
    pub async fn insert_at(&self, path: &str, bytes: Bytes, content_type: &str, modified_at: DateTime<Utc>) {
        let object = StoredObject { bytes, content_type: content_type.to_string(), modified_at };
        self.objects.write().await.insert(path.to_string(), object);
    }

    pub async fn get(&self, path: &str) -> Option<Bytes> {
        self.objects.read().await.get(path).map(|o| o.bytes.clone())
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Number of successful uploads so far.
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn has_bucket(&self) -> bool {
        self.bucket_created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn bucket_exists(&self) -> Result<bool, Error> {
        Ok(self.has_bucket())
    }

    async fn create_bucket(&self) -> Result<(), Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage(format!("cannot create bucket {}", self.bucket)));
        }
        self.bucket_created.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://{}/{}", self.bucket, path)
    }

    async fn upload(&self, path: &str, bytes: Bytes, content_type: &str, upsert: bool) -> Result<(), Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage(format!("upload of {path} rejected")));
        }
        if !self.has_bucket() {
            return Err(Error::Storage(format!("bucket {} not found", self.bucket)));
        }

        let mut objects = self.objects.write().await;
        if !upsert && objects.contains_key(path) {
            return Err(Error::Storage(format!("object {path} already exists")));
        }
        objects.insert(
            path.to_string(),
            StoredObject { bytes, content_type: content_type.to_string(), modified_at: Utc::now() },
        );
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<Option<ObjectMeta>, Error> {
        let objects = self.objects.read().await;
        Ok(objects.get(path).map(|o| ObjectMeta {
            content_type: Some(o.content_type.clone()),
            size: Some(o.bytes.len() as u64),
            last_modified: Some(o.modified_at),
        }))
    }
}
