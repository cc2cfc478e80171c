//! Thumbnail generation seam.

use async_trait::async_trait;

use markcache_core::{Error, ThumbnailSizes, Thumbnails};

/// Produces small/medium/large variants of a stored screenshot.
#[async_trait]
pub trait ThumbnailGenerator: Send + Sync {
    async fn thumbnails(&self, url: &str, sizes: &ThumbnailSizes) -> Result<Thumbnails, Error>;
}

/// Generator that serves the full image at every size.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughThumbnails;

#[async_trait]
impl ThumbnailGenerator for PassthroughThumbnails {
    async fn thumbnails(&self, url: &str, _sizes: &ThumbnailSizes) -> Result<Thumbnails, Error> {
        Ok(Thumbnails::uniform(url))
    }
}
