//! Cache keys shared by the deduplicating gate and the durable cache.
//!
//! A cache key names one resolved resource: the normalized lookup key plus
//! the options that change the stored image (favicon size, screenshot
//! quality and capture mode). The same string is used to deduplicate
//! in-flight resolutions and as the blob name in storage.

pub mod hash;

pub use hash::{CacheKey, favicon_cache_key, screenshot_cache_key};
