//! Core types and shared functionality for markcache.
//!
//! This crate provides:
//! - Cache key derivation
//! - The blob storage abstraction and an in-memory store
//! - Unified error types
//! - Configuration structures
//! - Request option and result types

pub mod cache;
pub mod config;
pub mod error;
pub mod storage;
pub mod types;

pub use cache::CacheKey;
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use storage::{BlobStore, MemoryBlobStore, ObjectMeta};
pub use types::{
    Dimensions, FaviconOptions, FaviconResult, ResolutionSource, ScreenshotOptions, ScreenshotResult, ThumbnailSizes,
    Thumbnails,
};
