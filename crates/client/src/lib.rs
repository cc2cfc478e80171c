//! Resolution machinery for markcache.
//!
//! This crate provides the outbound HTTP client, blob storage backend,
//! request gate, source chains and the favicon and screenshot services built
//! from them. The server binary wires these together.

pub mod bulk;
pub mod cache;
pub mod favicon;
pub mod fetch;
pub mod gate;
pub mod render;
pub mod resolve;
pub mod screenshot;
pub mod storage;

#[cfg(test)]
mod testing;

pub use cache::{CacheSettings, DurableCache};
pub use favicon::{FaviconRequest, FaviconService, default_favicon_chain};
pub use fetch::{FetchClient, FetchConfig, FetchResponse, HttpClient, ProbeResponse};
pub use gate::{Admission, RequestGate};
pub use render::{ApiRenderer, Capture, CaptureOptions, RenderError, ScreenshotRenderer};
pub use resolve::{Resolved, Resource, SourceChain, SourceStrategy};
pub use screenshot::{
    PassthroughThumbnails, RenderStrategy, ScreenshotRequest, ScreenshotService, ThumbnailGenerator,
    default_screenshot_chain,
};
pub use storage::{HttpBlobStore, StorageConfig};

#[cfg(feature = "render")]
pub use render::HeadlessRenderer;
