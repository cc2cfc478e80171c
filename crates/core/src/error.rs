//! Unified error types for markcache.
//!
//! Only input errors reach a caller of the resolution services. Everything
//! else is recovered inside the cache layer and shows up as a fallback result,
//! so most variants here describe why a single strategy or cache operation
//! was skipped.

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Unified error type for the favicon and screenshot cache layer.
///
/// Payloads are plain strings so the error can be cloned and handed to every
/// caller that joined the same in-flight resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty lookup key, zero timeout).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Lookup key could not be parsed as a URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Request to a private or reserved address was refused.
    #[error("SSRF_BLOCKED: {0}")]
    SsrfBlocked(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// HTTP error response or transport failure.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// A candidate resource did not turn out to be an image.
    #[error("NOT_AN_IMAGE: {0}")]
    NotAnImage(String),

    /// Strategy has no credentials or is switched off.
    #[error("PROVIDER_UNAVAILABLE: {0}")]
    ProviderUnavailable(String),

    /// Screenshot rendering failed.
    #[error("RENDER_FAILED: {0}")]
    RenderFailed(String),

    /// Blob storage operation failed.
    #[error("STORAGE_ERROR: {0}")]
    Storage(String),

    /// A resolution task panicked or was abandoned.
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error is the caller's fault rather than an upstream failure.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::InvalidUrl(_))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::SsrfBlocked(msg) => (-32004, msg.clone()),
            Error::FetchTimeout(msg) => (-32006, msg.clone()),
            Error::HttpError(msg) => (-32008, msg.clone()),
            Error::NotAnImage(msg) => (-32009, msg.clone()),
            Error::ProviderUnavailable(msg) => (-32010, msg.clone()),
            Error::RenderFailed(msg) => (-32012, msg.clone()),
            Error::Storage(msg) => (-32002, msg.clone()),
            Error::Internal(msg) => (-32603, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
