//! Cache policy error types.

use thiserror::Error;

/// Result type for cache policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;

/// Errors raised by the cache policy engine.
///
/// Malformed header content is never an error; it is normalized where it is
/// read. These variants cover integration mistakes and persisted-state problems.
#[derive(Error, Debug)]
pub enum PolicyError {
    /// A request or response view exposes no headers.
    #[error("{what} headers missing")]
    MissingHeaders {
        /// Which side was missing: `"request"` or `"response"`.
        what: &'static str,
    },

    /// Persisted policy state is absent, has the wrong version, or is malformed.
    #[error("invalid serialization: {0}")]
    InvalidSerialization(String),

    /// A header name or value cannot be represented as an `http` header.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Failed to emit JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PolicyError {
    pub(crate) fn missing_request_headers() -> Self {
        Self::MissingHeaders { what: "request" }
    }

    pub(crate) fn missing_response_headers() -> Self {
        Self::MissingHeaders { what: "response" }
    }
}
