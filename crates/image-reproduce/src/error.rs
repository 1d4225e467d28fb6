//! Error types for the image reproduce service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Main error type for service operations
#[derive(Error, Debug)]
pub enum ReproduceError {
    /// Missing credential or invalid configuration
    #[error("{0}")]
    Configuration(String),

    /// A prompt template or the model registry is missing on disk
    #[error("{0}")]
    NotFound(String),

    /// Upstream API answered with a non-2xx status
    #[error("Upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Upstream call exceeded its time ceiling
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Connection or transport level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream event stream broke framing rules or size limits
    #[error("Upstream stream error: {0}")]
    Protocol(String),

    /// JSON encoding or decoding errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Image generation gave up after all attempts
    #[error("Failed to generate image: {0}")]
    GenerationFailed(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReproduceError {
    /// Whether the retry controller may try again after this error
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ReproduceError::Configuration(_))
    }

    /// Error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ReproduceError::Configuration(_) => "configuration",
            ReproduceError::NotFound(_) => "not_found",
            ReproduceError::Upstream { .. } => "upstream",
            ReproduceError::Timeout(_) => "timeout",
            ReproduceError::Network(_) => "network",
            ReproduceError::Protocol(_) => "protocol",
            ReproduceError::Serialization(_) => "serialization",
            ReproduceError::GenerationFailed(_) => "generation",
            ReproduceError::Io(_) => "io",
        }
    }
}

impl From<reqwest::Error> for ReproduceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ReproduceError::Timeout(e.to_string())
        } else if e.is_connect() {
            ReproduceError::Network(format!("Failed to connect to upstream: {e}"))
        } else if e.is_decode() {
            ReproduceError::Serialization(e.to_string())
        } else {
            ReproduceError::Network(format!("Request failed: {e}"))
        }
    }
}

impl From<serde_json::Error> for ReproduceError {
    fn from(e: serde_json::Error) -> Self {
        ReproduceError::Serialization(e.to_string())
    }
}

impl IntoResponse for ReproduceError {
    fn into_response(self) -> Response {
        tracing::error!(
            error_type = self.category(),
            error_message = %self,
            "Request failed"
        );

        let body = serde_json::json!({ "detail": self.to_string() });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, ReproduceError>;
