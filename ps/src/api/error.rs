//! Itinerary API error types

use thiserror::Error;

/// Errors from the itinerary REST API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Whether a retry could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(e) => e.is_timeout() || e.is_connect(),
            ApiError::Status { status, .. } => matches!(status, 408 | 429 | 500 | 502 | 503 | 504),
            ApiError::Json(_) => false,
            ApiError::InvalidUrl(_) => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }

    /// HTTP status, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
