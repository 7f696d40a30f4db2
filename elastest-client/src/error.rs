//! Error types for the ElasTest clients

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to ElasTest
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Request could not be built from the given input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Whether the remote platform could not be reached or answered badly
    ///
    /// Covers transport failures, non-success statuses and malformed bodies.
    pub fn is_remote_communication(&self) -> bool {
        matches!(
            self,
            Self::RequestFailed(_) | Self::ApiError { .. } | Self::ParseError(_)
        )
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 500)
    }
}
