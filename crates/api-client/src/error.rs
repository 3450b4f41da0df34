//! Error types for API calls

use crate::outcome::ErrorPayload;

/// Failed API call, the `Err` side of `Outcome::into_result`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },

    #[error("API error ({status}): {message}")]
    Client {
        status: u16,
        message: String,
        payload: Option<ErrorPayload>,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("client setup failed: {0}")]
    Setup(String),
}

impl ApiError {
    /// Whether the session should be treated as invalid (sign in again).
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth { .. })
    }

    /// HTTP status of the failed response, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Auth { status, .. } | ApiError::Client { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for API calls.
pub type Result<T> = std::result::Result<T, ApiError>;
