//! Typed result of one API exchange

use serde::{Deserialize, Serialize};
use session_auth::RefreshError;

use crate::error::ApiError;

/// Error envelope the API returns on failures.
///
/// Only `message` is interpreted; everything else is kept for callers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// What an `execute` call produced, success and failure alike.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 2xx with its JSON body (`Null` when the body was empty)
    Success(serde_json::Value),
    /// Non-2xx other than 401
    ClientError {
        status: u16,
        message: String,
        payload: Option<ErrorPayload>,
    },
    /// 401 from the API, or a failed token refresh
    AuthError { status: u16, message: String },
    /// No response received
    NetworkError(String),
    /// 2xx whose body could not be understood
    ProtocolError(String),
}

impl Outcome {
    /// Outcome handed to a caller whose refresh cycle failed.
    pub fn refresh_failed(error: &RefreshError) -> Self {
        // Only a rejected session keeps its own status; anything else is a 401
        let status = match error {
            RefreshError::Rejected { status, .. } => *status,
            _ => 401,
        };
        Outcome::AuthError {
            status,
            message: format!("token refresh failed: {error}"),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// HTTP status, when a response was received and it was not a success.
    pub fn status(&self) -> Option<u16> {
        match self {
            Outcome::ClientError { status, .. } | Outcome::AuthError { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::ClientError { .. } => "client_error",
            Outcome::AuthError { .. } => "auth_error",
            Outcome::NetworkError(_) => "network_error",
            Outcome::ProtocolError(_) => "protocol_error",
        }
    }

    pub fn into_result(self) -> Result<serde_json::Value, ApiError> {
        match self {
            Outcome::Success(payload) => Ok(payload),
            Outcome::ClientError {
                status,
                message,
                payload,
            } => Err(ApiError::Client {
                status,
                message,
                payload,
            }),
            Outcome::AuthError { status, message } => Err(ApiError::Auth { status, message }),
            Outcome::NetworkError(message) => Err(ApiError::Network(message)),
            Outcome::ProtocolError(message) => Err(ApiError::Protocol(message)),
        }
    }
}
