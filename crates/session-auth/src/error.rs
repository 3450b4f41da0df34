//! Error types for token refresh

/// Why a refresh cycle failed.
///
/// `Clone` because one failure is handed to every caller waiting on the cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("refresh request failed: {0}")]
    Network(String),

    #[error("session rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("refresh endpoint returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("malformed refresh response: {0}")]
    Protocol(String),

    #[error("refresh cycle ended without a result")]
    Abandoned,
}

impl RefreshError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RefreshError::Network(_) => "network",
            RefreshError::Rejected { .. } => "rejected",
            RefreshError::Server { .. } => "server",
            RefreshError::Protocol(_) => "protocol",
            RefreshError::Abandoned => "abandoned",
        }
    }

    /// HTTP status of the refresh response, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            RefreshError::Rejected { status, .. } | RefreshError::Server { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// Result alias for refresh operations.
pub type Result<T> = std::result::Result<T, RefreshError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(RefreshError::Network("reset".into()).kind(), "network");
        assert_eq!(
            RefreshError::Rejected {
                status: 403,
                message: "Forbidden".into()
            }
            .kind(),
            "rejected"
        );
        assert_eq!(RefreshError::Abandoned.kind(), "abandoned");
    }

    #[test]
    fn status_only_for_http_failures() {
        let rejected = RefreshError::Rejected {
            status: 401,
            message: "Unauthorized".into(),
        };
        assert_eq!(rejected.status(), Some(401));
        assert_eq!(RefreshError::Protocol("no header".into()).status(), None);
        assert_eq!(rejected.to_string(), "session rejected (401): Unauthorized");
    }
}
