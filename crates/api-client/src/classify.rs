//! Response classification
//!
//! Maps a completed exchange to an `Outcome`. Only 401 is an auth failure
//! here; 403 and every other non-2xx status is a plain client error.

use reqwest::StatusCode;
use tracing::debug;

use crate::outcome::{ErrorPayload, Outcome};

/// Classify a received response by status and raw body.
pub fn classify(status: StatusCode, body: &[u8]) -> Outcome {
    if status.is_success() {
        return success_payload(status, body);
    }

    let payload = serde_json::from_slice::<ErrorPayload>(body).ok();
    let message = payload
        .as_ref()
        .and_then(|p| p.message.as_deref())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| status_text(status));

    if status == StatusCode::UNAUTHORIZED {
        Outcome::AuthError {
            status: status.as_u16(),
            message,
        }
    } else {
        Outcome::ClientError {
            status: status.as_u16(),
            message,
            payload,
        }
    }
}

/// Classify a request that never produced a response.
pub fn transport_failure(error: &reqwest::Error) -> Outcome {
    let message = if error.is_timeout() {
        format!("request timed out: {error}")
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        format!("request failed: {error}")
    };
    Outcome::NetworkError(message)
}

fn success_payload(status: StatusCode, body: &[u8]) -> Outcome {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Outcome::Success(serde_json::Value::Null);
    }
    match serde_json::from_slice(body) {
        Ok(payload) => Outcome::Success(payload),
        Err(e) => {
            debug!(status = status.as_u16(), error = %e, "success body is not JSON");
            Outcome::ProtocolError(format!(
                "unreadable response body ({}): expected JSON",
                status.as_u16()
            ))
        }
    }
}

/// Status line text, e.g. "Not Found", or the bare code for unknown statuses.
fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_owned)
        .unwrap_or_else(|| status.as_u16().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_with_json_is_success() {
        assert_eq!(
            classify(StatusCode::OK, br#"{"id":1}"#),
            Outcome::Success(json!({"id": 1}))
        );
    }

    #[test]
    fn empty_success_body_is_null() {
        assert_eq!(
            classify(StatusCode::NO_CONTENT, b""),
            Outcome::Success(serde_json::Value::Null)
        );
        assert_eq!(
            classify(StatusCode::OK, b" \n"),
            Outcome::Success(serde_json::Value::Null)
        );
    }

    #[test]
    fn garbage_success_body_is_protocol_error() {
        let outcome = classify(StatusCode::OK, b"<html>oops</html>");
        assert!(matches!(outcome, Outcome::ProtocolError(_)), "got: {outcome:?}");
    }

    #[test]
    fn unauthorized_is_auth_error_with_payload_message() {
        assert_eq!(
            classify(StatusCode::UNAUTHORIZED, br#"{"message":"token expired"}"#),
            Outcome::AuthError {
                status: 401,
                message: "token expired".into()
            }
        );
    }

    #[test]
    fn forbidden_is_a_client_error() {
        let outcome = classify(StatusCode::FORBIDDEN, b"");
        assert_eq!(outcome.status(), Some(403));
        assert_eq!(outcome.label(), "client_error");
    }

    #[test]
    fn client_error_prefers_payload_message() {
        match classify(StatusCode::NOT_FOUND, br#"{"message":"post not found","id":7}"#) {
            Outcome::ClientError {
                status,
                message,
                payload,
            } => {
                assert_eq!(status, 404);
                assert_eq!(message, "post not found");
                assert_eq!(payload.unwrap().details["id"], 7);
            }
            other => panic!("expected ClientError, got {other:?}"),
        }
    }

    #[test]
    fn falls_back_to_status_text() {
        // not JSON at all
        match classify(StatusCode::INTERNAL_SERVER_ERROR, b"upstream exploded") {
            Outcome::ClientError {
                message, payload, ..
            } => {
                assert_eq!(message, "Internal Server Error");
                assert!(payload.is_none());
            }
            other => panic!("expected ClientError, got {other:?}"),
        }

        // message of the wrong type
        let outcome = classify(StatusCode::BAD_REQUEST, br#"{"message":42}"#);
        assert_eq!(
            outcome,
            Outcome::ClientError {
                status: 400,
                message: "Bad Request".into(),
                payload: None
            }
        );

        // blank message
        let outcome = classify(StatusCode::CONFLICT, br#"{"message":"  "}"#);
        match outcome {
            Outcome::ClientError { message, .. } => assert_eq!(message, "Conflict"),
            other => panic!("expected ClientError, got {other:?}"),
        }
    }

    #[test]
    fn unknown_status_uses_numeric_text() {
        let status = StatusCode::from_u16(599).unwrap();
        match classify(status, b"") {
            Outcome::ClientError { message, .. } => assert_eq!(message, "599"),
            other => panic!("expected ClientError, got {other:?}"),
        }
    }
}
