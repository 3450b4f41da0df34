//! Session token refresh
//!
//! The refresh exchange carries the session cookie, never the expired bearer
//! token. The new token comes back in the `Authorization` response header.

use std::future::Future;
use std::pin::Pin;

use common::{ApiOrigin, Secret};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use tracing::debug;

use crate::constants::{BEARER_PREFIX, REFRESH_PATH};
use crate::error::{RefreshError, Result};

/// Produces a new access token from server-side session state.
///
/// Uses `Pin<Box<dyn Future>>` so the coordinator can hold an
/// `Arc<dyn TokenRefresher>`.
pub trait TokenRefresher: Send + Sync {
    fn refresh(&self) -> Pin<Box<dyn Future<Output = Result<Secret<String>>> + Send + '_>>;
}

/// Refresher that POSTs to `/auth/refresh` on the API origin.
///
/// The client must have its cookie store enabled so the session cookie set at
/// login rides along.
pub struct SessionRefresher {
    client: reqwest::Client,
    endpoint: String,
}

impl SessionRefresher {
    pub fn new(client: reqwest::Client, origin: &ApiOrigin) -> Self {
        Self {
            client,
            endpoint: origin.url(REFRESH_PATH),
        }
    }

    async fn exchange(&self) -> Result<Secret<String>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .send()
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_owned();

            // 401/403 means the session itself is gone
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(RefreshError::Rejected {
                    status: status.as_u16(),
                    message,
                });
            }

            return Err(RefreshError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let header = response
            .headers()
            .get(AUTHORIZATION)
            .ok_or_else(|| RefreshError::Protocol("no Authorization header present".into()))?;
        let value = header
            .to_str()
            .map_err(|e| RefreshError::Protocol(format!("unreadable Authorization header: {e}")))?;
        let token = bearer_token(value)
            .ok_or_else(|| RefreshError::Protocol("empty token in Authorization header".into()))?;

        debug!(status = status.as_u16(), "refresh endpoint issued a token");
        Ok(Secret::from(token))
    }
}

impl TokenRefresher for SessionRefresher {
    fn refresh(&self) -> Pin<Box<dyn Future<Output = Result<Secret<String>>> + Send + '_>> {
        Box::pin(self.exchange())
    }
}

/// Token part of an `Authorization` value, with any `Bearer` scheme removed.
///
/// Returns `None` for a blank token.
pub fn bearer_token(value: &str) -> Option<&str> {
    let value = value.trim();
    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case(BEARER_PREFIX.trim_end()) => {
            rest.trim()
        }
        _ if value.eq_ignore_ascii_case(BEARER_PREFIX.trim_end()) => "",
        _ => value,
    };
    if token.is_empty() { None } else { Some(token) }
}
