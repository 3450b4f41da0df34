//! Request pipeline
//!
//! Builds each request against the fixed origin, attaches the current bearer
//! token, classifies the response and recovers from exactly one 401 by
//! waiting on the shared refresh cycle and reissuing the request. A second
//! 401, and every other failure, goes back to the caller as-is.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{ApiOrigin, Secret};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use session_auth::{BEARER_PREFIX, CredentialStore, RefreshCoordinator, SessionRefresher};
use tracing::{debug, instrument, warn};

use crate::body::RequestBody;
use crate::classify::{classify, transport_failure};
use crate::error::{ApiError, Result};
use crate::outcome::Outcome;

/// Authenticated client for one API origin.
///
/// Clones share the HTTP connection pool, cookie jar and refresh coordinator.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    origin: ApiOrigin,
    coordinator: RefreshCoordinator,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(
        http: reqwest::Client,
        origin: ApiOrigin,
        coordinator: RefreshCoordinator,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            origin,
            coordinator,
            timeout,
        }
    }

    /// Client whose refresher shares the pipeline's cookie jar, so the
    /// session cookie from login reaches `/auth/refresh`.
    pub fn connect(
        origin: ApiOrigin,
        store: Arc<CredentialStore>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| ApiError::Setup(format!("building HTTP client: {e}")))?;
        let refresher = SessionRefresher::new(http.clone(), &origin);
        let coordinator = RefreshCoordinator::new(store, Arc::new(refresher));
        Ok(Self::new(http, origin, coordinator, timeout))
    }

    pub fn origin(&self) -> &ApiOrigin {
        &self.origin
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub async fn get(&self, endpoint: &str) -> Outcome {
        self.execute(Method::GET, endpoint, RequestBody::Empty, HeaderMap::new())
            .await
    }

    pub async fn post(&self, endpoint: &str, body: RequestBody) -> Outcome {
        self.execute(Method::POST, endpoint, body, HeaderMap::new())
            .await
    }

    pub async fn put(&self, endpoint: &str, body: RequestBody) -> Outcome {
        self.execute(Method::PUT, endpoint, body, HeaderMap::new())
            .await
    }

    pub async fn delete(&self, endpoint: &str) -> Outcome {
        self.execute(Method::DELETE, endpoint, RequestBody::Empty, HeaderMap::new())
            .await
    }

    /// GET `endpoint` and deserialize the success payload into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let payload = self.get(endpoint).await.into_result()?;
        serde_json::from_value(payload)
            .map_err(|e| ApiError::Protocol(format!("unexpected response from {endpoint}: {e}")))
    }

    /// Issue one request, recovering from a single 401 via token refresh.
    ///
    /// At most two network calls: the original and one retry.
    #[instrument(skip_all, fields(request_id = %new_request_id(), method = %method, endpoint = %endpoint))]
    pub async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        body: RequestBody,
        headers: HeaderMap,
    ) -> Outcome {
        let started = Instant::now();
        let url = self.origin.url(endpoint);
        let token = self.coordinator.store().current();

        let mut outcome = self
            .send(&method, &url, &body, &headers, token.as_ref())
            .await;

        if matches!(outcome, Outcome::AuthError { status: 401, .. }) {
            outcome = self
                .retry_after_refresh(&method, &url, &body, &headers, token)
                .await;
        }

        debug!(outcome = outcome.label(), status = ?outcome.status(), "request finished");
        crate::metrics::record_request(
            method.as_str(),
            outcome.label(),
            started.elapsed().as_secs_f64(),
        );
        outcome
    }

    async fn retry_after_refresh(
        &self,
        method: &Method,
        url: &str,
        body: &RequestBody,
        headers: &HeaderMap,
        sent_with: Option<Secret<String>>,
    ) -> Outcome {
        let token = match self.coordinator.store().current() {
            // Another request already finished a refresh since this one was sent
            Some(current) if sent_with.as_ref() != Some(&current) => {
                debug!("token replaced while request was in flight, retrying without refresh");
                current
            }
            _ => match self.coordinator.ensure_fresh_token().await {
                Ok(token) => token,
                Err(e) => {
                    warn!(error = %e, "token refresh failed, not retrying");
                    return Outcome::refresh_failed(&e);
                }
            },
        };

        debug!("retrying with refreshed token");
        self.send(method, url, body, headers, Some(&token)).await
    }

    /// One network round trip, classified.
    async fn send(
        &self,
        method: &Method,
        url: &str,
        body: &RequestBody,
        headers: &HeaderMap,
        token: Option<&Secret<String>>,
    ) -> Outcome {
        let mut headers = headers.clone();
        if body.wants_json_content_type() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Some(token) = token {
            match bearer_value(token) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(outcome) => return outcome,
            }
        }

        let request = self
            .http
            .request(method.clone(), url)
            .timeout(self.timeout)
            .headers(headers);

        let response = match body.attach(request).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "no response from API");
                return transport_failure(&e);
            }
        };

        let status = response.status();
        match response.bytes().await {
            Ok(bytes) => classify(status, &bytes),
            Err(e) => {
                warn!(status = status.as_u16(), error = %e, "failed to read response body");
                Outcome::NetworkError(format!("reading response body: {e}"))
            }
        }
    }
}

fn bearer_value(token: &Secret<String>) -> std::result::Result<HeaderValue, Outcome> {
    let mut value = HeaderValue::from_str(&format!("{BEARER_PREFIX}{}", token.expose()))
        .map_err(|e| Outcome::ProtocolError(format!("access token is not a valid header: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

fn new_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().as_simple())
}
