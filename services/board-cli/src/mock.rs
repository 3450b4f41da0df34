//! Development backend
//!
//! In-process stand-in for the board API, started when `dev.mock = true`.
//! Mirrors the real session model: the first contact gets a session cookie,
//! `POST /auth/refresh` trades that cookie for a short-lived bearer token,
//! and API routes reject anything but the current token.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use axum::extract::State;
use axum::{Json, Router};
use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use common::ApiOrigin;
use serde_json::json;
use session_auth::{REFRESH_PATH, bearer_token};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::board::{POPULAR_POSTS_PATH, Post};

pub const SESSION_COOKIE: &str = "session";

/// Requests a token is good for before it expires.
pub const TOKEN_USES: u32 = 3;

#[derive(Debug, Default)]
struct MockState {
    session: Option<String>,
    revoked: bool,
    token: Option<String>,
    uses_left: u32,
    issued: u64,
}

/// Shared handle to the backend's session state.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn tokens_issued(&self) -> u64 {
        self.lock().issued
    }

    /// Invalidate the current token, keeping the session.
    #[cfg(test)]
    pub fn expire_token(&self) {
        self.lock().token = None;
    }

    /// End the session for good; refreshes fail from now on.
    #[cfg(test)]
    pub fn revoke_session(&self) {
        let mut state = self.lock();
        state.revoked = true;
        state.session = None;
        state.token = None;
    }

    fn has_session(&self, headers: &HeaderMap) -> bool {
        let state = self.lock();
        !state.revoked && state.session.is_some() && session_cookie(headers) == state.session
    }

    /// Attach a session cookie if the caller came without one.
    fn with_session(&self, headers: &HeaderMap, mut response: Response) -> Response {
        if session_cookie(headers).is_some() {
            return response;
        }
        let mut state = self.lock();
        if state.revoked {
            return response;
        }
        let session = state
            .session
            .get_or_insert_with(|| uuid::Uuid::new_v4().as_simple().to_string());
        let cookie = format!("{SESSION_COOKIE}={session}; Path=/; HttpOnly");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
        response
    }

    fn issue_token(&self) -> String {
        let mut state = self.lock();
        state.issued += 1;
        let token = format!("dev-{}-{}", state.issued, uuid::Uuid::new_v4().as_simple());
        state.token = Some(token.clone());
        state.uses_left = TOKEN_USES;
        token
    }

    /// Spend one use of `token` if it is the current one.
    fn accept(&self, token: &str) -> bool {
        let mut state = self.lock();
        if state.uses_left == 0 || state.token.as_deref() != Some(token) {
            return false;
        }
        state.uses_left -= 1;
        if state.uses_left == 0 {
            state.token = None;
        }
        true
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_owned())
}

fn message(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// Build the backend router.
pub fn router(backend: MockBackend) -> Router {
    Router::new()
        .route(REFRESH_PATH, post(refresh_handler))
        .route(POPULAR_POSTS_PATH, get(popular_posts_handler))
        .fallback(not_found_handler)
        .with_state(backend)
}

/// Bind on an ephemeral loopback port and serve in the background.
///
/// Returns once the listener is bound, so requests to the returned origin
/// cannot race the server start.
pub async fn start(backend: MockBackend) -> Result<ApiOrigin> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind development backend")?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router(backend)).await {
            error!(error = %e, "development backend stopped");
        }
    });
    info!(%addr, "development backend listening");
    ApiOrigin::parse(&format!("http://{addr}")).context("development backend origin")
}

async fn refresh_handler(State(backend): State<MockBackend>, headers: HeaderMap) -> Response {
    if !backend.has_session(&headers) {
        debug!("refresh without a valid session");
        let response = message(StatusCode::UNAUTHORIZED, "no active session");
        return backend.with_session(&headers, response);
    }
    let token = backend.issue_token();
    debug!(issued = backend.tokens_issued(), "issued access token");
    match HeaderValue::from_str(&format!("Bearer {token}")) {
        Ok(value) => (StatusCode::OK, [(AUTHORIZATION, value)]).into_response(),
        Err(_) => message(StatusCode::INTERNAL_SERVER_ERROR, "token encoding failed"),
    }
}

async fn popular_posts_handler(
    State(backend): State<MockBackend>,
    headers: HeaderMap,
) -> Response {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token);
    let response = match token {
        Some(token) if backend.accept(token) => Json(sample_posts()).into_response(),
        Some(_) => message(StatusCode::UNAUTHORIZED, "token expired"),
        None => message(StatusCode::UNAUTHORIZED, "authentication required"),
    };
    backend.with_session(&headers, response)
}

async fn not_found_handler() -> Response {
    message(StatusCode::NOT_FOUND, "not found")
}

fn sample_posts() -> Vec<Post> {
    [
        (1, "Rust 2024 edition migration notes", "mina", 128),
        (2, "Show us your desk setup", "jun", 96),
        (3, "Weekly question thread", "board-bot", 41),
    ]
    .into_iter()
    .map(|(id, title, author, likes)| Post {
        id,
        title: title.into(),
        author: author.into(),
        likes,
    })
    .collect()
}
