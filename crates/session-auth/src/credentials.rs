//! In-memory holder for the current access token
//!
//! One store per process, created at start-up and shared via `Arc`. Anyone can
//! read the token or subscribe to changes; only the refresh coordinator
//! writes it, inside its critical section.

use common::Secret;
use tokio::sync::watch;
use tracing::debug;

/// Current bearer token, or `None` when signed out.
///
/// Backed by a `watch` channel so readers get a cheap snapshot and observers
/// are woken on every replacement.
pub struct CredentialStore {
    token: watch::Sender<Option<Secret<String>>>,
}

impl CredentialStore {
    /// Empty store (no session yet).
    pub fn new() -> Self {
        let (token, _) = watch::channel(None);
        Self { token }
    }

    /// Store seeded with a token obtained before the client started.
    pub fn with_token(token: Secret<String>) -> Self {
        let (token, _) = watch::channel(Some(token));
        Self { token }
    }

    /// Snapshot of the current token.
    pub fn current(&self) -> Option<Secret<String>> {
        self.token.borrow().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.token.borrow().is_some()
    }

    /// Receiver that observes every token replacement.
    pub fn subscribe(&self) -> watch::Receiver<Option<Secret<String>>> {
        self.token.subscribe()
    }

    /// Replace the token. Callers must hold the coordinator's state lock.
    pub(crate) fn replace(&self, token: Option<Secret<String>>) {
        let present = token.is_some();
        self.token.send_replace(token);
        debug!(present, "credential replaced");
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}
