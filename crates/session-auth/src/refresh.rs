//! Single-flight token refresh
//!
//! Any number of callers may ask for a fresh token at once. The first one to
//! find the coordinator idle starts a refresh cycle; everyone who arrives
//! while it runs is parked on a oneshot. When the refresher returns, the
//! store write, the drain of parked callers, and the reset to idle happen
//! under one lock, so nobody can enqueue onto a cycle that already finished.
//!
//! The cycle runs on its own task. Dropping a caller's future (timeout,
//! cancelled request) therefore never strands the others, and a refresher
//! that panics still settles the cycle as `Abandoned`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use common::Secret;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::credentials::CredentialStore;
use crate::error::{RefreshError, Result};
use crate::token::TokenRefresher;

type Waiter = oneshot::Sender<Result<Secret<String>>>;

/// Idle when `in_flight` is false; `waiters` is empty whenever idle.
#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: Vec<Waiter>,
}

struct Inner {
    store: Arc<CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    state: Mutex<RefreshState>,
}

/// Coordinates token refresh for every request sharing one credential store.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<CredentialStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                refresher,
                state: Mutex::new(RefreshState::default()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.inner.store
    }

    /// Wait for the outcome of the current refresh cycle, starting one if idle.
    ///
    /// All callers of one cycle get the same token or the same error. A failed
    /// cycle is not retried; the next call starts a new one.
    pub async fn ensure_fresh_token(&self) -> Result<Secret<String>> {
        let (tx, rx) = oneshot::channel();

        let starts_cycle = {
            let mut state = self.inner.lock_state();
            state.waiters.push(tx);
            if state.in_flight {
                debug!(waiters = state.waiters.len(), "refresh in flight, waiting");
                false
            } else {
                state.in_flight = true;
                true
            }
        };

        if starts_cycle {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(inner.run_cycle());
        }

        rx.await.unwrap_or(Err(RefreshError::Abandoned))
    }

    /// Whether a refresh cycle is running right now.
    pub fn is_refreshing(&self) -> bool {
        self.inner.lock_state().in_flight
    }

    /// Number of callers parked on the running cycle.
    pub fn pending_waiters(&self) -> usize {
        self.inner.lock_state().waiters.len()
    }

    /// Install a token obtained by signing in.
    pub fn establish(&self, token: Secret<String>) {
        let _state = self.inner.lock_state();
        self.inner.store.replace(Some(token));
        info!("session established");
    }

    /// Drop the current token.
    pub fn sign_out(&self) {
        let _state = self.inner.lock_state();
        self.inner.store.replace(None);
        info!("signed out");
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_cycle(self: Arc<Self>) {
        let cycle = Cycle {
            inner: self.as_ref(),
            settled: false,
        };
        info!("refreshing access token");
        let result = self.refresher.refresh().await;
        cycle.settle(result);
    }

    /// Publish a cycle's outcome: store write, drain and idle reset in one
    /// critical section, delivery after the lock is released.
    fn settle(&self, result: Result<Secret<String>>) {
        let waiters = {
            let mut state = self.lock_state();
            self.store.replace(result.as_ref().ok().cloned());
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };

        match &result {
            Ok(_) => {
                info!(waiters = waiters.len(), "access token refreshed");
                metrics::counter!("api_token_refresh_total", "result" => "success").increment(1);
            }
            Err(e) => {
                warn!(
                    waiters = waiters.len(),
                    kind = e.kind(),
                    error = %e,
                    "token refresh failed, credential cleared"
                );
                metrics::counter!("api_token_refresh_total", "result" => e.kind()).increment(1);
            }
        }

        for waiter in waiters {
            // A waiter whose caller went away is fine to skip
            let _ = waiter.send(result.clone());
        }
    }
}

/// Settles its cycle exactly once, even if the refresher never returns.
struct Cycle<'a> {
    inner: &'a Inner,
    settled: bool,
}

impl Cycle<'_> {
    fn settle(mut self, result: Result<Secret<String>>) {
        self.settled = true;
        self.inner.settle(result);
    }
}

impl Drop for Cycle<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("refresh task ended without a result");
            self.inner.settle(Err(RefreshError::Abandoned));
        }
    }
}
