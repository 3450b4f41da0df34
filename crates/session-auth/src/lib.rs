//! Session credentials for the board API
//!
//! Holds the current bearer token, exchanges the cookie-bound session for a
//! new token, and makes sure concurrent callers that all see an expired token
//! share a single refresh.
//!
//! Credential flow:
//! 1. Start-up or login seeds the token via `RefreshCoordinator::establish()`
//! 2. The request pipeline reads it from `CredentialStore::current()`
//! 3. On a 401 the pipeline calls `RefreshCoordinator::ensure_fresh_token()`
//! 4. The first caller's cycle runs `TokenRefresher::refresh()` once
//! 5. The outcome is written to the store and handed to every waiter

pub mod constants;
pub mod credentials;
pub mod error;
pub mod refresh;
pub mod token;

pub use constants::*;
pub use credentials::CredentialStore;
pub use error::{RefreshError, Result};
pub use refresh::RefreshCoordinator;
pub use token::{SessionRefresher, TokenRefresher, bearer_token};
