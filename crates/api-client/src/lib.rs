//! Authenticated HTTP client for the board API
//!
//! Every call goes through `ApiClient::execute`, which attaches the current
//! bearer token, classifies the response into an `Outcome`, and on a 401
//! waits for the shared token refresh before retrying exactly once.
//!
//! Request lifecycle:
//! 1. Caller issues `execute(method, endpoint, body, headers)`
//! 2. Token read from the `CredentialStore`, attached as `Authorization: Bearer`
//! 3. Response classified (`Success`, `ClientError`, `AuthError`, ...)
//! 4. On 401 the `RefreshCoordinator` yields a new token (one refresh per cycle)
//! 5. The request is reissued once with that token and its outcome returned

pub mod body;
pub mod classify;
pub mod client;
pub mod error;
pub mod metrics;
pub mod outcome;

pub use body::{MultipartField, RequestBody};
pub use classify::{classify, transport_failure};
pub use client::ApiClient;
pub use error::{ApiError, Result};
pub use outcome::{ErrorPayload, Outcome};
