//! Wire constants for the session refresh exchange

/// Endpoint that trades the session cookie for a fresh access token
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Scheme prefix on `Authorization` header values, request and response side
pub const BEARER_PREFIX: &str = "Bearer ";
