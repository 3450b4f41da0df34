//! Client-side metrics
//!
//! Recorded through the `metrics` facade; whoever embeds the client decides
//! whether an exporter is installed. Without one every call is a no-op.
//!
//! - `api_requests_total` (counter): labels `method`, `outcome`
//! - `api_request_duration_seconds` (histogram): label `outcome`
//! - `api_token_refresh_total` (counter): label `result`, recorded by the
//!   refresh coordinator in `session-auth`

/// Histogram buckets for `api_request_duration_seconds`, 5ms to 60s.
pub const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Record one finished `execute` call, retry included.
pub fn record_request(method: &str, outcome: &'static str, duration_secs: f64) {
    metrics::counter!("api_requests_total", "method" => method.to_string(), "outcome" => outcome)
        .increment(1);
    metrics::histogram!("api_request_duration_seconds", "outcome" => outcome)
        .record(duration_secs);
}
