//! Base origin for every outbound request
//!
//! All calls go to one fixed origin. Endpoint paths are joined onto it with
//! exactly one slash between the two, whatever the caller passed.

use crate::error::{Error, Result};

/// Validated `http://` or `https://` origin with no trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiOrigin(String);

impl ApiOrigin {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let rest = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .ok_or_else(|| {
                Error::InvalidOrigin(format!("must start with http:// or https://, got: {raw}"))
            })?;

        if rest.trim_matches('/').is_empty() {
            return Err(Error::InvalidOrigin(format!("missing host in {raw}")));
        }

        Ok(Self(trimmed.trim_end_matches('/').to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Absolute URL for `endpoint`, which gets exactly one leading slash.
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.0, endpoint.trim_start_matches('/'))
    }
}

impl std::fmt::Display for ApiOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
