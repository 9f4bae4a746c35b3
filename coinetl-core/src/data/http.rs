//! Blocking reqwest transport.

use super::provider::{FetchError, HttpResponse, HttpTransport};
use std::time::Duration;

/// Default User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("coinetl/", env!("CARGO_PKG_VERSION"));

/// [`HttpTransport`] backed by `reqwest::blocking::Client`.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Build a client with a per-request timeout.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, FetchError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                reason: if e.is_timeout() {
                    format!("request timed out: {e}")
                } else {
                    e.to_string()
                },
            })?;

        let status = resp.status().as_u16();
        let body = resp.text().map_err(|e| FetchError::Network {
            url: url.to_string(),
            reason: format!("failed to read body: {e}"),
        })?;

        Ok(HttpResponse { status, body })
    }
}
