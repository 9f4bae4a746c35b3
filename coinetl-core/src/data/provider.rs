//! Market data source traits and structured fetch errors.
//!
//! `HttpTransport` and `Sleeper` abstract the two side effects of the fetch
//! primitive (network and waiting) so the retry policy can be driven by a
//! scripted transport in tests. `MarketDataSource` abstracts the remote API
//! for the extractor.

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Structured error types for remote fetches.
///
/// Rate limiting never surfaces here directly: it is retried inside the fetch
/// primitive and only shows up as `RetriesExhausted` once the budget is spent.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("exhausted retries for {url} after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: u32 },

    #[error("invalid JSON from {url}: {reason}")]
    InvalidJson { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("coin id {0:?} is not a plain slug")]
    InvalidCoinId(String),
}

/// Minimal HTTP response: status plus body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One blocking GET request. Implementations must not retry on their own.
pub trait HttpTransport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, FetchError>;
}

/// Blocking wait used for backoff and inter-request pauses.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeper backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Remote source of ranked listings and per-coin series.
///
/// Payloads are returned as parsed JSON so the extractor can persist them
/// verbatim; typed decoding happens in the transformer.
pub trait MarketDataSource {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Quote currency used for every request.
    fn vs_currency(&self) -> &str;

    /// Lookback window, in days, of the historical series.
    fn history_days(&self) -> u32;

    /// Ranked coin listing.
    fn coins_markets(&self) -> Result<Value, FetchError>;

    /// Historical price / market cap / volume series for one coin.
    fn market_chart(&self, coin_id: &str) -> Result<Value, FetchError>;
}
