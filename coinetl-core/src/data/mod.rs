//! Remote market data: fetch primitive, HTTP transport, CoinGecko client.

pub mod coingecko;
pub mod fetcher;
pub mod http;
pub mod provider;

pub use coingecko::{
    distinct_coins, is_coin_slug, select_top_n, CoinGeckoClient, MarketChart, MarketListing, MarketPoint, MarketSettings,
    DEFAULT_BASE_URL,
};
pub use fetcher::{RateLimitedFetcher, RetryPolicy, RATE_LIMIT_STATUS};
pub use http::ReqwestTransport;
pub use provider::{FetchError, HttpResponse, HttpTransport, MarketDataSource, Sleeper, ThreadSleeper};
