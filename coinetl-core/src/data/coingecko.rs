//! CoinGecko market data source.
//!
//! Two endpoints are used:
//! - `/coins/markets`: ranked listing by market cap
//! - `/coins/{id}/market_chart`: price, market cap and volume series
//!
//! Payload types below are what the transformer decodes raw files into. The
//! listing tolerates `null` numbers, which CoinGecko returns for thin coins.

use super::fetcher::RateLimitedFetcher;
use super::provider::{FetchError, HttpTransport, MarketDataSource, Sleeper, ThreadSleeper};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// One entry of the `/coins/markets` listing. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketListing {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub total_volume: Option<f64>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// `/coins/{id}/market_chart` payload: parallel `[ms_epoch, value]` arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketChart {
    pub prices: Vec<MarketPoint>,
    pub market_caps: Vec<MarketPoint>,
    pub total_volumes: Vec<MarketPoint>,
}

/// `[timestamp_ms, value]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketPoint(pub i64, pub Option<f64>);

/// Request parameters shared by every call of one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketSettings {
    pub base_url: String,
    pub vs_currency: String,
    pub per_page: u32,
    pub page: u32,
    pub history_days: u32,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            vs_currency: "usd".to_string(),
            per_page: 50,
            page: 1,
            history_days: 60,
        }
    }
}

/// CoinGecko client built on the rate-limited fetch primitive.
pub struct CoinGeckoClient<T, S = ThreadSleeper> {
    fetcher: RateLimitedFetcher<T, S>,
    settings: MarketSettings,
}

impl<T: HttpTransport, S: Sleeper> CoinGeckoClient<T, S> {
    pub fn new(fetcher: RateLimitedFetcher<T, S>, settings: MarketSettings) -> Self {
        Self { fetcher, settings }
    }

    pub fn settings(&self) -> &MarketSettings {
        &self.settings
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    /// Query of the ranked-listing request.
    pub fn markets_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("vs_currency", self.settings.vs_currency.clone()),
            ("order", "market_cap_desc".to_string()),
            ("per_page", self.settings.per_page.to_string()),
            ("page", self.settings.page.to_string()),
            ("price_change_percentage", "24h".to_string()),
        ]
    }

    /// Query of the per-coin series request.
    pub fn chart_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("vs_currency", self.settings.vs_currency.clone()),
            ("days", self.settings.history_days.to_string()),
        ]
    }
}

impl<T: HttpTransport, S: Sleeper> MarketDataSource for CoinGeckoClient<T, S> {
    fn name(&self) -> &str {
        "coingecko"
    }

    fn vs_currency(&self) -> &str {
        &self.settings.vs_currency
    }

    fn history_days(&self) -> u32 {
        self.settings.history_days
    }

    fn coins_markets(&self) -> Result<Value, FetchError> {
        self.fetcher
            .fetch(&self.endpoint("/coins/markets"), &self.markets_query())
    }

    fn market_chart(&self, coin_id: &str) -> Result<Value, FetchError> {
        if !is_coin_slug(coin_id) {
            return Err(FetchError::InvalidCoinId(coin_id.to_string()));
        }
        self.fetcher.fetch(
            &self.endpoint(&format!("/coins/{coin_id}/market_chart")),
            &self.chart_query(),
        )
    }
}

/// True for ids made only of `[a-z0-9_-]`. Coin ids end up in file names and
/// URL path segments, so nothing else is accepted.
pub fn is_coin_slug(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}

/// Number of distinct coin ids in a listing.
pub fn distinct_coins(listing: &[MarketListing]) -> usize {
    listing
        .iter()
        .map(|coin| coin.id.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Select the first `n` coin ids by market-cap rank.
///
/// Entries without a rank sort after ranked ones; ties keep listing order.
/// Returns `None` if the listing has fewer than `n` distinct coins.
pub fn select_top_n(listing: &[MarketListing], n: usize) -> Option<Vec<String>> {
    let mut ranked: Vec<(usize, &MarketListing)> = listing.iter().enumerate().collect();
    ranked.sort_by_key(|(pos, coin)| (coin.market_cap_rank.unwrap_or(u32::MAX), *pos));

    let mut selected: Vec<String> = Vec::with_capacity(n);
    for (_, coin) in ranked {
        if selected.len() == n {
            break;
        }
        if !selected.contains(&coin.id) {
            selected.push(coin.id.clone());
        }
    }

    (selected.len() == n).then_some(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fetcher::RetryPolicy;
    use crate::data::provider::HttpResponse;
    use std::cell::RefCell;
    use std::time::Duration;

    fn listing(id: &str, rank: Option<u32>) -> MarketListing {
        MarketListing {
            id: id.into(),
            symbol: id[..3].into(),
            name: id.into(),
            current_price: Some(1.0),
            market_cap: Some(1.0),
            total_volume: Some(1.0),
            market_cap_rank: rank,
            last_updated: None,
        }
    }

    #[test]
    fn top_n_follows_rank_not_listing_order() {
        let coins = vec![
            listing("ethereum", Some(2)),
            listing("solana", None),
            listing("bitcoin", Some(1)),
            listing("tether", Some(3)),
        ];
        assert_eq!(
            select_top_n(&coins, 3).unwrap(),
            vec!["bitcoin", "ethereum", "tether"]
        );
    }

    #[test]
    fn top_n_fails_on_short_listing() {
        let coins = vec![listing("bitcoin", Some(1))];
        assert!(select_top_n(&coins, 2).is_none());
    }

    #[test]
    fn coin_slugs_reject_path_characters() {
        assert!(is_coin_slug("bitcoin"));
        assert!(is_coin_slug("usd-coin"));
        assert!(is_coin_slug("wrapped_steth2"));
        assert!(!is_coin_slug(""));
        assert!(!is_coin_slug("../../escaped"));
        assert!(!is_coin_slug("a/b"));
        assert!(!is_coin_slug("Bitcoin"));
        assert!(!is_coin_slug("bit coin"));
    }

    #[test]
    fn distinct_coins_ignores_repeated_ids() {
        let coins = vec![
            listing("bitcoin", Some(1)),
            listing("bitcoin", Some(2)),
            listing("ethereum", Some(3)),
        ];
        assert_eq!(distinct_coins(&coins), 2);
        assert!(select_top_n(&coins, 3).is_none());
    }

    #[test]
    fn listing_decodes_nulls_and_ignores_extra_fields() {
        let json = r#"[{
            "id": "bitcoin", "symbol": "btc", "name": "Bitcoin",
            "image": "https://example/btc.png",
            "current_price": 64000.5, "market_cap": null, "total_volume": 1.5e10,
            "market_cap_rank": 1, "last_updated": "2025-09-24T13:14:59.123Z",
            "price_change_percentage_24h": -0.4
        }]"#;
        let parsed: Vec<MarketListing> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed[0].market_cap, None);
        assert_eq!(parsed[0].market_cap_rank, Some(1));
        assert!(parsed[0].last_updated.is_some());
    }

    #[test]
    fn chart_points_decode_as_pairs() {
        let json = r#"{"prices":[[1727000000000,64000.1]],"market_caps":[[1727000000000,null]],"total_volumes":[[1727000000000,3.0]]}"#;
        let chart: MarketChart = serde_json::from_str(json).unwrap();
        assert_eq!(chart.prices[0], MarketPoint(1_727_000_000_000, Some(64000.1)));
        assert_eq!(chart.market_caps[0].1, None);
    }

    struct Capture(RefCell<Vec<(String, Vec<(String, String)>)>>);

    impl HttpTransport for Capture {
        fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, FetchError> {
            self.0.borrow_mut().push((
                url.to_string(),
                query.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            ));
            Ok(HttpResponse::new(200, "[]"))
        }
    }

    #[test]
    fn client_builds_expected_requests() {
        let fetcher = RateLimitedFetcher::new(
            Capture(RefCell::new(Vec::new())),
            RetryPolicy::new(1, Duration::ZERO),
        );
        let client = CoinGeckoClient::new(
            fetcher,
            MarketSettings {
                base_url: "http://api.test/v3/".into(),
                vs_currency: "eur".into(),
                per_page: 10,
                page: 2,
                history_days: 30,
            },
        );

        client.coins_markets().unwrap();
        client.market_chart("bitcoin").unwrap();

        let calls = client.fetcher_transport_calls();
        assert_eq!(calls[0].0, "http://api.test/v3/coins/markets");
        assert!(calls[0].1.contains(&("vs_currency".into(), "eur".into())));
        assert!(calls[0].1.contains(&("per_page".into(), "10".into())));
        assert!(calls[0].1.contains(&("page".into(), "2".into())));
        assert!(calls[0].1.contains(&("order".into(), "market_cap_desc".into())));
        assert_eq!(calls[1].0, "http://api.test/v3/coins/bitcoin/market_chart");
        assert_eq!(
            calls[1].1,
            vec![
                ("vs_currency".to_string(), "eur".to_string()),
                ("days".to_string(), "30".to_string())
            ]
        );

        assert!(matches!(
            client.market_chart("../bitcoin"),
            Err(FetchError::InvalidCoinId(_))
        ));
        assert_eq!(client.fetcher_transport_calls().len(), 2);
    }

    impl CoinGeckoClient<Capture> {
        fn fetcher_transport_calls(&self) -> Vec<(String, Vec<(String, String)>)> {
            self.fetcher.transport().0.borrow().clone()
        }
    }
}
