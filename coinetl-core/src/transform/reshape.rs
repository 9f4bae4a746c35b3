//! Pure reshaping of decoded payloads into relational rows.

use super::TransformError;
use crate::data::coingecko::{MarketChart, MarketListing};
use crate::domain::{CoinRow, MarketHistoryRow, MarketSnapshotRow, SnapshotId};
use chrono::DateTime;
use std::collections::BTreeMap;

/// Restrict the listing to `coins`, in `coins` order.
///
/// Every selected coin must be present in the listing it was selected from.
pub fn filter_listing<'a>(
    listing: &'a [MarketListing],
    coins: &[String],
) -> Result<Vec<&'a MarketListing>, TransformError> {
    coins
        .iter()
        .map(|coin| {
            listing
                .iter()
                .find(|entry| &entry.id == coin)
                .ok_or_else(|| TransformError::MissingListingEntry {
                    coin_id: coin.clone(),
                })
        })
        .collect()
}

/// Map listing entries onto snapshot rows.
pub fn snapshot_rows(snapshot_id: &SnapshotId, entries: &[&MarketListing]) -> Vec<MarketSnapshotRow> {
    entries
        .iter()
        .map(|entry| MarketSnapshotRow {
            snapshot_id: snapshot_id.clone(),
            coin_id: entry.id.clone(),
            price: entry.current_price,
            market_cap: entry.market_cap,
            volume_24h: entry.total_volume,
            rank: entry.market_cap_rank,
            last_updated: entry.last_updated,
        })
        .collect()
}

/// Extract reference rows from listing entries.
pub fn reference_rows(entries: &[&MarketListing]) -> Vec<CoinRow> {
    entries
        .iter()
        .map(|entry| CoinRow {
            coin_id: entry.id.clone(),
            symbol: entry.symbol.clone(),
            name: entry.name.clone(),
        })
        .collect()
}

/// Merge an accumulated reference table with newly observed rows.
///
/// One row per `coin_id`; later observations win (`incoming` over
/// `existing`, and within a batch the last occurrence). Output is sorted by
/// `coin_id` so the rewritten table is deterministic.
pub fn merge_reference(existing: Vec<CoinRow>, incoming: Vec<CoinRow>) -> Vec<CoinRow> {
    let mut by_id: BTreeMap<String, CoinRow> = BTreeMap::new();
    for row in existing.into_iter().chain(incoming) {
        by_id.insert(row.coin_id.clone(), row);
    }
    by_id.into_values().collect()
}

/// Zip a coin's parallel series into history rows.
///
/// The three arrays must have equal length; the row timestamp is taken from
/// `prices` and converted from epoch milliseconds to UTC.
pub fn history_rows(
    snapshot_id: &SnapshotId,
    coin_id: &str,
    file: &str,
    chart: &MarketChart,
) -> Result<Vec<MarketHistoryRow>, TransformError> {
    let n = chart.prices.len();
    if chart.market_caps.len() != n || chart.total_volumes.len() != n {
        return Err(TransformError::MalformedPayload {
            file: file.to_string(),
            reason: format!(
                "series lengths differ: prices={n}, market_caps={}, total_volumes={}",
                chart.market_caps.len(),
                chart.total_volumes.len()
            ),
        });
    }

    chart
        .prices
        .iter()
        .zip(&chart.market_caps)
        .zip(&chart.total_volumes)
        .map(|((price, cap), volume)| {
            let ts = DateTime::from_timestamp_millis(price.0).ok_or_else(|| {
                TransformError::MalformedPayload {
                    file: file.to_string(),
                    reason: format!("timestamp out of range: {}", price.0),
                }
            })?;
            Ok(MarketHistoryRow {
                coin_id: coin_id.to_string(),
                ts,
                price: price.1,
                market_cap: cap.1,
                volume_24h: volume.1,
                snapshot_id: snapshot_id.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::coingecko::MarketPoint;

    fn sid() -> SnapshotId {
        SnapshotId::parse("20250924T131500000Z").unwrap()
    }

    fn entry(id: &str, name: &str, rank: u32) -> MarketListing {
        MarketListing {
            id: id.into(),
            symbol: id[..3].into(),
            name: name.into(),
            current_price: Some(10.0 * rank as f64),
            market_cap: Some(1e9),
            total_volume: Some(1e8),
            market_cap_rank: Some(rank),
            last_updated: None,
        }
    }

    fn coin(id: &str, name: &str) -> CoinRow {
        CoinRow {
            coin_id: id.into(),
            symbol: id[..3].into(),
            name: name.into(),
        }
    }

    #[test]
    fn filter_drops_unselected_and_follows_selection_order() {
        let listing = vec![
            entry("bitcoin", "Bitcoin", 1),
            entry("ethereum", "Ethereum", 2),
            entry("tether", "Tether", 3),
        ];
        let coins = vec!["ethereum".to_string(), "bitcoin".to_string()];

        let kept = filter_listing(&listing, &coins).unwrap();

        let ids: Vec<&str> = kept.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["ethereum", "bitcoin"]);
    }

    #[test]
    fn filter_fails_when_selected_coin_missing() {
        let listing = vec![entry("bitcoin", "Bitcoin", 1)];
        let coins = vec!["bitcoin".to_string(), "cardano".to_string()];
        assert!(matches!(
            filter_listing(&listing, &coins),
            Err(TransformError::MissingListingEntry { coin_id }) if coin_id == "cardano"
        ));
    }

    #[test]
    fn snapshot_rows_map_listing_fields() {
        let listing = vec![entry("bitcoin", "Bitcoin", 1)];
        let kept: Vec<&MarketListing> = listing.iter().collect();
        let rows = snapshot_rows(&sid(), &kept);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].snapshot_id, sid());
        assert_eq!(rows[0].price, Some(10.0));
        assert_eq!(rows[0].volume_24h, Some(1e8));
        assert_eq!(rows[0].rank, Some(1));
    }

    #[test]
    fn merge_prefers_latest_observation() {
        let existing = vec![coin("bitcoin", "Bitcoin"), coin("cardano", "Cardano")];
        let incoming = vec![coin("bitcoin", "Bitcoin (renamed)"), coin("avalanche", "Avalanche")];

        let merged = merge_reference(existing, incoming);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].coin_id, "avalanche");
        assert_eq!(merged[1].name, "Bitcoin (renamed)");
        assert_eq!(merged[2].coin_id, "cardano");
    }

    #[test]
    fn history_rows_zip_series_and_convert_ms() {
        let chart = MarketChart {
            prices: vec![MarketPoint(1_700_000_000_000, Some(1.0)), MarketPoint(1_700_003_600_000, Some(2.0))],
            market_caps: vec![MarketPoint(1_700_000_000_000, Some(10.0)), MarketPoint(1_700_003_600_000, None)],
            total_volumes: vec![MarketPoint(1_700_000_000_000, Some(5.0)), MarketPoint(1_700_003_600_000, Some(6.0))],
        };

        let rows = history_rows(&sid(), "bitcoin", "f.json", &chart).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ts.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(rows[1].price, Some(2.0));
        assert_eq!(rows[1].market_cap, None);
        assert_eq!(rows[1].volume_24h, Some(6.0));
        assert!(rows.iter().all(|r| r.coin_id == "bitcoin" && r.snapshot_id == sid()));
    }

    #[test]
    fn history_rows_reject_ragged_series() {
        let chart = MarketChart {
            prices: vec![MarketPoint(1, Some(1.0)), MarketPoint(2, Some(1.0))],
            market_caps: vec![MarketPoint(1, Some(1.0))],
            total_volumes: vec![MarketPoint(1, Some(1.0)), MarketPoint(2, Some(1.0))],
        };
        assert!(matches!(
            history_rows(&sid(), "bitcoin", "f.json", &chart),
            Err(TransformError::MalformedPayload { .. })
        ));
    }
}
