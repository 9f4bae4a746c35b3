//! In-memory [`MarketStore`] with the same key and reference rules as SQLite.

use super::{ts_from_millis, MarketStore, PricePoint, RowCounts, StoreError};
use crate::domain::{CoinRow, MarketHistoryRow, MarketSnapshotRow, SnapshotId};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    coins: BTreeMap<String, CoinRow>,
    snapshots: BTreeMap<(SnapshotId, String), MarketSnapshotRow>,
    history: BTreeMap<(String, i64), MarketHistoryRow>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_coin(&self, table: &'static str, coin_id: &str) -> Result<(), StoreError> {
        if self.coins.contains_key(coin_id) {
            Ok(())
        } else {
            Err(StoreError::UnknownCoin {
                table,
                coin_id: coin_id.to_string(),
            })
        }
    }
}

impl MarketStore for MemoryStore {
    fn insert_coins(&mut self, rows: &[CoinRow]) -> Result<usize, StoreError> {
        let mut inserted = 0;
        for row in rows {
            if !self.coins.contains_key(&row.coin_id) {
                self.coins.insert(row.coin_id.clone(), row.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn snapshot_exists(&self, snapshot_id: &SnapshotId) -> Result<bool, StoreError> {
        Ok(self.snapshots.keys().any(|(sid, _)| sid == snapshot_id))
    }

    fn insert_snapshot_rows(&mut self, rows: &[MarketSnapshotRow]) -> Result<usize, StoreError> {
        // Validate the whole batch first so a failure writes nothing.
        for row in rows {
            self.check_coin("market_snapshots", &row.coin_id)?;
        }
        let mut inserted = 0;
        for row in rows {
            let key = (row.snapshot_id.clone(), row.coin_id.clone());
            if !self.snapshots.contains_key(&key) {
                self.snapshots.insert(key, row.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn max_history_ts(&self, coin_id: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.history
            .range((coin_id.to_string(), i64::MIN)..=(coin_id.to_string(), i64::MAX))
            .next_back()
            .map(|((_, ms), _)| ts_from_millis(coin_id, *ms))
            .transpose()
    }

    fn insert_history_rows(&mut self, rows: &[MarketHistoryRow]) -> Result<usize, StoreError> {
        for row in rows {
            self.check_coin("market_history", &row.coin_id)?;
        }
        let mut inserted = 0;
        for row in rows {
            let key = (row.coin_id.clone(), row.ts.timestamp_millis());
            if !self.history.contains_key(&key) {
                self.history.insert(key, row.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn history_timestamps(&self, coin_id: &str) -> Result<Vec<DateTime<Utc>>, StoreError> {
        self.history
            .range((coin_id.to_string(), i64::MIN)..=(coin_id.to_string(), i64::MAX))
            .map(|((_, ms), _)| ts_from_millis(coin_id, *ms))
            .collect()
    }

    fn price_points(&self) -> Result<Vec<PricePoint>, StoreError> {
        Ok(self
            .history
            .values()
            .filter_map(|row| {
                row.price.map(|price| PricePoint {
                    coin_id: row.coin_id.clone(),
                    ts: row.ts,
                    price,
                })
            })
            .collect())
    }

    fn latest_snapshot_id(&self) -> Result<Option<SnapshotId>, StoreError> {
        Ok(self.snapshots.keys().map(|(sid, _)| sid.clone()).max())
    }

    fn row_counts(&self) -> Result<RowCounts, StoreError> {
        Ok(RowCounts {
            coins: self.coins.len(),
            snapshots: self.snapshots.len(),
            history: self.history.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn coin(id: &str) -> CoinRow {
        CoinRow {
            coin_id: id.into(),
            symbol: id[..3].into(),
            name: id.into(),
        }
    }

    fn point(coin_id: &str, ms: i64) -> MarketHistoryRow {
        MarketHistoryRow {
            coin_id: coin_id.into(),
            ts: Utc.timestamp_millis_opt(ms).unwrap(),
            price: None,
            market_cap: None,
            volume_24h: None,
            snapshot_id: SnapshotId::parse("20250924T131500000Z").unwrap(),
        }
    }

    #[test]
    fn history_range_is_per_coin() {
        let mut store = MemoryStore::new();
        store.insert_coins(&[coin("bitcoin"), coin("cardano")]).unwrap();
        store
            .insert_history_rows(&[point("bitcoin", 5), point("cardano", 9), point("bitcoin", 2)])
            .unwrap();

        assert_eq!(
            store.max_history_ts("bitcoin").unwrap().map(|t| t.timestamp_millis()),
            Some(5)
        );
        let ts: Vec<i64> = store
            .history_timestamps("bitcoin")
            .unwrap()
            .iter()
            .map(|t| t.timestamp_millis())
            .collect();
        assert_eq!(ts, vec![2, 5]);
        assert_eq!(store.max_history_ts("ethereum").unwrap(), None);
    }

    #[test]
    fn unknown_coin_rejects_whole_batch() {
        let mut store = MemoryStore::new();
        store.insert_coins(&[coin("bitcoin")]).unwrap();
        let err = store
            .insert_history_rows(&[point("bitcoin", 1), point("dogecoin", 1)])
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownCoin { table: "market_history", .. }));
        assert_eq!(store.row_counts().unwrap().history, 0);
    }
}
