//! Incremental loader — merges one processed snapshot into the store.
//!
//! Three independent writes, in foreign-key order:
//! 1. reference rows, insert-if-absent
//! 2. snapshot rows, skipped entirely when the snapshot is already stored
//! 3. history rows newer than each coin's stored maximum `ts`
//!
//! A failure in a later write leaves earlier writes committed.

use crate::artifact::ArtifactError;
use crate::domain::{MarketHistoryRow, SnapshotId};
use crate::store::{MarketStore, StoreError};
use crate::transform::{ProcessedStore, ProcessedTables};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no processed snapshot to load")]
    NothingToLoad,

    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("writing {table} failed: {source}")]
    Store {
        table: &'static str,
        #[source]
        source: StoreError,
    },
}

fn in_table(table: &'static str) -> impl Fn(StoreError) -> LoadError {
    move |source| LoadError::Store { table, source }
}

/// Rows actually persisted by one load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub snapshot_id: Option<SnapshotId>,
    pub coins_inserted: usize,
    pub snapshot_rows_inserted: usize,
    /// The snapshot was already stored, so its rows were not written.
    pub snapshot_skipped: bool,
    pub history_inserted: usize,
    /// New history rows per coin, for every coin in the batch (zero included).
    pub history_by_coin: BTreeMap<String, usize>,
}

/// Distinct coin ids in order of first appearance.
pub fn coins_in_order(rows: &[MarketHistoryRow]) -> Vec<&str> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(|row| row.coin_id.as_str())
        .filter(|coin| seen.insert(*coin))
        .collect()
}

/// Rows of `coin_id` strictly newer than `watermark`, first occurrence of each
/// `ts` kept.
pub fn new_history_rows<'a>(
    rows: &'a [MarketHistoryRow],
    coin_id: &str,
    watermark: Option<DateTime<Utc>>,
) -> Vec<&'a MarketHistoryRow> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|row| row.coin_id == coin_id)
        .filter(|row| watermark.map_or(true, |max| row.ts > max))
        .filter(|row| seen.insert(row.ts))
        .collect()
}

/// Loads processed snapshots published by the transformer.
#[derive(Debug, Clone)]
pub struct IncrementalLoader {
    processed: ProcessedStore,
}

impl IncrementalLoader {
    pub fn new(processed: ProcessedStore) -> Self {
        Self { processed }
    }

    /// Load the snapshot named by `latest_processed.json`.
    pub fn load_latest(&self, store: &mut dyn MarketStore) -> Result<LoadReport, LoadError> {
        let tables = self.processed.read_latest()?.ok_or(LoadError::NothingToLoad)?;
        self.load(store, &tables)
    }

    pub fn load(
        &self,
        store: &mut dyn MarketStore,
        tables: &ProcessedTables,
    ) -> Result<LoadReport, LoadError> {
        let snapshot_id = &tables.snapshot_id;
        let mut report = LoadReport {
            snapshot_id: Some(snapshot_id.clone()),
            ..LoadReport::default()
        };

        report.coins_inserted = store.insert_coins(&tables.coins).map_err(in_table("coins"))?;
        info!(inserted = report.coins_inserted, "coins loaded");

        if store
            .snapshot_exists(snapshot_id)
            .map_err(in_table("market_snapshots"))?
        {
            report.snapshot_skipped = true;
            info!(snapshot_id = %snapshot_id, "snapshot already stored, skipping its rows");
        } else {
            report.snapshot_rows_inserted = store
                .insert_snapshot_rows(&tables.snapshots)
                .map_err(in_table("market_snapshots"))?;
            info!(inserted = report.snapshot_rows_inserted, "market snapshots loaded");
        }

        let mut batch = Vec::new();
        for coin_id in coins_in_order(&tables.history) {
            let watermark = store
                .max_history_ts(coin_id)
                .map_err(in_table("market_history"))?;
            let fresh = new_history_rows(&tables.history, coin_id, watermark);
            report.history_by_coin.insert(coin_id.to_string(), fresh.len());
            batch.extend(fresh.into_iter().cloned());
        }
        report.history_inserted = store
            .insert_history_rows(&batch)
            .map_err(in_table("market_history"))?;
        info!(inserted = report.history_inserted, "market history loaded");

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(coin_id: &str, ms: i64) -> MarketHistoryRow {
        MarketHistoryRow {
            coin_id: coin_id.into(),
            ts: Utc.timestamp_millis_opt(ms).unwrap(),
            price: Some(1.0),
            market_cap: None,
            volume_24h: None,
            snapshot_id: SnapshotId::parse("20250924T131500000Z").unwrap(),
        }
    }

    #[test]
    fn coins_keep_first_appearance_order() {
        let rows = vec![row("ethereum", 1), row("bitcoin", 1), row("ethereum", 2)];
        assert_eq!(coins_in_order(&rows), vec!["ethereum", "bitcoin"]);
    }

    #[test]
    fn only_rows_after_watermark_survive() {
        let rows: Vec<_> = (1..=10).map(|t| row("bitcoin", t)).collect();
        let watermark = Utc.timestamp_millis_opt(6).single();

        let fresh = new_history_rows(&rows, "bitcoin", watermark);

        let ts: Vec<i64> = fresh.iter().map(|r| r.ts.timestamp_millis()).collect();
        assert_eq!(ts, vec![7, 8, 9, 10]);
    }

    #[test]
    fn duplicate_timestamps_in_batch_collapse() {
        let rows = vec![row("bitcoin", 1), row("bitcoin", 1), row("bitcoin", 2)];
        assert_eq!(new_history_rows(&rows, "bitcoin", None).len(), 2);
    }
}
