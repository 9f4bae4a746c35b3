//! Persistent relational store for the three pipeline tables.
//!
//! - `coins` keyed by `coin_id`
//! - `market_snapshots` keyed by (`snapshot_id`, `coin_id`)
//! - `market_history` keyed by (`coin_id`, `ts`)
//!
//! Snapshot and history rows reference `coins`. Every insert method is one
//! atomic write: either all its rows land or none do.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::domain::{CoinRow, MarketHistoryRow, MarketSnapshotRow, SnapshotId, SnapshotIdError};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Errors from a [`MarketStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("cannot create store directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{table} row references unknown coin '{coin_id}'")]
    UnknownCoin { table: &'static str, coin_id: String },

    #[error("stored timestamp {ms} for coin '{coin_id}' is out of range")]
    InvalidTimestamp { coin_id: String, ms: i64 },

    #[error("stored snapshot id is invalid: {0}")]
    InvalidSnapshotId(#[from] SnapshotIdError),
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub coins: usize,
    pub snapshots: usize,
    pub history: usize,
}

/// One stored history price, as read back for analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub coin_id: String,
    pub ts: DateTime<Utc>,
    pub price: f64,
}

/// Storage backend for the loader.
///
/// Inserts never overwrite: a row whose key is already present is skipped and
/// not counted. Each insert call returns the number of rows actually written.
pub trait MarketStore {
    /// Insert reference rows whose `coin_id` is not yet stored.
    fn insert_coins(&mut self, rows: &[CoinRow]) -> Result<usize, StoreError>;

    /// Whether any snapshot row with this id is stored.
    fn snapshot_exists(&self, snapshot_id: &SnapshotId) -> Result<bool, StoreError>;

    fn insert_snapshot_rows(&mut self, rows: &[MarketSnapshotRow]) -> Result<usize, StoreError>;

    /// Latest stored history timestamp for a coin, `None` if it has no history.
    fn max_history_ts(&self, coin_id: &str) -> Result<Option<DateTime<Utc>>, StoreError>;

    fn insert_history_rows(&mut self, rows: &[MarketHistoryRow]) -> Result<usize, StoreError>;

    /// Stored history timestamps for a coin, ascending.
    fn history_timestamps(&self, coin_id: &str) -> Result<Vec<DateTime<Utc>>, StoreError>;

    /// Every stored history row with a price, ordered by coin then `ts`.
    fn price_points(&self) -> Result<Vec<PricePoint>, StoreError>;

    /// Greatest stored snapshot id.
    fn latest_snapshot_id(&self) -> Result<Option<SnapshotId>, StoreError>;

    fn row_counts(&self) -> Result<RowCounts, StoreError>;
}

pub(crate) fn ts_from_millis(coin_id: &str, ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| StoreError::InvalidTimestamp {
        coin_id: coin_id.to_string(),
        ms,
    })
}
