//! Relational row types produced by the transformer and consumed by the loader.
//!
//! Field order is the column order of the processed CSV artifacts.

use super::ids::SnapshotId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference metadata for one coin. Keyed by `coin_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinRow {
    pub coin_id: String,
    pub symbol: String,
    pub name: String,
}

/// Point-in-time ranking record. Keyed by (`snapshot_id`, `coin_id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshotRow {
    pub snapshot_id: SnapshotId,
    pub coin_id: String,
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume_24h: Option<f64>,
    pub rank: Option<u32>,
    /// Source-reported update time.
    pub last_updated: Option<DateTime<Utc>>,
}

/// One observed price point. Keyed by (`coin_id`, `ts`); `snapshot_id` is provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketHistoryRow {
    pub coin_id: String,
    pub ts: DateTime<Utc>,
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume_24h: Option<f64>,
    pub snapshot_id: SnapshotId,
}
