//! Snapshot manifest — the record that makes an extraction round complete.
//!
//! A manifest is written last, after every raw payload of the round is on
//! disk. Rounds without a manifest are invisible to later stages.

use super::ids::SnapshotId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Content tag of a raw payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawKind {
    /// Ranked coin listing (`/coins/markets`).
    CoinsMarkets,
    /// Per-coin historical series (`/coins/{id}/market_chart`).
    MarketChart,
}

impl RawKind {
    /// Tag embedded in the raw file name.
    pub fn tag(&self, coin_id: Option<&str>) -> String {
        match (self, coin_id) {
            (RawKind::CoinsMarkets, _) => "coins_markets".to_string(),
            (RawKind::MarketChart, Some(coin)) => format!("{coin}_market_chart"),
            (RawKind::MarketChart, None) => "market_chart".to_string(),
        }
    }
}

/// Reference to one raw payload belonging to a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFileRef {
    /// File name relative to the raw directory.
    pub file: String,
    pub kind: RawKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coin_id: Option<String>,
    /// BLAKE3 hex digest of the bytes written.
    pub blake3: String,
}

/// Structural problems with a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("manifest {snapshot_id} lists {count} coins_markets files (expected exactly 1)")]
    ListingCount { snapshot_id: String, count: usize },

    #[error("manifest {snapshot_id} has no market_chart file for coin '{coin_id}'")]
    MissingChart { snapshot_id: String, coin_id: String },

    #[error("manifest {snapshot_id} has {count} market_chart files for coin '{coin_id}'")]
    DuplicateChart {
        snapshot_id: String,
        coin_id: String,
        count: usize,
    },

    #[error("manifest {snapshot_id} has a market_chart file for unselected coin '{coin_id}'")]
    UnexpectedChart { snapshot_id: String, coin_id: String },

    #[error("manifest {snapshot_id} selects coin '{coin_id}' twice")]
    DuplicateCoin { snapshot_id: String, coin_id: String },

    #[error("manifest {snapshot_id} selects no coins")]
    NoCoins { snapshot_id: String },
}

/// Metadata record of one extraction round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub snapshot_id: SnapshotId,
    pub started_at: DateTime<Utc>,
    pub vs_currency: String,
    pub history_days: u32,
    /// Selected coins, in rank order.
    pub coins: Vec<String>,
    pub files: Vec<RawFileRef>,
}

impl SnapshotManifest {
    /// Check the manifest invariants: one listing, one chart per selected coin,
    /// no charts for other coins, no duplicate coins.
    pub fn validate(&self) -> Result<(), ManifestError> {
        let sid = self.snapshot_id.to_string();

        if self.coins.is_empty() {
            return Err(ManifestError::NoCoins { snapshot_id: sid });
        }

        let mut seen = HashSet::new();
        for coin in &self.coins {
            if !seen.insert(coin.as_str()) {
                return Err(ManifestError::DuplicateCoin {
                    snapshot_id: sid,
                    coin_id: coin.clone(),
                });
            }
        }

        self.listing_file()?;

        for file in self.files.iter().filter(|f| f.kind == RawKind::MarketChart) {
            let coin = file.coin_id.as_deref().unwrap_or_default();
            if !seen.contains(coin) {
                return Err(ManifestError::UnexpectedChart {
                    snapshot_id: sid,
                    coin_id: coin.to_string(),
                });
            }
        }
        for coin in &self.coins {
            self.chart_file(coin)?;
        }
        Ok(())
    }

    /// The single ranking-listing payload of the round.
    pub fn listing_file(&self) -> Result<&RawFileRef, ManifestError> {
        let mut listings = self.files.iter().filter(|f| f.kind == RawKind::CoinsMarkets);
        match (listings.next(), listings.next()) {
            (Some(file), None) => Ok(file),
            _ => Err(ManifestError::ListingCount {
                snapshot_id: self.snapshot_id.to_string(),
                count: self
                    .files
                    .iter()
                    .filter(|f| f.kind == RawKind::CoinsMarkets)
                    .count(),
            }),
        }
    }

    /// The single time-series payload for `coin_id`.
    pub fn chart_file(&self, coin_id: &str) -> Result<&RawFileRef, ManifestError> {
        let charts: Vec<&RawFileRef> = self
            .files
            .iter()
            .filter(|f| f.kind == RawKind::MarketChart && f.coin_id.as_deref() == Some(coin_id))
            .collect();
        match charts.as_slice() {
            [file] => Ok(file),
            [] => Err(ManifestError::MissingChart {
                snapshot_id: self.snapshot_id.to_string(),
                coin_id: coin_id.to_string(),
            }),
            many => Err(ManifestError::DuplicateChart {
                snapshot_id: self.snapshot_id.to_string(),
                coin_id: coin_id.to_string(),
                count: many.len(),
            }),
        }
    }
}
