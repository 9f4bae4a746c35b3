//! Per-coin price statistics over the stored history.
//!
//! Spread figures use the sample variance (n - 1). A coin with a single
//! observation has no variance, and a zero minimum price has no growth.

use crate::artifact::{self, ArtifactError};
use crate::store::{MarketStore, PricePoint, StoreError};
use crate::transform::processed_store::to_csv;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Descriptive statistics for one coin's stored prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinSummary {
    pub coin_id: String,
    pub observations: usize,
    pub avg_price: f64,
    pub variance: Option<f64>,
    pub stddev: Option<f64>,
    pub min_price: f64,
    pub max_price: f64,
    /// `(max - min) / min` as a percentage.
    pub pct_growth: Option<f64>,
    /// Coefficient of variation as a percentage.
    pub rel_volatility_pct: Option<f64>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CoinSummary {
    fn from_points(coin_id: &str, points: &[&PricePoint]) -> Option<Self> {
        let first = points.first()?;
        let n = points.len();
        let mean = points.iter().map(|p| p.price).sum::<f64>() / n as f64;

        let variance = (n > 1).then(|| {
            points.iter().map(|p| (p.price - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        });
        let stddev = variance.map(f64::sqrt);

        let (mut min, mut max) = (first.price, first.price);
        let (mut start, mut end) = (first.ts, first.ts);
        for p in points {
            min = min.min(p.price);
            max = max.max(p.price);
            start = start.min(p.ts);
            end = end.max(p.ts);
        }

        Some(Self {
            coin_id: coin_id.to_string(),
            observations: n,
            avg_price: mean,
            variance,
            stddev,
            min_price: min,
            max_price: max,
            pct_growth: (min != 0.0).then(|| (max - min) / min * 100.0),
            rel_volatility_pct: stddev.filter(|_| mean != 0.0).map(|sd| sd / mean * 100.0),
            start,
            end,
        })
    }
}

/// Summaries per coin, ordered by `coin_id`.
pub fn summarize(points: &[PricePoint]) -> Vec<CoinSummary> {
    let mut by_coin: BTreeMap<&str, Vec<&PricePoint>> = BTreeMap::new();
    for point in points {
        by_coin.entry(point.coin_id.as_str()).or_default().push(point);
    }
    by_coin
        .into_iter()
        .filter_map(|(coin_id, points)| CoinSummary::from_points(coin_id, &points))
        .collect()
}

pub fn summarize_store(store: &dyn MarketStore) -> Result<Vec<CoinSummary>, StoreError> {
    let points = store.price_points()?;
    tracing::debug!(points = points.len(), "summarizing stored history");
    Ok(summarize(&points))
}

/// Write summaries as CSV, replacing any previous file.
pub fn write_summary_csv(path: &Path, summaries: &[CoinSummary]) -> Result<(), ArtifactError> {
    let bytes = to_csv(path, summaries)?;
    artifact::write_atomic(path, &bytes)
}
