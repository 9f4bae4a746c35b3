//! Snapshot extractor — one complete extraction round.
//!
//! listing → top-N selection → per-coin history → manifest → latest pointer.
//! Any failure aborts the round before the manifest is written, so a partial
//! round leaves only orphan payloads that no later stage will ever read.

use super::progress::{ExtractProgress, LogProgress};
use super::raw_store::{LatestRound, RawArtifactStore};
use crate::artifact::ArtifactError;
use crate::data::coingecko::{distinct_coins, is_coin_slug, select_top_n, MarketListing};
use crate::data::provider::{FetchError, MarketDataSource, Sleeper, ThreadSleeper};
use crate::domain::{RawKind, SnapshotId, SnapshotManifest};
use chrono::Utc;
use std::time::Duration;
use thiserror::Error;

/// Errors that abort an extraction round.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("malformed coin listing: {0}")]
    MalformedListing(String),

    #[error("listing has {available} distinct coins, cannot select top {wanted}")]
    ListingTooShort { wanted: usize, available: usize },
}

/// Round-shape settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractSettings {
    /// Size of the frozen coin set per round.
    pub top_n: usize,
    /// Pause between successive per-coin requests.
    pub pause_between_coins: Duration,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            top_n: 5,
            pause_between_coins: Duration::from_secs(1),
        }
    }
}

/// Runs extraction rounds against a [`MarketDataSource`].
pub struct SnapshotExtractor<D, S = ThreadSleeper> {
    source: D,
    raw: RawArtifactStore,
    settings: ExtractSettings,
    sleeper: S,
}

impl<D: MarketDataSource> SnapshotExtractor<D, ThreadSleeper> {
    pub fn new(source: D, raw: RawArtifactStore, settings: ExtractSettings) -> Self {
        Self::with_sleeper(source, raw, settings, ThreadSleeper)
    }
}

impl<D: MarketDataSource, S: Sleeper> SnapshotExtractor<D, S> {
    pub fn with_sleeper(source: D, raw: RawArtifactStore, settings: ExtractSettings, sleeper: S) -> Self {
        Self {
            source,
            raw,
            settings,
            sleeper,
        }
    }

    pub fn raw_store(&self) -> &RawArtifactStore {
        &self.raw
    }

    /// Run one round, logging progress through `tracing`.
    pub fn run(&self) -> Result<SnapshotManifest, ExtractError> {
        self.run_with_progress(&LogProgress)
    }

    /// Run one round and return its manifest.
    pub fn run_with_progress(
        &self,
        progress: &dyn ExtractProgress,
    ) -> Result<SnapshotManifest, ExtractError> {
        let started_at = Utc::now();
        let floor = self.raw.read_latest()?.map(|latest| latest.snapshot_id);
        let snapshot_id = SnapshotId::generate(started_at, floor.as_ref());

        let listing = self.source.coins_markets()?;
        let listing_file =
            self.raw
                .write_payload(&snapshot_id, Utc::now(), RawKind::CoinsMarkets, None, &listing)?;

        let parsed: Vec<MarketListing> = serde_json::from_value(listing)
            .map_err(|e| ExtractError::MalformedListing(e.to_string()))?;
        let coins = select_top_n(&parsed, self.settings.top_n).ok_or_else(|| {
            ExtractError::ListingTooShort {
                wanted: self.settings.top_n,
                available: distinct_coins(&parsed),
            }
        })?;
        if let Some(bad) = coins.iter().find(|id| !is_coin_slug(id)) {
            return Err(ExtractError::MalformedListing(format!(
                "coin id {bad:?} is not a plain slug"
            )));
        }
        progress.on_selection(parsed.len(), &coins);

        let mut files = Vec::with_capacity(coins.len() + 1);
        files.push(listing_file);

        let total = coins.len();
        for (i, coin_id) in coins.iter().enumerate() {
            if i > 0 && !self.settings.pause_between_coins.is_zero() {
                self.sleeper.sleep(self.settings.pause_between_coins);
            }
            progress.on_coin_start(coin_id, i, total);

            let chart = self.source.market_chart(coin_id)?;
            let file = self.raw.write_payload(
                &snapshot_id,
                Utc::now(),
                RawKind::MarketChart,
                Some(coin_id),
                &chart,
            )?;
            progress.on_coin_complete(coin_id, i, total, &file.file);
            files.push(file);
        }

        let manifest = SnapshotManifest {
            snapshot_id: snapshot_id.clone(),
            started_at,
            vs_currency: self.source.vs_currency().to_string(),
            history_days: self.source.history_days(),
            coins,
            files,
        };
        let manifest_path = self.raw.write_manifest(&manifest)?;
        self.raw.write_latest(&LatestRound {
            snapshot_id,
            manifest: RawArtifactStore::manifest_file_name(&manifest.snapshot_id),
            completed_at: Utc::now(),
        })?;

        tracing::debug!(path = %manifest_path.display(), "manifest written");
        progress.on_round_complete(&manifest);
        Ok(manifest)
    }
}
