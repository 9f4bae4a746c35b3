//! Snapshot transformer — one manifest in, three row-sets out.

use super::processed_store::{ProcessedPointer, ProcessedStore};
use super::reshape::{filter_listing, history_rows, merge_reference, reference_rows, snapshot_rows};
use super::TransformError;
use crate::artifact::ArtifactError;
use crate::data::coingecko::{MarketChart, MarketListing};
use crate::domain::{CoinRow, MarketHistoryRow, MarketSnapshotRow, SnapshotId, SnapshotManifest};
use crate::extract::RawArtifactStore;
use tracing::info;

/// Row-sets produced for one snapshot, plus the pointer that publishes them.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    pub snapshot_id: SnapshotId,
    /// Full reference table after the merge, sorted by `coin_id`.
    pub coins: Vec<CoinRow>,
    pub snapshots: Vec<MarketSnapshotRow>,
    pub history: Vec<MarketHistoryRow>,
    pub pointer: ProcessedPointer,
}

/// Reads complete rounds from the raw store and publishes processed row-sets.
#[derive(Debug, Clone)]
pub struct SnapshotTransformer {
    raw: RawArtifactStore,
    processed: ProcessedStore,
}

impl SnapshotTransformer {
    pub fn new(raw: RawArtifactStore, processed: ProcessedStore) -> Self {
        Self { raw, processed }
    }

    pub fn processed_store(&self) -> &ProcessedStore {
        &self.processed
    }

    /// Transform the round named by the raw store's latest pointer.
    pub fn transform_latest(&self) -> Result<TransformOutput, TransformError> {
        let manifest = self.raw.latest_manifest()?.ok_or(TransformError::NoRounds)?;
        self.transform(&manifest)
    }

    /// Transform a specific round by snapshot id.
    pub fn transform_snapshot(&self, snapshot_id: &SnapshotId) -> Result<TransformOutput, TransformError> {
        let manifest = match self.raw.read_manifest(snapshot_id) {
            Ok(manifest) => manifest,
            Err(ArtifactError::NotFound { .. }) => {
                return Err(TransformError::UnknownSnapshot {
                    snapshot_id: snapshot_id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        self.transform(&manifest)
    }

    /// Transform one manifest. Only files the manifest lists are read; every
    /// row-set is built before anything is written.
    pub fn transform(&self, manifest: &SnapshotManifest) -> Result<TransformOutput, TransformError> {
        manifest.validate()?;
        let snapshot_id = &manifest.snapshot_id;

        let listing: Vec<MarketListing> = self.raw.read_payload(manifest.listing_file()?)?;
        let selected = filter_listing(&listing, &manifest.coins)?;

        let snapshots = snapshot_rows(snapshot_id, &selected);
        let coins = merge_reference(self.processed.read_reference()?, reference_rows(&selected));

        let mut history = Vec::new();
        for coin_id in &manifest.coins {
            let file = manifest.chart_file(coin_id)?;
            let chart: MarketChart = self.raw.read_payload(file)?;
            history.extend(history_rows(snapshot_id, coin_id, &file.file, &chart)?);
        }

        let pointer = self
            .processed
            .write_snapshot(snapshot_id, &coins, &snapshots, &history)?;

        info!(
            snapshot_id = %snapshot_id,
            snapshots = snapshots.len(),
            coins = coins.len(),
            history = history.len(),
            "transform complete"
        );

        Ok(TransformOutput {
            snapshot_id: snapshot_id.clone(),
            coins,
            snapshots,
            history,
            pointer,
        })
    }
}
