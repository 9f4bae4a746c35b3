//! Progress callbacks for an extraction round.

use crate::domain::SnapshotManifest;
use tracing::info;

/// Progress callback for the per-coin loop of an extraction round.
pub trait ExtractProgress {
    /// Called once the listing is persisted and the top-N set is frozen.
    fn on_selection(&self, listing_len: usize, selected: &[String]);

    /// Called when starting to fetch a coin's series.
    fn on_coin_start(&self, coin_id: &str, index: usize, total: usize);

    /// Called after a coin's series is persisted.
    fn on_coin_complete(&self, coin_id: &str, index: usize, total: usize, file: &str);

    /// Called after the manifest is written.
    fn on_round_complete(&self, manifest: &SnapshotManifest);
}

/// Progress reporter that logs through `tracing`.
pub struct LogProgress;

impl ExtractProgress for LogProgress {
    fn on_selection(&self, listing_len: usize, selected: &[String]) {
        info!(
            "listing has {listing_len} coins, selected top {}: {}",
            selected.len(),
            selected.join(", ")
        );
    }

    fn on_coin_start(&self, coin_id: &str, index: usize, total: usize) {
        info!("[{}/{}] fetching {coin_id} history", index + 1, total);
    }

    fn on_coin_complete(&self, coin_id: &str, _index: usize, _total: usize, file: &str) {
        info!("saved {coin_id} history to {file}");
    }

    fn on_round_complete(&self, manifest: &SnapshotManifest) {
        info!(
            snapshot_id = %manifest.snapshot_id,
            files = manifest.files.len(),
            "extraction round complete"
        );
    }
}

/// Progress reporter that does nothing.
pub struct NoProgress;

impl ExtractProgress for NoProgress {
    fn on_selection(&self, _listing_len: usize, _selected: &[String]) {}
    fn on_coin_start(&self, _coin_id: &str, _index: usize, _total: usize) {}
    fn on_coin_complete(&self, _coin_id: &str, _index: usize, _total: usize, _file: &str) {}
    fn on_round_complete(&self, _manifest: &SnapshotManifest) {}
}
