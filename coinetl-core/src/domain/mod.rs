//! Domain types shared by every stage.

pub mod ids;
pub mod manifest;
pub mod rows;

pub use ids::{SnapshotId, SnapshotIdError, SNAPSHOT_ID_FORMAT};
pub use manifest::{ManifestError, RawFileRef, RawKind, SnapshotManifest};
pub use rows::{CoinRow, MarketHistoryRow, MarketSnapshotRow};
