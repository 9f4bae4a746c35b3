//! Extraction stage: raw payloads plus one manifest per round.

pub mod extractor;
pub mod progress;
pub mod raw_store;

pub use extractor::{ExtractError, ExtractSettings, SnapshotExtractor};
pub use progress::{ExtractProgress, LogProgress, NoProgress};
pub use raw_store::{LatestRound, RawArtifactStore, LATEST_ROUND_FILE};
