//! Processed artifact store: CSV row-sets keyed by snapshot id.
//!
//! Layout under the processed directory:
//! - `market_snapshots_{snapshot_id}.csv`
//! - `market_history_{snapshot_id}.csv`
//! - `coins.csv`: accumulating reference table, rewritten each round
//! - `latest_processed.json`: pointer read by the loader

use crate::artifact::{self, ArtifactError};
use crate::domain::{CoinRow, MarketHistoryRow, MarketSnapshotRow, SnapshotId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const COINS_FILE: &str = "coins.csv";
pub const LATEST_PROCESSED_FILE: &str = "latest_processed.json";

/// Pointer to the row-sets of the most recently transformed snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedPointer {
    pub snapshot_id: SnapshotId,
    pub snapshots_file: String,
    pub history_file: String,
    pub coins_file: String,
    pub snapshot_rows: usize,
    pub history_rows: usize,
    pub coin_rows: usize,
    pub snapshots_blake3: String,
    pub history_blake3: String,
    pub coins_blake3: String,
}

/// The three row-sets of one processed snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedTables {
    pub snapshot_id: SnapshotId,
    pub coins: Vec<CoinRow>,
    pub snapshots: Vec<MarketSnapshotRow>,
    pub history: Vec<MarketHistoryRow>,
}

/// Filesystem store for processed tabular artifacts.
#[derive(Debug, Clone)]
pub struct ProcessedStore {
    dir: PathBuf,
}

impl ProcessedStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshots_file_name(snapshot_id: &SnapshotId) -> String {
        format!("market_snapshots_{snapshot_id}.csv")
    }

    pub fn history_file_name(snapshot_id: &SnapshotId) -> String {
        format!("market_history_{snapshot_id}.csv")
    }

    /// The accumulated reference table; empty before the first round.
    pub fn read_reference(&self) -> Result<Vec<CoinRow>, ArtifactError> {
        let path = self.dir.join(COINS_FILE);
        match artifact::read_bytes(&path) {
            Ok(bytes) => from_csv(&path, &bytes),
            Err(ArtifactError::NotFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Write one snapshot's row-sets plus the merged reference table, then
    /// point `latest_processed.json` at them.
    pub fn write_snapshot(
        &self,
        snapshot_id: &SnapshotId,
        coins: &[CoinRow],
        snapshots: &[MarketSnapshotRow],
        history: &[MarketHistoryRow],
    ) -> Result<ProcessedPointer, ArtifactError> {
        let snapshots_file = Self::snapshots_file_name(snapshot_id);
        let history_file = Self::history_file_name(snapshot_id);

        let snapshots_bytes = self.write_csv(&snapshots_file, snapshots)?;
        let history_bytes = self.write_csv(&history_file, history)?;
        let coins_bytes = self.write_csv(COINS_FILE, coins)?;

        let pointer = ProcessedPointer {
            snapshot_id: snapshot_id.clone(),
            snapshots_file,
            history_file,
            coins_file: COINS_FILE.to_string(),
            snapshot_rows: snapshots.len(),
            history_rows: history.len(),
            coin_rows: coins.len(),
            snapshots_blake3: artifact::digest(&snapshots_bytes),
            history_blake3: artifact::digest(&history_bytes),
            coins_blake3: artifact::digest(&coins_bytes),
        };
        artifact::write_json_pretty(&self.dir.join(LATEST_PROCESSED_FILE), &pointer)?;
        Ok(pointer)
    }

    pub fn read_latest_pointer(&self) -> Result<Option<ProcessedPointer>, ArtifactError> {
        artifact::read_json_opt(&self.dir.join(LATEST_PROCESSED_FILE))
    }

    /// Read and digest-check the row-sets a pointer refers to.
    pub fn read_tables(&self, pointer: &ProcessedPointer) -> Result<ProcessedTables, ArtifactError> {
        Ok(ProcessedTables {
            snapshot_id: pointer.snapshot_id.clone(),
            coins: self.read_csv(&pointer.coins_file, &pointer.coins_blake3)?,
            snapshots: self.read_csv(&pointer.snapshots_file, &pointer.snapshots_blake3)?,
            history: self.read_csv(&pointer.history_file, &pointer.history_blake3)?,
        })
    }

    /// Row-sets of the most recently transformed snapshot, if any.
    pub fn read_latest(&self) -> Result<Option<ProcessedTables>, ArtifactError> {
        match self.read_latest_pointer()? {
            Some(pointer) => self.read_tables(&pointer).map(Some),
            None => Ok(None),
        }
    }

    fn write_csv<T: Serialize>(&self, file: &str, rows: &[T]) -> Result<Vec<u8>, ArtifactError> {
        let path = self.dir.join(file);
        let bytes = to_csv(&path, rows)?;
        artifact::write_atomic(&path, &bytes)?;
        Ok(bytes)
    }

    fn read_csv<T: DeserializeOwned>(&self, file: &str, blake3: &str) -> Result<Vec<T>, ArtifactError> {
        let path = self.dir.join(file);
        let bytes = artifact::read_verified(&path, blake3)?;
        from_csv(&path, &bytes)
    }
}

// ── CSV helpers ─────────────────────────────────────────────────────

fn csv_error(path: &Path, e: impl std::fmt::Display) -> ArtifactError {
    ArtifactError::Csv {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

pub(crate) fn to_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<Vec<u8>, ArtifactError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row).map_err(|e| csv_error(path, e))?;
    }
    wtr.into_inner().map_err(|e| csv_error(path, e))
}

fn from_csv<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<Vec<T>, ArtifactError> {
    csv::Reader::from_reader(bytes)
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| csv_error(path, e))
}
