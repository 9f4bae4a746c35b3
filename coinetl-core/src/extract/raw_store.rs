//! Raw artifact store: write-once JSON payloads, manifests, and the
//! latest-round pointer.
//!
//! Layout under the raw directory:
//! - `{snapshot_id}_{fetched_at}_{tag}.json`: one payload per request
//! - `snapshot_{snapshot_id}.json`: the round's manifest
//! - `latest_round.json`: pointer to the most recent complete round

use crate::artifact::{self, ArtifactError};
use crate::domain::{RawFileRef, RawKind, SnapshotId, SnapshotManifest};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// File name of the latest-round pointer.
pub const LATEST_ROUND_FILE: &str = "latest_round.json";

/// chrono format of the fetch timestamp embedded in payload names.
const FETCHED_AT_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Pointer to the most recent complete extraction round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestRound {
    pub snapshot_id: SnapshotId,
    /// Manifest file name relative to the raw directory.
    pub manifest: String,
    pub completed_at: DateTime<Utc>,
}

/// Filesystem store for raw extraction artifacts.
#[derive(Debug, Clone)]
pub struct RawArtifactStore {
    dir: PathBuf,
}

impl RawArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{snapshot_id}_{fetched_at}_{tag}.json`
    pub fn payload_file_name(
        snapshot_id: &SnapshotId,
        fetched_at: DateTime<Utc>,
        kind: RawKind,
        coin_id: Option<&str>,
    ) -> String {
        format!(
            "{snapshot_id}_{}_{}.json",
            fetched_at.format(FETCHED_AT_FORMAT),
            kind.tag(coin_id)
        )
    }

    /// `snapshot_{snapshot_id}.json`
    pub fn manifest_file_name(snapshot_id: &SnapshotId) -> String {
        format!("snapshot_{snapshot_id}.json")
    }

    /// Persist one raw payload and return its manifest entry.
    pub fn write_payload(
        &self,
        snapshot_id: &SnapshotId,
        fetched_at: DateTime<Utc>,
        kind: RawKind,
        coin_id: Option<&str>,
        payload: &Value,
    ) -> Result<RawFileRef, ArtifactError> {
        let file = Self::payload_file_name(snapshot_id, fetched_at, kind, coin_id);
        let bytes = artifact::write_json_pretty(&self.dir.join(&file), payload)?;
        Ok(RawFileRef {
            file,
            kind,
            coin_id: coin_id.map(str::to_string),
            blake3: artifact::digest(&bytes),
        })
    }

    /// Decode a payload referenced by a manifest, verifying its digest.
    pub fn read_payload<T: DeserializeOwned>(&self, file: &RawFileRef) -> Result<T, ArtifactError> {
        let path = self.dir.join(&file.file);
        let bytes = artifact::read_verified(&path, &file.blake3)?;
        artifact::parse_json(&path, &bytes)
    }

    /// Write a manifest. Manifests are immutable: an existing one is never replaced.
    pub fn write_manifest(&self, manifest: &SnapshotManifest) -> Result<PathBuf, ArtifactError> {
        let path = self
            .dir
            .join(Self::manifest_file_name(&manifest.snapshot_id));
        if path.exists() {
            return Err(ArtifactError::AlreadyExists { path });
        }
        artifact::write_json_pretty(&path, manifest)?;
        Ok(path)
    }

    pub fn read_manifest(&self, snapshot_id: &SnapshotId) -> Result<SnapshotManifest, ArtifactError> {
        artifact::read_json(&self.dir.join(Self::manifest_file_name(snapshot_id)))
    }

    pub fn write_latest(&self, latest: &LatestRound) -> Result<(), ArtifactError> {
        artifact::write_json_pretty(&self.dir.join(LATEST_ROUND_FILE), latest)?;
        Ok(())
    }

    /// The latest complete round, if any round has completed.
    pub fn read_latest(&self) -> Result<Option<LatestRound>, ArtifactError> {
        artifact::read_json_opt(&self.dir.join(LATEST_ROUND_FILE))
    }

    /// Manifest of the latest complete round, if any.
    pub fn latest_manifest(&self) -> Result<Option<SnapshotManifest>, ArtifactError> {
        match self.read_latest()? {
            Some(latest) => artifact::read_json(&self.dir.join(&latest.manifest)).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sid() -> SnapshotId {
        SnapshotId::parse("20250924T131500000Z").unwrap()
    }

    #[test]
    fn payload_names_embed_snapshot_fetch_time_and_tag() {
        let fetched = Utc.with_ymd_and_hms(2025, 9, 24, 13, 15, 3).unwrap();
        assert_eq!(
            RawArtifactStore::payload_file_name(&sid(), fetched, RawKind::MarketChart, Some("bitcoin")),
            "20250924T131500000Z_20250924T131503Z_bitcoin_market_chart.json"
        );
        assert_eq!(
            RawArtifactStore::payload_file_name(&sid(), fetched, RawKind::CoinsMarkets, None),
            "20250924T131500000Z_20250924T131503Z_coins_markets.json"
        );
    }

    #[test]
    fn payload_roundtrip_verifies_digest() {
        let dir = tempfile::tempdir().unwrap();
        let store = RawArtifactStore::new(dir.path());
        let payload = serde_json::json!([{"id": "bitcoin"}]);

        let file = store
            .write_payload(&sid(), Utc::now(), RawKind::CoinsMarkets, None, &payload)
            .unwrap();
        let back: Value = store.read_payload(&file).unwrap();
        assert_eq!(back, payload);

        std::fs::write(dir.path().join(&file.file), "[]").unwrap();
        assert!(matches!(
            store.read_payload::<Value>(&file),
            Err(ArtifactError::DigestMismatch { .. })
        ));
    }

    #[test]
    fn manifest_is_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = RawArtifactStore::new(dir.path());
        let manifest = SnapshotManifest {
            snapshot_id: sid(),
            started_at: Utc::now(),
            vs_currency: "usd".into(),
            history_days: 60,
            coins: vec!["bitcoin".into()],
            files: vec![],
        };

        store.write_manifest(&manifest).unwrap();
        assert!(matches!(
            store.write_manifest(&manifest),
            Err(ArtifactError::AlreadyExists { .. })
        ));
        assert_eq!(store.read_manifest(&sid()).unwrap(), manifest);
    }

    #[test]
    fn latest_pointer_is_absent_until_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = RawArtifactStore::new(dir.path());
        assert!(store.read_latest().unwrap().is_none());
        assert!(store.latest_manifest().unwrap().is_none());
    }
}
