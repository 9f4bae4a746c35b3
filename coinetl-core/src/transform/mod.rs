//! Snapshot transformation: raw payloads of one complete round into three
//! tabular row-sets (snapshots, reference, history).

pub mod processed_store;
pub mod reshape;
pub mod transformer;

pub use processed_store::{
    ProcessedPointer, ProcessedStore, ProcessedTables, COINS_FILE, LATEST_PROCESSED_FILE,
};
pub use reshape::{filter_listing, history_rows, merge_reference, reference_rows, snapshot_rows};
pub use transformer::{SnapshotTransformer, TransformOutput};

use crate::artifact::ArtifactError;
use crate::domain::ManifestError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a transform. No processed artifact is published when
/// one of these is returned.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("no complete extraction round found")]
    NoRounds,

    #[error("no manifest for snapshot {snapshot_id}")]
    UnknownSnapshot { snapshot_id: String },

    #[error("raw payload referenced by the manifest is missing: {path}")]
    MissingRawFile { path: PathBuf },

    #[error("invalid manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error("coin '{coin_id}' is selected by the manifest but absent from its listing")]
    MissingListingEntry { coin_id: String },

    #[error("malformed payload {file}: {reason}")]
    MalformedPayload { file: String, reason: String },

    #[error("artifact error: {0}")]
    Artifact(ArtifactError),
}

impl From<ArtifactError> for TransformError {
    fn from(e: ArtifactError) -> Self {
        match e {
            ArtifactError::NotFound { path } => TransformError::MissingRawFile { path },
            other => TransformError::Artifact(other),
        }
    }
}
