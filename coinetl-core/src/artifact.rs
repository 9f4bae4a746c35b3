//! File helpers shared by the raw and processed artifact stores.
//!
//! - Atomic writes (write to .tmp, rename into place)
//! - BLAKE3 content digests recorded in manifests and pointers
//! - Typed JSON read/write with path-carrying errors

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reading or writing pipeline artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("artifact not found: {path}")]
    NotFound { path: PathBuf },

    #[error("refusing to overwrite immutable artifact: {path}")]
    AlreadyExists { path: PathBuf },

    #[error("invalid JSON in {path}: {reason}")]
    Json { path: PathBuf, reason: String },

    #[error("invalid CSV in {path}: {reason}")]
    Csv { path: PathBuf, reason: String },

    #[error("digest mismatch for {path}: manifest says {expected}, file has {actual}")]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

impl ArtifactError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            ArtifactError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// BLAKE3 hex digest of `bytes`.
pub fn digest(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Write `bytes` to `path` atomically: write a sibling `.tmp` file, then rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ArtifactError::io(parent, e))?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, bytes).map_err(|e| ArtifactError::io(&tmp_path, e))?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        ArtifactError::io(path, e)
    })
}

pub(crate) fn read_bytes(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    fs::read(path).map_err(|e| ArtifactError::io(path, e))
}

/// Read `path` and check it against an expected BLAKE3 digest.
pub(crate) fn read_verified(path: &Path, expected: &str) -> Result<Vec<u8>, ArtifactError> {
    let bytes = read_bytes(path)?;
    let actual = digest(&bytes);
    if actual != expected {
        return Err(ArtifactError::DigestMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(bytes)
}

pub(crate) fn parse_json<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T, ArtifactError> {
    serde_json::from_slice(bytes).map_err(|e| ArtifactError::Json {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = read_bytes(path)?;
    parse_json(path, &bytes)
}

/// Read a JSON file that may legitimately be absent.
pub(crate) fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ArtifactError> {
    match read_json(path) {
        Ok(value) => Ok(Some(value)),
        Err(ArtifactError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Serialize `value` as pretty JSON and write it atomically. Returns the bytes written.
pub(crate) fn write_json_pretty<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<Vec<u8>, ArtifactError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| ArtifactError::Json {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    write_atomic(path, &bytes)?;
    Ok(bytes)
}
