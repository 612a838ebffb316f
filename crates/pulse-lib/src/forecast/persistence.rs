//! On-disk layout for backend artifacts
//!
//! Every backend writes suffixed JSON files next to a shared path prefix,
//! e.g. `models/sequence_model_metadata.json`.

use super::ForecastError;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// `<prefix>_<suffix>`
pub fn artifact_path(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = prefix.as_os_str().to_os_string();
    name.push("_");
    name.push(suffix);
    PathBuf::from(name)
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn io_error(path: &Path, source: std::io::Error) -> ForecastError {
    ForecastError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Serialize `value` to `path`, creating parent directories; returns the checksum
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<String, ForecastError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| ForecastError::Serialization {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }

    let mut file = File::create(path).map_err(|e| io_error(path, e))?;
    file.write_all(&bytes).map_err(|e| io_error(path, e))?;
    file.sync_all().map_err(|e| io_error(path, e))?;

    Ok(compute_checksum(&bytes))
}

/// Read and deserialize `path`, verifying its checksum when one is given
pub(crate) fn read_json<T: DeserializeOwned>(
    path: &Path,
    expected_checksum: Option<&str>,
) -> Result<T, ForecastError> {
    let bytes = fs::read(path).map_err(|e| io_error(path, e))?;

    if let Some(expected) = expected_checksum {
        let actual = compute_checksum(&bytes);
        if actual != expected {
            return Err(ForecastError::ChecksumMismatch {
                path: path.to_path_buf(),
                expected: expected.to_string(),
                actual,
            });
        }
    }

    serde_json::from_slice(&bytes).map_err(|source| ForecastError::Serialization {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_path_appends_suffix() {
        let path = artifact_path(Path::new("/var/models/sequence_model"), "metadata.json");
        assert_eq!(path, PathBuf::from("/var/models/sequence_model_metadata.json"));
    }

    #[test]
    fn test_checksum_detects_tampering() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("weights.json");

        let checksum = write_json(&path, &vec![1.0, 2.0, 3.0]).unwrap();
        let restored: Vec<f64> = read_json(&path, Some(&checksum)).unwrap();
        assert_eq!(restored, vec![1.0, 2.0, 3.0]);

        fs::write(&path, b"[1.0, 2.0, 4.0]").unwrap();
        let err = read_json::<Vec<f64>>(&path, Some(&checksum)).unwrap_err();
        assert!(matches!(err, ForecastError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = read_json::<Vec<f64>>(&dir.path().join("absent.json"), None).unwrap_err();
        assert!(matches!(err, ForecastError::Io { .. }));
    }
}
