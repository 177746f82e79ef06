//! Snapshot persistence: matrix, ANN index, id map, and token cache as one
//! versioned unit.
//!
//! The manifest is written last and is the commit point: no manifest means
//! no snapshot, whatever partial files exist. The matrix checksum catches
//! mixed-generation directories before they can silently mis-rank results.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use quarry_core::constants::{INDEX_FILE, MANIFEST_FILE, MATRIX_FILE, SNAPSHOT_FORMAT_VERSION};
use quarry_core::errors::{IndexError, QuarryResult};

use crate::ivf::IvfIndex;
use crate::matrix::EmbeddingMatrix;

/// Engine lifecycle with respect to persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    /// No snapshot built or loaded; queries report the index unavailable.
    Empty,
    /// Ingestion in progress; persisted files may be partial.
    Building,
    /// A complete snapshot is in memory and on disk.
    Ready,
}

/// The JSON manifest referencing the binary artifacts of one ingestion.
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub dims: usize,
    pub rows: usize,
    /// Position i holds the id under which matrix row i was indexed.
    pub id_map: Vec<i64>,
    /// Canonical id -> token sequence behind that id's embedding.
    pub token_cache: BTreeMap<i64, Vec<u32>>,
    /// blake3 hex digest of the matrix file.
    pub matrix_checksum: String,
}

/// A fully reloaded snapshot.
#[derive(Debug)]
pub struct IndexSnapshot {
    pub matrix: EmbeddingMatrix,
    pub index: IvfIndex,
    pub id_map: Vec<i64>,
    pub token_cache: BTreeMap<i64, Vec<u32>>,
}

/// The cache holds exactly one entry per indexed id.
fn cache_covers_id_map(id_map: &[i64], token_cache: &BTreeMap<i64, Vec<u32>>) -> bool {
    id_map.len() == token_cache.len() && id_map.iter().all(|id| token_cache.contains_key(id))
}

/// Write the manifest for already-persisted matrix and index files.
///
/// Refuses to commit a cache whose key set diverges from the id map; the
/// two always describe the same ingestion run.
pub fn commit_manifest(
    dir: &Path,
    id_map: &[i64],
    token_cache: &BTreeMap<i64, Vec<u32>>,
    dims: usize,
) -> QuarryResult<()> {
    if !cache_covers_id_map(id_map, token_cache) {
        return Err(IndexError::CorruptSnapshot {
            details: "token cache keys do not match the id map".to_string(),
        }
        .into());
    }
    let matrix_bytes = std::fs::read(dir.join(MATRIX_FILE))?;
    let manifest = SnapshotManifest {
        format_version: SNAPSHOT_FORMAT_VERSION,
        created_at: Utc::now(),
        dims,
        rows: id_map.len(),
        id_map: id_map.to_vec(),
        token_cache: token_cache.clone(),
        matrix_checksum: blake3::hash(&matrix_bytes).to_hex().to_string(),
    };
    let json = serde_json::to_vec_pretty(&manifest)?;
    std::fs::write(dir.join(MANIFEST_FILE), json)?;
    info!(rows = manifest.rows, dims, "snapshot manifest committed");
    Ok(())
}

/// Load the snapshot under `dir`, if one was committed.
///
/// `Ok(None)` means no manifest exists; the caller treats the index as
/// "not yet built", not as empty.
pub fn load(dir: &Path) -> QuarryResult<Option<IndexSnapshot>> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Ok(None);
    }
    let manifest: SnapshotManifest =
        serde_json::from_slice(&std::fs::read(&manifest_path)?)?;
    if manifest.format_version != SNAPSHOT_FORMAT_VERSION {
        warn!(
            found = manifest.format_version,
            expected = SNAPSHOT_FORMAT_VERSION,
            "snapshot format version mismatch"
        );
        return Err(IndexError::CorruptSnapshot {
            details: format!("unsupported format version {}", manifest.format_version),
        }
        .into());
    }
    if !cache_covers_id_map(&manifest.id_map, &manifest.token_cache) {
        return Err(IndexError::CorruptSnapshot {
            details: "token cache keys do not match the id map".to_string(),
        }
        .into());
    }

    let matrix_path = dir.join(MATRIX_FILE);
    let matrix_bytes = std::fs::read(&matrix_path)?;
    let checksum = blake3::hash(&matrix_bytes).to_hex().to_string();
    if checksum != manifest.matrix_checksum {
        return Err(IndexError::CorruptSnapshot {
            details: format!(
                "matrix checksum mismatch: manifest {}, file {checksum}",
                manifest.matrix_checksum
            ),
        }
        .into());
    }

    let matrix = EmbeddingMatrix::read(&matrix_path)?;
    if matrix.len() != manifest.rows || matrix.dims() != manifest.dims {
        return Err(IndexError::CorruptSnapshot {
            details: format!(
                "matrix shape {}x{} does not match manifest {}x{}",
                matrix.len(),
                matrix.dims(),
                manifest.rows,
                manifest.dims
            ),
        }
        .into());
    }

    let index = IvfIndex::read(&dir.join(INDEX_FILE))?;
    info!(rows = manifest.rows, "snapshot reloaded");
    Ok(Some(IndexSnapshot {
        matrix,
        index,
        id_map: manifest.id_map,
        token_cache: manifest.token_cache,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_for(ids: &[i64]) -> BTreeMap<i64, Vec<u32>> {
        ids.iter().map(|&id| (id, vec![id as u32])).collect()
    }

    fn write_artifacts(dir: &Path) {
        let mut matrix = EmbeddingMatrix::new(2);
        for _ in 0..2 {
            matrix.push(vec![0.6, 0.8]).unwrap();
        }
        matrix.write(&dir.join(MATRIX_FILE)).unwrap();

        let mut index = IvfIndex::new(2, 1);
        index.train(&matrix).unwrap();
        index.add_with_ids(&matrix, &[1, 2]).unwrap();
        index.write(&dir.join(INDEX_FILE)).unwrap();
    }

    #[test]
    fn load_without_manifest_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn tampered_matrix_fails_checksum() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path());
        commit_manifest(dir.path(), &[1, 2], &cache_for(&[1, 2]), 2).unwrap();

        // Overwrite the matrix after the manifest was committed.
        let mut other = EmbeddingMatrix::new(2);
        other.push(vec![1.0, 0.0]).unwrap();
        other.push(vec![0.0, 1.0]).unwrap();
        other.write(&dir.path().join(MATRIX_FILE)).unwrap();

        let err = load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn commit_rejects_cache_not_matching_id_map() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path());

        let err = commit_manifest(dir.path(), &[1, 2], &cache_for(&[1, 99]), 2).unwrap_err();
        assert!(err.to_string().contains("id map"));
        assert!(!dir.path().join(MANIFEST_FILE).exists());
    }

    #[test]
    fn load_rejects_cache_that_skips_indexed_ids() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path());

        // Hand-written manifest whose cache misses id 2.
        let matrix_bytes = std::fs::read(dir.path().join(MATRIX_FILE)).unwrap();
        let manifest = SnapshotManifest {
            format_version: SNAPSHOT_FORMAT_VERSION,
            created_at: Utc::now(),
            dims: 2,
            rows: 2,
            id_map: vec![1, 2],
            token_cache: cache_for(&[1]),
            matrix_checksum: blake3::hash(&matrix_bytes).to_hex().to_string(),
        };
        let json = serde_json::to_vec_pretty(&manifest).unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), json).unwrap();

        let err = load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("id map"));
    }
}
