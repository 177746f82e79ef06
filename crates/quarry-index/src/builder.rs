//! Index builder: matrix persistence, quantizer training, id-tagged adds,
//! and the snapshot commit, in the order that keeps failures recoverable.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use quarry_core::constants::{INDEX_FILE, MATRIX_FILE};
use quarry_core::errors::QuarryResult;

use crate::ivf::IvfIndex;
use crate::matrix::EmbeddingMatrix;
use crate::snapshot;

/// Build and persist the ANN index for one ingestion run.
///
/// The matrix is persisted before quantizer training so a training failure
/// (too few vectors for `nlist`) still leaves the raw embeddings on disk
/// for recovery. The manifest is written only after every artifact exists;
/// until then the directory holds no committed snapshot.
pub fn build(
    matrix: &EmbeddingMatrix,
    id_map: &[i64],
    token_cache: &BTreeMap<i64, Vec<u32>>,
    dir: &Path,
    nlist: usize,
) -> QuarryResult<IvfIndex> {
    std::fs::create_dir_all(dir)?;
    matrix.write(&dir.join(MATRIX_FILE))?;

    let mut index = IvfIndex::new(matrix.dims(), nlist);
    index.train(matrix)?;
    index.add_with_ids(matrix, id_map)?;
    index.write(&dir.join(INDEX_FILE))?;

    snapshot::commit_manifest(dir, id_map, token_cache, matrix.dims())?;
    info!(
        rows = matrix.len(),
        nlist,
        dir = %dir.display(),
        "index built and snapshot committed"
    );
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::constants::MANIFEST_FILE;

    fn matrix(rows: usize) -> (EmbeddingMatrix, Vec<i64>) {
        let mut m = EmbeddingMatrix::new(2);
        let mut ids = Vec::new();
        for i in 0..rows {
            let angle = i as f32;
            m.push(vec![angle.cos(), angle.sin()]).unwrap();
            ids.push(i as i64 + 1);
        }
        (m, ids)
    }

    fn cache_for(ids: &[i64]) -> BTreeMap<i64, Vec<u32>> {
        ids.iter().map(|&id| (id, vec![id as u32])).collect()
    }

    #[test]
    fn build_commits_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let (m, ids) = matrix(4);
        let cache = cache_for(&ids);
        let index = build(&m, &ids, &cache, dir.path(), 2).unwrap();
        assert_eq!(index.ntotal(), 4);
        assert!(dir.path().join(MANIFEST_FILE).exists());

        let snap = snapshot::load(dir.path()).unwrap().expect("committed");
        assert_eq!(snap.id_map, ids);
        assert_eq!(snap.matrix, m);
        assert_eq!(snap.token_cache, cache);
    }

    #[test]
    fn failed_training_leaves_matrix_but_no_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let (m, ids) = matrix(2);
        let err = build(&m, &ids, &cache_for(&ids), dir.path(), 100).unwrap_err();
        assert!(err.to_string().contains("too few vectors"));
        assert!(dir.path().join(MATRIX_FILE).exists());
        assert!(!dir.path().join(MANIFEST_FILE).exists());
        assert!(snapshot::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn zero_rows_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (m, ids) = matrix(0);
        assert!(build(&m, &ids, &cache_for(&ids), dir.path(), 1).is_err());
    }
}
