//! IVF-flat index over inner-product similarity.
//!
//! A seeded k-means quantizer partitions the vector space into `nlist`
//! coarse cells; each vector lives in the posting list of its nearest
//! centroid under the id it was added with. Search probes the `nprobe`
//! closest cells and scores candidates by exact inner product.

use std::collections::HashSet;
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use quarry_core::errors::{IndexError, QuarryResult};

use crate::matrix::EmbeddingMatrix;
use crate::NO_MATCH;

/// Fixed seed so quantizer training is reproducible across runs.
const KMEANS_SEED: u64 = 0x9e3779b97f4a7c15;
const KMEANS_MAX_ITERATIONS: usize = 25;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    id: i64,
    vector: Vec<f32>,
}

/// Inverted-file flat index.
#[derive(Debug, Serialize, Deserialize)]
pub struct IvfIndex {
    dims: usize,
    nlist: usize,
    centroids: Vec<Vec<f32>>,
    postings: Vec<Vec<Entry>>,
    trained: bool,
}

impl IvfIndex {
    pub fn new(dims: usize, nlist: usize) -> Self {
        Self {
            dims,
            nlist,
            centroids: Vec::new(),
            postings: Vec::new(),
            trained: false,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn nlist(&self) -> usize {
        self.nlist
    }

    /// Total number of indexed vectors.
    pub fn ntotal(&self) -> usize {
        self.postings.iter().map(Vec::len).sum()
    }

    /// Train the coarse quantizer on the full matrix.
    ///
    /// Refuses to train fewer vectors than partitions: silently
    /// under-populating cells would degrade every later search, so this is
    /// a configuration error the caller has to resolve.
    pub fn train(&mut self, matrix: &EmbeddingMatrix) -> QuarryResult<()> {
        let rows = matrix.len();
        if self.nlist == 0 || rows < self.nlist {
            return Err(IndexError::TooFewVectors {
                rows,
                nlist: self.nlist,
            }
            .into());
        }
        if matrix.dims() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                actual: matrix.dims(),
            }
            .into());
        }

        let mut rng = StdRng::seed_from_u64(KMEANS_SEED);
        let mut centroids: Vec<Vec<f32>> = sample(&mut rng, rows, self.nlist)
            .into_iter()
            .filter_map(|i| matrix.row(i).map(<[f32]>::to_vec))
            .collect();

        let mut assignments = vec![0usize; rows];
        for iteration in 0..KMEANS_MAX_ITERATIONS {
            let mut changed = false;
            for (i, row) in matrix.rows().iter().enumerate() {
                let cell = nearest_centroid(&centroids, row);
                if assignments[i] != cell {
                    assignments[i] = cell;
                    changed = true;
                }
            }
            if !changed && iteration > 0 {
                break;
            }

            // Recompute each centroid as the (renormalized) mean of its
            // members; empty cells keep their previous centroid.
            let mut sums = vec![vec![0.0f32; self.dims]; self.nlist];
            let mut counts = vec![0usize; self.nlist];
            for (i, row) in matrix.rows().iter().enumerate() {
                let cell = assignments[i];
                counts[cell] += 1;
                for (s, v) in sums[cell].iter_mut().zip(row) {
                    *s += v;
                }
            }
            for (cell, sum) in sums.into_iter().enumerate() {
                if counts[cell] == 0 {
                    continue;
                }
                let mut mean: Vec<f32> =
                    sum.into_iter().map(|s| s / counts[cell] as f32).collect();
                let norm: f32 = mean.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm > f32::EPSILON {
                    for v in &mut mean {
                        *v /= norm;
                    }
                }
                centroids[cell] = mean;
            }
        }

        self.centroids = centroids;
        self.postings = vec![Vec::new(); self.nlist];
        self.trained = true;
        debug!(rows, nlist = self.nlist, "quantizer trained");
        Ok(())
    }

    /// Add every row of `matrix` under its aligned id from `ids`.
    pub fn add_with_ids(&mut self, matrix: &EmbeddingMatrix, ids: &[i64]) -> QuarryResult<()> {
        if !self.trained {
            return Err(IndexError::NotTrained.into());
        }
        if matrix.dims() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                actual: matrix.dims(),
            }
            .into());
        }
        if matrix.len() != ids.len() {
            return Err(IndexError::Persistence {
                reason: format!(
                    "id count {} does not match row count {}",
                    ids.len(),
                    matrix.len()
                ),
            }
            .into());
        }

        for (row, &id) in matrix.rows().iter().zip(ids) {
            let cell = nearest_centroid(&self.centroids, row);
            self.postings[cell].push(Entry {
                id,
                vector: row.clone(),
            });
        }
        Ok(())
    }

    /// Inner-product search over the `nprobe` nearest cells.
    ///
    /// When `restrict` is set, only vectors whose id is in the set are
    /// scored. Returns parallel `(distances, ids)` of length exactly `k`;
    /// slots past the last real result hold [`NO_MATCH`].
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        nprobe: usize,
        restrict: Option<&HashSet<i64>>,
    ) -> QuarryResult<(Vec<f32>, Vec<i64>)> {
        if !self.trained {
            return Err(IndexError::NotTrained.into());
        }
        if query.len() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            }
            .into());
        }

        // Rank cells by centroid similarity, probe the closest nprobe.
        let mut cells: Vec<(f32, usize)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(cell, centroid)| (dot(query, centroid), cell))
            .collect();
        cells.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        cells.truncate(nprobe.max(1));

        let mut scored: Vec<(f32, i64)> = Vec::new();
        for (_, cell) in cells {
            for entry in &self.postings[cell] {
                if restrict.is_some_and(|set| !set.contains(&entry.id)) {
                    continue;
                }
                scored.push((dot(query, &entry.vector), entry.id));
            }
        }

        // Descending similarity, ascending id on exact ties.
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });
        scored.truncate(k);

        let mut distances = vec![f32::NEG_INFINITY; k];
        let mut ids = vec![NO_MATCH; k];
        for (slot, (score, id)) in scored.into_iter().enumerate() {
            distances[slot] = score;
            ids[slot] = id;
        }
        Ok((distances, ids))
    }

    /// Persist the index as an opaque binary blob.
    pub fn write(&self, path: &Path) -> QuarryResult<()> {
        let blob = bincode::serialize(self).map_err(|e| IndexError::Persistence {
            reason: e.to_string(),
        })?;
        std::fs::write(path, blob)?;
        Ok(())
    }

    /// Load an index previously written by [`IvfIndex::write`].
    pub fn read(path: &Path) -> QuarryResult<Self> {
        let blob = std::fs::read(path)?;
        bincode::deserialize(&blob).map_err(|e| {
            IndexError::CorruptSnapshot {
                details: format!("{}: {e}", path.display()),
            }
            .into()
        })
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// The cell whose centroid has the highest inner product with `row`.
fn nearest_centroid(centroids: &[Vec<f32>], row: &[f32]) -> usize {
    let mut best = 0;
    let mut best_score = f32::NEG_INFINITY;
    for (cell, centroid) in centroids.iter().enumerate() {
        let score = dot(row, centroid);
        if score > best_score {
            best_score = score;
            best = cell;
        }
    }
    best
}
