//! # quarry-index
//!
//! The vector side of the retrieval engine: a dense embedding-matrix codec,
//! an IVF-flat inner-product index with identifier-restricted search, and
//! snapshot persistence that ties matrix, index, id map, and token cache
//! together as one versioned unit.

pub mod builder;
pub mod ivf;
pub mod matrix;
pub mod snapshot;

pub use builder::build;
pub use ivf::IvfIndex;
pub use matrix::EmbeddingMatrix;
pub use snapshot::{IndexSnapshot, SnapshotManifest, SnapshotState};

/// Sentinel id returned by `IvfIndex::search` for empty result slots,
/// mirroring the usual ANN-library convention.
pub const NO_MATCH: i64 = -1;
