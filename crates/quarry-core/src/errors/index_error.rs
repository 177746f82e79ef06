/// ANN index and snapshot errors.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("index unavailable: no snapshot has been built or loaded")]
    Unavailable,

    #[error("too few vectors to train {nlist} partitions: got {rows}")]
    TooFewVectors { rows: usize, nlist: usize },

    #[error("index is not trained")]
    NotTrained,

    #[error("dimension mismatch: index has {expected}, vector has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("snapshot corrupt: {details}")]
    CorruptSnapshot { details: String },

    #[error("index persistence failed: {reason}")]
    Persistence { reason: String },
}
