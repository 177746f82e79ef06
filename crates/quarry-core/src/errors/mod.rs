//! Error taxonomy for the quarry engine.
//!
//! Record-level validation problems are not errors at all, only logged
//! skips. Everything here aborts the operation that raised it.

mod index_error;
mod ingest_error;

pub use index_error::IndexError;
pub use ingest_error::IngestError;

/// Umbrella error for the whole workspace.
#[derive(Debug, thiserror::Error)]
pub enum QuarryError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("tokenizer state error: {reason}")]
    TokenizerState { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {reason}")]
    Config { reason: String },
}

pub type QuarryResult<T> = Result<T, QuarryError>;
