//! Trait seams for the collaborators the engine consumes.

use crate::errors::QuarryResult;

/// Embedding generation provider.
///
/// Implementations must be deterministic: embedding the same text twice
/// yields the same vector. The engine relies on this for reproducible
/// ingestion runs.
pub trait IEmbeddingProvider: Send + Sync {
    /// Embed a single text, returning a vector of floats.
    fn embed(&self, text: &str) -> QuarryResult<Vec<f32>>;

    /// Embed a batch of texts.
    fn embed_batch(&self, texts: &[String]) -> QuarryResult<Vec<Vec<f32>>>;

    /// The dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Human-readable provider name.
    fn name(&self) -> &str;
}
