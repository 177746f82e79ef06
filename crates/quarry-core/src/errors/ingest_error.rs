/// Ingestion-pipeline errors. All fatal: ingestion is all-or-nothing.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("empty corpus: nothing to index")]
    EmptyCorpus,

    #[error("no record has a parseable integer identifier")]
    NoValidRecords,

    #[error("tokenizer training failed: {reason}")]
    TokenizerTraining { reason: String },

    #[error("embedding failed for batch starting at record {batch_start}: {reason}")]
    EmbeddingFailed { batch_start: usize, reason: String },
}
