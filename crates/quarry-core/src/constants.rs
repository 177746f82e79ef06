/// Quarry engine version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Separator marker placed between title and body when both are embedded.
pub const SEP_MARKER: &str = " [SEP] ";

/// Default number of records embedded per batch.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Default BPE vocabulary size.
pub const DEFAULT_VOCAB_SIZE: usize = 32_000;

/// Default dropout probability for title-only encodes.
pub const DEFAULT_DROPOUT_PROB: f64 = 0.1;

/// Default embedding dimensionality.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Default number of coarse IVF partitions.
pub const DEFAULT_NLIST: usize = 100;

/// Default number of partitions probed per search.
pub const DEFAULT_NPROBE: usize = 10;

/// Lexical prefilter keeps `top_k * DEFAULT_PREFILTER_FACTOR` candidates.
pub const DEFAULT_PREFILTER_FACTOR: usize = 3;

/// Maximum entries in the query-embedding cache.
pub const DEFAULT_QUERY_CACHE_SIZE: u64 = 4_096;

/// Snapshot manifest format version.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Persisted file names under the configured directory.
pub const TOKENIZER_STATE_FILE: &str = "tokenizer.state";
pub const MATRIX_FILE: &str = "embeddings.bin";
pub const INDEX_FILE: &str = "ann.index";
pub const MANIFEST_FILE: &str = "snapshot.json";
