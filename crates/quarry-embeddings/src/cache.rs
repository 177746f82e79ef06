//! Query-embedding cache.
//!
//! Repeated queries skip the tokenizer round-trip and embedding call.
//! Keys are blake3 hashes of the already-decoded query text.

use moka::sync::Cache;
use tracing::debug;

/// In-memory cache of query embeddings keyed by content hash.
pub struct QueryEmbeddingCache {
    cache: Cache<String, Vec<f32>>,
}

impl QueryEmbeddingCache {
    pub fn new(max_entries: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_entries).build(),
        }
    }

    /// Content hash for a query text.
    pub fn key(text: &str) -> String {
        blake3::hash(text.as_bytes()).to_hex().to_string()
    }

    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        let hit = self.cache.get(key);
        if hit.is_some() {
            debug!(key, "query embedding cache hit");
        }
        hit
    }

    pub fn insert(&self, key: String, embedding: Vec<f32>) {
        self.cache.insert(key, embedding);
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}
