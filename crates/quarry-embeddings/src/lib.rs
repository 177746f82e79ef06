//! # quarry-embeddings
//!
//! The embedding side of the retrieval engine: a deterministic
//! hashed TF-IDF dense embedder and a moka-backed query-embedding cache.

pub mod cache;
pub mod hashed;

pub use cache::QueryEmbeddingCache;
pub use hashed::HashedTfIdf;
