//! # quarry-tokens
//!
//! Byte-level BPE tokenizer used by the retrieval engine: lossless
//! encode/decode, protected multi-word technical terms, BPE-dropout for
//! title-only records, overlapping chunking, and binary state persistence.

pub mod bpe;
pub mod state;

pub use bpe::BpeTokenizer;
pub use state::TokenizerStateManager;
