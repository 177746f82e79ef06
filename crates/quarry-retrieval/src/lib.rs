//! # quarry-retrieval
//!
//! The hybrid retrieval engine. Ingestion: identifier resolution → batch
//! embedding → index build → snapshot commit. Query: lexical prefilter
//! over the token cache → identifier-restricted ANN search → records.

pub mod engine;
pub mod ident;
pub mod pipeline;
pub mod prefilter;

pub use engine::RetrievalEngine;
pub use ident::ResolvedIds;
pub use pipeline::CorpusVectors;
