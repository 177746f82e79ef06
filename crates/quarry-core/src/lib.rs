//! # quarry-core
//!
//! Foundation crate for the quarry retrieval engine.
//! Defines the record model, config, errors, constants, and the embedder
//! trait. Every other crate in the workspace depends on this.

pub mod config;
pub mod constants;
pub mod errors;
pub mod logging;
pub mod problem;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use config::EngineConfig;
pub use errors::{IndexError, IngestError, QuarryError, QuarryResult};
pub use problem::{Difficulty, Problem};
