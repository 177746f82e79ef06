//! Engine configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::errors::{QuarryError, QuarryResult};

/// Retrieval engine configuration.
///
/// `nlist` is deliberately a validated parameter rather than a hardwired
/// constant: the index builder refuses to train fewer vectors than
/// partitions instead of letting the quantizer fail opaquely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding all persisted state (tokenizer, matrix, index, manifest).
    pub persist_dir: PathBuf,
    /// Records embedded per batch.
    pub batch_size: usize,
    /// BPE vocabulary size used when training a fresh tokenizer.
    pub vocab_size: usize,
    /// Dropout probability for title-only encodes.
    pub dropout_prob: f64,
    /// Embedding dimensionality.
    pub dimensions: usize,
    /// Number of coarse IVF partitions.
    pub nlist: usize,
    /// Number of partitions probed per query.
    pub nprobe: usize,
    /// Lexical prefilter keeps `top_k * prefilter_factor` candidates.
    pub prefilter_factor: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            persist_dir: PathBuf::from("quarry_data"),
            batch_size: constants::DEFAULT_BATCH_SIZE,
            vocab_size: constants::DEFAULT_VOCAB_SIZE,
            dropout_prob: constants::DEFAULT_DROPOUT_PROB,
            dimensions: constants::DEFAULT_DIMENSIONS,
            nlist: constants::DEFAULT_NLIST,
            nprobe: constants::DEFAULT_NPROBE,
            prefilter_factor: constants::DEFAULT_PREFILTER_FACTOR,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file. Missing keys fall back to defaults.
    pub fn from_toml_file(path: &Path) -> QuarryResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&raw).map_err(|e| QuarryError::Config {
            reason: format!("{}: {e}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Sanity-check parameter ranges.
    pub fn validate(&self) -> QuarryResult<()> {
        if self.batch_size == 0 {
            return Err(QuarryError::Config {
                reason: "batch_size must be > 0".to_string(),
            });
        }
        if self.nlist == 0 {
            return Err(QuarryError::Config {
                reason: "nlist must be > 0".to_string(),
            });
        }
        if self.dimensions == 0 {
            return Err(QuarryError::Config {
                reason: "dimensions must be > 0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.dropout_prob) {
            return Err(QuarryError::Config {
                reason: format!("dropout_prob {} outside [0, 1]", self.dropout_prob),
            });
        }
        Ok(())
    }
}
