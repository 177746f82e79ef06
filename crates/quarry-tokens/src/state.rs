//! Tokenizer state resolution: load persisted state if present, else
//! construct fresh; train-and-persist in one step so no trained tokenizer
//! ever exists only in memory.

use std::path::Path;

use tracing::{debug, info};

use quarry_core::constants::TOKENIZER_STATE_FILE;
use quarry_core::errors::QuarryResult;

use crate::bpe::BpeTokenizer;

pub struct TokenizerStateManager;

impl TokenizerStateManager {
    /// Load the tokenizer state from `persist_dir` if it exists, otherwise
    /// construct a fresh untrained tokenizer seeded with `tech_terms` as
    /// protected vocabulary. A persisted state already encodes its
    /// vocabulary, so `tech_terms` is ignored on the load path.
    pub fn resolve(persist_dir: &Path, tech_terms: &[String]) -> QuarryResult<BpeTokenizer> {
        let path = persist_dir.join(TOKENIZER_STATE_FILE);
        if path.exists() {
            info!(path = %path.display(), "loading persisted tokenizer state");
            BpeTokenizer::load(&path)
        } else {
            debug!(
                protected = tech_terms.len(),
                "no tokenizer state on disk, constructing fresh tokenizer"
            );
            Ok(BpeTokenizer::new(tech_terms.to_vec()))
        }
    }

    /// Train the tokenizer on `corpus` and immediately persist the result,
    /// overwriting any prior state. Serialization failures are fatal.
    pub fn train_and_persist(
        tokenizer: &mut BpeTokenizer,
        corpus: &str,
        vocab_size: usize,
        persist_dir: &Path,
    ) -> QuarryResult<()> {
        tokenizer.train(corpus, vocab_size);
        std::fs::create_dir_all(persist_dir)?;
        let path = persist_dir.join(TOKENIZER_STATE_FILE);
        tokenizer.save(&path)?;
        info!(path = %path.display(), vocab = tokenizer.vocab_size(), "tokenizer state persisted");
        Ok(())
    }
}
