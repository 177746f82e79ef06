//! Batch embedding pipeline.
//!
//! Walks the resolved records in fixed-size batches: tokenize (full path
//! when a body exists, dropout path for title-only records), record the
//! token sequence in the cache, decode, and batch-embed the decoded texts.

use std::collections::BTreeMap;

use tracing::{debug, info};

use quarry_core::constants::SEP_MARKER;
use quarry_core::errors::{IngestError, QuarryResult};
use quarry_core::problem::Problem;
use quarry_core::traits::IEmbeddingProvider;
use quarry_index::EmbeddingMatrix;
use quarry_tokens::BpeTokenizer;

use crate::ident::ResolvedIds;

/// Token sequences keyed by canonical id. BTreeMap iteration order
/// (ascending id) doubles as the prefilter's deterministic tie-break.
pub type TokenCache = BTreeMap<i64, Vec<u32>>;

/// The embedding pipeline's output: one matrix row and one cache entry per
/// resolved record, in id-map order.
pub struct CorpusVectors {
    pub matrix: EmbeddingMatrix,
    pub token_cache: TokenCache,
}

/// Embed every resolved record.
pub fn run(
    problems: &[Problem],
    resolved: &ResolvedIds,
    tokenizer: &BpeTokenizer,
    embedder: &dyn IEmbeddingProvider,
    batch_size: usize,
    dropout_prob: f64,
) -> QuarryResult<CorpusVectors> {
    let mut matrix = EmbeddingMatrix::new(embedder.dimensions());
    let mut token_cache = TokenCache::new();
    let mut batch: Vec<String> = Vec::with_capacity(batch_size);
    let mut batch_start = 0;

    for (position, id) in resolved.iter() {
        let problem = &problems[position];
        let tokens = if problem.has_content() {
            let text = format!(
                "{}{}{}",
                problem.title,
                SEP_MARKER,
                problem.content.as_deref().unwrap_or_default()
            );
            tokenizer.encode(&text)
        } else {
            tokenizer.encode_with_dropout(&problem.title, dropout_prob)
        };

        // Cache the exact sequence behind this embedding before decoding;
        // the lexical prefilter matches against these tokens.
        token_cache.insert(id, tokens.clone());
        batch.push(tokenizer.decode(&tokens));

        if batch.len() == batch_size {
            flush(&mut batch, &mut matrix, embedder, batch_start)?;
            batch_start = matrix.len();
        }
    }
    if !batch.is_empty() {
        flush(&mut batch, &mut matrix, embedder, batch_start)?;
    }

    debug_assert_eq!(matrix.len(), resolved.len());
    debug_assert_eq!(token_cache.len(), resolved.len());
    info!(
        records = resolved.len(),
        dims = matrix.dims(),
        "embedding pipeline complete"
    );
    Ok(CorpusVectors {
        matrix,
        token_cache,
    })
}

fn flush(
    batch: &mut Vec<String>,
    matrix: &mut EmbeddingMatrix,
    embedder: &dyn IEmbeddingProvider,
    batch_start: usize,
) -> QuarryResult<()> {
    debug!(size = batch.len(), batch_start, "embedding batch");
    let vectors =
        embedder
            .embed_batch(batch)
            .map_err(|e| IngestError::EmbeddingFailed {
                batch_start,
                reason: e.to_string(),
            })?;
    for vector in vectors {
        matrix.push(vector)?;
    }
    batch.clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident;
    use quarry_embeddings::HashedTfIdf;

    fn tokenizer() -> BpeTokenizer {
        let mut t = BpeTokenizer::new(vec![]);
        t.train("find two numbers that sum to target reverse a string in place", 300);
        t
    }

    fn sample() -> Vec<Problem> {
        vec![
            Problem::new("1", "Two Sum").with_content("find two numbers that sum to target"),
            Problem::new("2", "Reverse String").with_content("reverse a string in place"),
            Problem::new("3", "Title Only"),
        ]
    }

    #[test]
    fn one_row_and_cache_entry_per_resolved_record() {
        let problems = sample();
        let resolved = ident::resolve(&problems);
        let embedder = HashedTfIdf::new(64, true);
        let vectors = run(&problems, &resolved, &tokenizer(), &embedder, 2, 0.1).unwrap();

        assert_eq!(vectors.matrix.len(), 3);
        assert_eq!(vectors.token_cache.len(), 3);
        assert!(vectors.token_cache.contains_key(&1));
        assert!(vectors.token_cache.contains_key(&3));
    }

    #[test]
    fn cache_holds_full_encode_for_body_records() {
        let problems = sample();
        let resolved = ident::resolve(&problems);
        let t = tokenizer();
        let embedder = HashedTfIdf::new(64, true);
        let vectors = run(&problems, &resolved, &t, &embedder, 64, 0.1).unwrap();

        let expected = t.encode("Two Sum [SEP] find two numbers that sum to target");
        assert_eq!(vectors.token_cache[&1], expected);
    }

    #[test]
    fn empty_resolved_set_yields_empty_output() {
        let problems = vec![Problem::new("abc", "bad id")];
        let resolved = ident::resolve(&problems);
        let embedder = HashedTfIdf::new(64, true);
        let vectors = run(&problems, &resolved, &tokenizer(), &embedder, 4, 0.1).unwrap();
        assert!(vectors.matrix.is_empty());
        assert!(vectors.token_cache.is_empty());
    }

    #[test]
    fn batching_does_not_change_output() {
        let problems = sample();
        let resolved = ident::resolve(&problems);
        let t = tokenizer();
        let embedder = HashedTfIdf::new(64, true);
        // Dropout 0 so title-only encodes are deterministic across runs.
        let small = run(&problems, &resolved, &t, &embedder, 1, 0.0).unwrap();
        let large = run(&problems, &resolved, &t, &embedder, 64, 0.0).unwrap();
        assert_eq!(small.matrix, large.matrix);
        assert_eq!(small.token_cache, large.token_cache);
    }
}
