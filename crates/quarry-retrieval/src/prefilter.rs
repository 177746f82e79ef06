//! Lexical prefilter: token-set overlap between the query and each cached
//! record sequence.
//!
//! Duplicate tokens collapse: this is a set-overlap count, not a multiset
//! count. Ties break by ascending canonical id. The cache iterates in id
//! order and the sort is stable, so equal-overlap candidates keep that
//! order.

use std::collections::HashSet;

use crate::pipeline::TokenCache;

/// Canonical ids of the `limit` best lexical candidates, best first.
/// Records sharing no token with the query are never candidates.
pub fn lexical_candidates(
    query_tokens: &[u32],
    token_cache: &TokenCache,
    limit: usize,
) -> Vec<i64> {
    let query_set: HashSet<u32> = query_tokens.iter().copied().collect();

    let mut scored: Vec<(i64, usize)> = token_cache
        .iter()
        .map(|(&id, tokens)| {
            let record_set: HashSet<u32> = tokens.iter().copied().collect();
            (id, record_set.intersection(&query_set).count())
        })
        .filter(|&(_, overlap)| overlap > 0)
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.truncate(limit);
    scored.into_iter().map(|(id, _)| id).collect()
}
