//! Property tests for identifier resolution and the lexical prefilter.

use std::collections::HashSet;

use proptest::prelude::*;

use quarry_core::problem::Problem;
use quarry_retrieval::{ident, pipeline::TokenCache, prefilter};

fn arb_problem() -> impl Strategy<Value = Problem> {
    // Mix of numeric, garbage, and empty declared ids.
    let id = prop_oneof![
        (0i64..500).prop_map(|n| n.to_string()),
        "[a-z]{1,4}",
        Just(String::new()),
    ];
    (id, "[a-z ]{1,20}").prop_map(|(id, title)| Problem::new(id, title))
}

proptest! {
    #[test]
    fn resolver_output_lengths_always_match(problems in prop::collection::vec(arb_problem(), 0..40)) {
        let resolved = ident::resolve(&problems);
        prop_assert_eq!(resolved.ids().len(), resolved.positions().len());
        prop_assert!(resolved.len() <= problems.len());
    }

    #[test]
    fn resolver_never_emits_duplicate_ids(problems in prop::collection::vec(arb_problem(), 0..40)) {
        let resolved = ident::resolve(&problems);
        let unique: HashSet<i64> = resolved.ids().iter().copied().collect();
        prop_assert_eq!(unique.len(), resolved.len());
    }

    #[test]
    fn resolver_positions_index_the_input(problems in prop::collection::vec(arb_problem(), 0..40)) {
        let resolved = ident::resolve(&problems);
        for (position, id) in resolved.iter() {
            prop_assert!(position < problems.len());
            prop_assert_eq!(problems[position].declared_id.trim().parse::<i64>().unwrap(), id);
        }
    }

    #[test]
    fn prefilter_respects_limit_and_overlap(
        cache_entries in prop::collection::btree_map(0i64..100, prop::collection::vec(0u32..50, 0..20), 0..30),
        query in prop::collection::vec(0u32..50, 0..20),
        limit in 0usize..10,
    ) {
        let cache: TokenCache = cache_entries;
        let candidates = prefilter::lexical_candidates(&query, &cache, limit);
        prop_assert!(candidates.len() <= limit);

        let query_set: HashSet<u32> = query.iter().copied().collect();
        for id in &candidates {
            let tokens = &cache[id];
            prop_assert!(tokens.iter().any(|t| query_set.contains(t)));
        }
    }

    #[test]
    fn prefilter_is_deterministic(
        cache_entries in prop::collection::btree_map(0i64..100, prop::collection::vec(0u32..50, 0..20), 0..30),
        query in prop::collection::vec(0u32..50, 0..20),
    ) {
        let cache: TokenCache = cache_entries;
        prop_assert_eq!(
            prefilter::lexical_candidates(&query, &cache, 9),
            prefilter::lexical_candidates(&query, &cache, 9)
        );
    }
}
