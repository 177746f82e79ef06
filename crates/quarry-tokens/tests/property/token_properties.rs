//! Property tests for the BPE tokenizer.

use proptest::prelude::*;
use quarry_tokens::BpeTokenizer;

fn trained() -> BpeTokenizer {
    let mut t = BpeTokenizer::new(vec!["dynamic programming".to_string()]);
    t.train(
        "dynamic programming reduces repeated work; a sliding window slides over the array; \
         two pointers meet in the middle; the hash table stores seen values",
        400,
    );
    t
}

proptest! {
    #[test]
    fn encode_decode_roundtrips(text in "\\PC{0,200}") {
        let t = trained();
        prop_assert_eq!(t.decode(&t.encode(&text)), text);
    }

    #[test]
    fn dropout_encode_roundtrips(text in "[a-z ]{0,120}", prob in 0.0f64..1.0) {
        let t = trained();
        let ids = t.encode_with_dropout(&text, prob);
        prop_assert_eq!(t.decode(&ids), text);
    }

    #[test]
    fn full_encode_is_deterministic(text in "[a-z ]{0,120}") {
        let t = trained();
        prop_assert_eq!(t.encode(&text), t.encode(&text));
        prop_assert_eq!(t.encode_with_dropout(&text, 0.0), t.encode(&text));
    }

    #[test]
    fn chunks_cover_all_tokens(text in "[a-z ]{0,300}") {
        let t = trained();
        let tokens = t.encode(&text);
        let chunks = t.chunk_with_overlap(&text, 16, 4);
        let covered: usize = chunks.iter().map(Vec::len).sum();
        prop_assert!(covered >= tokens.len());
        if let (Some(first), Some(last)) = (chunks.first(), chunks.last()) {
            prop_assert_eq!(first.first(), tokens.first());
            prop_assert_eq!(last.last(), tokens.last());
        }
    }
}
