//! Byte-level BPE with protected technical terms.
//!
//! Token ids 0..=255 are the raw bytes; every merge introduces one new id.
//! Decoding concatenates the byte expansions of each id, so
//! `decode(encode(text)) == text` for any UTF-8 input.

use std::collections::HashMap;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use quarry_core::errors::{QuarryError, QuarryResult};

/// First id available for merged tokens; 0..=255 are raw bytes.
const BASE_VOCAB: u32 = 256;

/// One learned merge: `left` followed by `right` becomes `id`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Merge {
    left: u32,
    right: u32,
    id: u32,
}

/// The persisted portion of the tokenizer. Everything else is derived.
#[derive(Serialize, Deserialize)]
struct TokenizerState {
    merges: Vec<Merge>,
    protected: Vec<String>,
}

/// Byte-level BPE tokenizer.
pub struct BpeTokenizer {
    /// Merges in training order; position is the merge rank.
    merges: Vec<Merge>,
    /// (left, right) -> (rank, merged id). Derived from `merges`.
    ranks: HashMap<(u32, u32), (usize, u32)>,
    /// id -> byte expansion. Derived from `merges`.
    vocab: HashMap<u32, Vec<u8>>,
    /// Multi-word terms premerged into single tokens before training.
    protected: Vec<String>,
    trained: bool,
}

impl BpeTokenizer {
    /// Construct an untrained tokenizer with the given protected terms.
    pub fn new(protected: Vec<String>) -> Self {
        let mut tokenizer = Self {
            merges: Vec::new(),
            ranks: HashMap::new(),
            vocab: HashMap::new(),
            protected,
            trained: false,
        };
        tokenizer.rebuild_derived();
        tokenizer
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// Total vocabulary size including the 256 base byte tokens.
    pub fn vocab_size(&self) -> usize {
        BASE_VOCAB as usize + self.merges.len()
    }

    /// Train on a corpus until `vocab_size` tokens exist or no pair
    /// repeats. Protected terms are premerged first so each becomes a
    /// single token regardless of corpus frequency. Retraining replaces
    /// all previously learned merges.
    pub fn train(&mut self, corpus: &str, vocab_size: usize) {
        self.merges.clear();
        self.rebuild_derived();

        let mut seq: Vec<u32> = corpus.bytes().map(u32::from).collect();

        for term in self.protected.clone() {
            seq = self.premerge_term(&term, seq);
        }

        while self.vocab_size() < vocab_size {
            let Some(((left, right), count)) = most_frequent_pair(&seq) else {
                break;
            };
            if count < 2 {
                break;
            }
            let id = self.push_merge(left, right);
            seq = replace_pair(&seq, (left, right), id);
        }

        self.trained = true;
        info!(
            merges = self.merges.len(),
            vocab = self.vocab_size(),
            "tokenizer training complete"
        );
    }

    /// Fold a protected term's byte sequence into a single token by
    /// chaining merges left to right, applying each to the corpus.
    fn premerge_term(&mut self, term: &str, mut seq: Vec<u32>) -> Vec<u32> {
        let bytes: Vec<u32> = term.bytes().map(u32::from).collect();
        if bytes.len() < 2 {
            return seq;
        }
        let mut current = bytes[0];
        for &next in &bytes[1..] {
            let id = match self.ranks.get(&(current, next)) {
                Some(&(_, id)) => id,
                None => {
                    let id = self.push_merge(current, next);
                    seq = replace_pair(&seq, (current, next), id);
                    id
                }
            };
            current = id;
        }
        debug!(term, token = current, "premerged protected term");
        seq
    }

    /// Record a merge and update the derived tables.
    fn push_merge(&mut self, left: u32, right: u32) -> u32 {
        let id = BASE_VOCAB + self.merges.len() as u32;
        self.merges.push(Merge { left, right, id });
        self.ranks.insert((left, right), (self.merges.len() - 1, id));
        let mut bytes = self.vocab[&left].clone();
        bytes.extend_from_slice(&self.vocab[&right]);
        self.vocab.insert(id, bytes);
        id
    }

    /// Rebuild `ranks` and `vocab` from `merges`.
    fn rebuild_derived(&mut self) {
        self.ranks.clear();
        self.vocab.clear();
        for b in 0..BASE_VOCAB {
            self.vocab.insert(b, vec![b as u8]);
        }
        for (rank, m) in self.merges.iter().enumerate() {
            self.ranks.insert((m.left, m.right), (rank, m.id));
            let mut bytes = self.vocab[&m.left].clone();
            bytes.extend_from_slice(&self.vocab[&m.right]);
            self.vocab.insert(m.id, bytes);
        }
    }

    /// Full (non-lossy) encode.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        self.encode_greedy(text, None)
    }

    /// BPE-dropout encode: each merge rule is independently disabled with
    /// probability `prob` for the duration of this call, producing a
    /// slightly over-segmented token sequence.
    pub fn encode_with_dropout(&self, text: &str, prob: f64) -> Vec<u32> {
        if prob <= 0.0 {
            return self.encode(text);
        }
        let mut rng = rand::thread_rng();
        let dropped: Vec<usize> = (0..self.merges.len())
            .filter(|_| rng.gen::<f64>() < prob)
            .collect();
        self.encode_greedy(text, Some(&dropped))
    }

    /// Greedy lowest-rank-first merge loop over the byte sequence.
    fn encode_greedy(&self, text: &str, dropped: Option<&[usize]>) -> Vec<u32> {
        let mut seq: Vec<u32> = text.bytes().map(u32::from).collect();
        loop {
            let mut best: Option<(usize, (u32, u32), u32)> = None;
            for window in seq.windows(2) {
                let pair = (window[0], window[1]);
                if let Some(&(rank, id)) = self.ranks.get(&pair) {
                    if dropped.is_some_and(|d| d.binary_search(&rank).is_ok()) {
                        continue;
                    }
                    if best.map_or(true, |(r, _, _)| rank < r) {
                        best = Some((rank, pair, id));
                    }
                }
            }
            let Some((_, pair, id)) = best else {
                break;
            };
            seq = replace_pair(&seq, pair, id);
        }
        seq
    }

    /// Decode token ids back to text. Unknown ids are skipped.
    pub fn decode(&self, ids: &[u32]) -> String {
        let mut bytes = Vec::new();
        for id in ids {
            if let Some(expansion) = self.vocab.get(id) {
                bytes.extend_from_slice(expansion);
            }
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Encode `text` and split into fixed-size token chunks with overlap.
    /// A text that fits in one chunk comes back as a single chunk.
    pub fn chunk_with_overlap(
        &self,
        text: &str,
        chunk_size: usize,
        overlap: usize,
    ) -> Vec<Vec<u32>> {
        let tokens = self.encode(text);
        if tokens.len() <= chunk_size || chunk_size == 0 {
            return vec![tokens];
        }
        let step = chunk_size.saturating_sub(overlap).max(1);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < tokens.len() {
            let end = (start + chunk_size).min(tokens.len());
            chunks.push(tokens[start..end].to_vec());
            if end == tokens.len() {
                break;
            }
            start += step;
        }
        chunks
    }

    /// Persist the tokenizer state as an opaque binary blob.
    pub fn save(&self, path: &Path) -> QuarryResult<()> {
        let state = TokenizerState {
            merges: self.merges.clone(),
            protected: self.protected.clone(),
        };
        let blob = bincode::serialize(&state).map_err(|e| QuarryError::TokenizerState {
            reason: e.to_string(),
        })?;
        std::fs::write(path, blob)?;
        Ok(())
    }

    /// Load a previously persisted tokenizer state.
    pub fn load(path: &Path) -> QuarryResult<Self> {
        let blob = std::fs::read(path)?;
        let state: TokenizerState =
            bincode::deserialize(&blob).map_err(|e| QuarryError::TokenizerState {
                reason: format!("{}: {e}", path.display()),
            })?;
        let mut tokenizer = Self {
            merges: state.merges,
            ranks: HashMap::new(),
            vocab: HashMap::new(),
            protected: state.protected,
            trained: true,
        };
        tokenizer.rebuild_derived();
        Ok(tokenizer)
    }
}

/// The most frequent adjacent pair, ties broken by smallest pair for
/// deterministic training.
fn most_frequent_pair(seq: &[u32]) -> Option<((u32, u32), usize)> {
    let mut counts: HashMap<(u32, u32), usize> = HashMap::new();
    for window in seq.windows(2) {
        *counts.entry((window[0], window[1])).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
}

/// Replace every non-overlapping occurrence of `pair` with `id`.
fn replace_pair(seq: &[u32], pair: (u32, u32), id: u32) -> Vec<u32> {
    let mut out = Vec::with_capacity(seq.len());
    let mut i = 0;
    while i < seq.len() {
        if i + 1 < seq.len() && seq[i] == pair.0 && seq[i + 1] == pair.1 {
            out.push(id);
            i += 2;
        } else {
            out.push(seq[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained() -> BpeTokenizer {
        let mut t = BpeTokenizer::new(vec!["binary search".to_string()]);
        t.train(
            "binary search is a search over a sorted array; binary search halves the range",
            300,
        );
        t
    }

    #[test]
    fn untrained_encode_is_raw_bytes() {
        let t = BpeTokenizer::new(vec![]);
        let ids = t.encode("abc");
        assert_eq!(ids, vec![97, 98, 99]);
    }

    #[test]
    fn roundtrip_is_lossless() {
        let t = trained();
        for text in ["binary search", "unseen wörds ünicode", "", "a"] {
            assert_eq!(t.decode(&t.encode(text)), text);
        }
    }

    #[test]
    fn training_compresses_corpus() {
        let t = trained();
        let ids = t.encode("binary search over a sorted array");
        assert!(ids.len() < "binary search over a sorted array".len());
    }

    #[test]
    fn protected_term_is_single_token() {
        let t = trained();
        let ids = t.encode("binary search");
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn dropout_oversegments_but_roundtrips() {
        let t = trained();
        let full = t.encode("binary search over a sorted array");
        let dropped = t.encode_with_dropout("binary search over a sorted array", 1.0);
        // prob 1.0 disables every merge: pure bytes.
        assert_eq!(dropped.len(), "binary search over a sorted array".len());
        assert!(dropped.len() >= full.len());
        assert_eq!(t.decode(&dropped), "binary search over a sorted array");
    }

    #[test]
    fn dropout_zero_matches_full_encode() {
        let t = trained();
        assert_eq!(
            t.encode_with_dropout("sorted array", 0.0),
            t.encode("sorted array")
        );
    }

    #[test]
    fn chunking_overlaps() {
        let t = BpeTokenizer::new(vec![]);
        let text = "abcdefghij"; // 10 byte tokens
        let chunks = t.chunk_with_overlap(text, 4, 2);
        assert_eq!(chunks[0], t.encode("abcd"));
        assert_eq!(chunks[1], t.encode("cdef"));
        let flat_last = chunks.last().unwrap();
        assert_eq!(*flat_last.last().unwrap(), u32::from(b'j'));
    }

    #[test]
    fn short_text_is_one_chunk() {
        let t = BpeTokenizer::new(vec![]);
        let chunks = t.chunk_with_overlap("ab", 512, 64);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn save_load_preserves_encoding() {
        let t = trained();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokenizer.state");
        t.save(&path).unwrap();

        let loaded = BpeTokenizer::load(&path).unwrap();
        assert!(loaded.is_trained());
        assert_eq!(
            loaded.encode("binary search sorted"),
            t.encode("binary search sorted")
        );
    }

    #[test]
    fn retrain_replaces_merges() {
        let mut t = trained();
        let before = t.vocab_size();
        t.train("xyxyxyxyxyxyxyxy", 260);
        assert!(t.vocab_size() <= before);
        assert_eq!(t.decode(&t.encode("xyxy")), "xyxy");
    }
}
