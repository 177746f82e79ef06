//! RetrievalEngine: orchestrates ingestion and two-stage hybrid queries.
//!
//! Ingestion: resolve ids → (train tokenizer once) → batch-embed → build
//! and snapshot the index. Query: tokenize → lexical prefilter →
//! identifier-restricted ANN search → map ids back to records.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use quarry_core::config::EngineConfig;
use quarry_core::constants::DEFAULT_QUERY_CACHE_SIZE;
use quarry_core::errors::{IndexError, IngestError, QuarryResult};
use quarry_core::problem::Problem;
use quarry_core::traits::IEmbeddingProvider;
use quarry_embeddings::{HashedTfIdf, QueryEmbeddingCache};
use quarry_index::{builder, snapshot, IvfIndex, SnapshotState, NO_MATCH};
use quarry_tokens::{BpeTokenizer, TokenizerStateManager};

use crate::ident::{self, ResolvedIds};
use crate::pipeline::{self, TokenCache};
use crate::prefilter;

/// The hybrid retrieval engine.
///
/// Ingestion fully owns and rebuilds all persisted state; queries are
/// read-only and may run concurrently with each other, but the caller must
/// serialize ingestion against query traffic.
pub struct RetrievalEngine {
    config: EngineConfig,
    tokenizer: BpeTokenizer,
    embedder: Box<dyn IEmbeddingProvider>,
    query_cache: QueryEmbeddingCache,
    problems: Vec<Problem>,
    /// Canonical id → position in `problems`.
    by_id: HashMap<i64, usize>,
    id_map: Vec<i64>,
    token_cache: TokenCache,
    index: Option<IvfIndex>,
    state: SnapshotState,
}

impl RetrievalEngine {
    /// Create an engine. Reuses a persisted tokenizer state under
    /// `config.persist_dir` when one exists; `tech_terms` seeds a fresh
    /// tokenizer's protected vocabulary otherwise.
    pub fn new(config: EngineConfig, tech_terms: Vec<String>) -> QuarryResult<Self> {
        config.validate()?;
        let tokenizer = TokenizerStateManager::resolve(&config.persist_dir, &tech_terms)?;
        let embedder = Box::new(HashedTfIdf::new(config.dimensions, true));
        info!(
            dims = config.dimensions,
            nlist = config.nlist,
            provider = embedder.name(),
            "retrieval engine initialized"
        );
        Ok(Self {
            config,
            tokenizer,
            embedder,
            query_cache: QueryEmbeddingCache::new(DEFAULT_QUERY_CACHE_SIZE),
            problems: Vec::new(),
            by_id: HashMap::new(),
            id_map: Vec::new(),
            token_cache: TokenCache::new(),
            index: None,
            state: SnapshotState::Empty,
        })
    }

    pub fn state(&self) -> SnapshotState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SnapshotState::Ready
    }

    /// Canonical ids in matrix-row order.
    pub fn id_map(&self) -> &[i64] {
        &self.id_map
    }

    pub fn token_cache(&self) -> &TokenCache {
        &self.token_cache
    }

    /// Ingest a corpus, replacing any previously built or loaded state.
    ///
    /// Fatal on an empty corpus, on a corpus with no parseable identifier,
    /// and on an index too small for the configured partition count; no
    /// snapshot is committed in any of those cases.
    pub fn ingest(&mut self, problems: Vec<Problem>) -> QuarryResult<()> {
        if problems.is_empty() {
            return Err(IngestError::EmptyCorpus.into());
        }

        // Drop stale in-memory state first so a failed run leaves the
        // engine unready rather than answering from the old corpus.
        self.state = SnapshotState::Building;
        self.index = None;
        self.id_map.clear();
        self.token_cache.clear();
        self.query_cache.clear();

        if !self.tokenizer.is_trained() {
            let corpus = training_corpus(&problems);
            TokenizerStateManager::train_and_persist(
                &mut self.tokenizer,
                &corpus,
                self.config.vocab_size,
                &self.config.persist_dir,
            )?;
        }

        let resolved = ident::resolve(&problems);
        if resolved.is_empty() {
            return Err(IngestError::NoValidRecords.into());
        }
        info!(
            total = problems.len(),
            valid = resolved.len(),
            "identifiers resolved"
        );

        let vectors = pipeline::run(
            &problems,
            &resolved,
            &self.tokenizer,
            self.embedder.as_ref(),
            self.config.batch_size,
            self.config.dropout_prob,
        )?;

        let index = builder::build(
            &vectors.matrix,
            resolved.ids(),
            &vectors.token_cache,
            &self.config.persist_dir,
            self.config.nlist,
        )?;

        self.by_id = by_id_map(&resolved);
        self.id_map = resolved.ids().to_vec();
        self.token_cache = vectors.token_cache;
        self.problems = problems;
        self.index = Some(index);
        self.state = SnapshotState::Ready;
        info!(indexed = self.id_map.len(), "ingestion complete");
        Ok(())
    }

    /// Reload the persisted snapshot without recomputing embeddings.
    ///
    /// `problems` is the same record set the snapshot was built from; the
    /// engine needs it to map search results back to records. Returns
    /// `false` (leaving the engine empty) when no snapshot was ever
    /// committed.
    pub fn reload(&mut self, problems: Vec<Problem>) -> QuarryResult<bool> {
        let Some(snap) = snapshot::load(&self.config.persist_dir)? else {
            debug!(dir = %self.config.persist_dir.display(), "no snapshot to reload");
            return Ok(false);
        };

        let resolved = ident::resolve(&problems);
        self.by_id = by_id_map(&resolved);
        self.id_map = snap.id_map;
        self.token_cache = snap.token_cache;
        self.problems = problems;
        self.index = Some(snap.index);
        self.state = SnapshotState::Ready;
        info!(indexed = self.id_map.len(), "snapshot reloaded");
        Ok(true)
    }

    /// Two-stage hybrid query. Returns at most `top_k` records, most
    /// similar first. Empty results are an ordinary outcome, never an
    /// error; a missing index is.
    pub fn query(&self, text: &str, top_k: usize) -> QuarryResult<Vec<Problem>> {
        let Some(index) = &self.index else {
            return Err(IndexError::Unavailable.into());
        };
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_tokens = self.tokenizer.encode(text);

        // Stage 1: lexical prefilter over the token cache.
        let limit = top_k * self.config.prefilter_factor;
        let candidates = prefilter::lexical_candidates(&query_tokens, &self.token_cache, limit);
        if candidates.is_empty() {
            debug!(query = text, "no lexical candidates");
            return Ok(Vec::new());
        }

        // Candidates must be indexed ids; anything else means the cache
        // and the index disagree (e.g. after a partial reload).
        let indexed: HashSet<i64> = self.id_map.iter().copied().collect();
        let restrict: HashSet<i64> = candidates
            .iter()
            .copied()
            .filter(|id| indexed.contains(id))
            .collect();
        if restrict.is_empty() {
            warn!(
                candidates = candidates.len(),
                "lexical candidates missing from index; cache and index are out of sync"
            );
            return Ok(Vec::new());
        }

        // Stage 2: identifier-restricted ANN search.
        let embedding = self.query_embedding(&query_tokens)?;
        let (_, ids) = index.search(&embedding, top_k, self.config.nprobe, Some(&restrict))?;

        let results: Vec<Problem> = ids
            .into_iter()
            .filter(|&id| id != NO_MATCH)
            .filter_map(|id| {
                let position = self.by_id.get(&id).copied();
                if position.is_none() {
                    warn!(id, "indexed id has no backing record");
                }
                position.map(|p| self.problems[p].clone())
            })
            .collect();
        debug!(query = text, results = results.len(), "query complete");
        Ok(results)
    }

    /// Embed the round-tripped query text, memoized.
    fn query_embedding(&self, query_tokens: &[u32]) -> QuarryResult<Vec<f32>> {
        let decoded = self.tokenizer.decode(query_tokens);
        let key = QueryEmbeddingCache::key(&decoded);
        if let Some(embedding) = self.query_cache.get(&key) {
            return Ok(embedding);
        }
        let embedding = self.embedder.embed(&decoded)?;
        self.query_cache.insert(key, embedding.clone());
        Ok(embedding)
    }
}

/// Concatenated titles and bodies, the tokenizer's training text.
fn training_corpus(problems: &[Problem]) -> String {
    let mut corpus = String::new();
    for problem in problems {
        corpus.push_str(&problem.title);
        corpus.push(' ');
        if let Some(content) = &problem.content {
            corpus.push_str(content);
            corpus.push(' ');
        }
    }
    corpus
}

fn by_id_map(resolved: &ResolvedIds) -> HashMap<i64, usize> {
    resolved.iter().map(|(position, id)| (id, position)).collect()
}
