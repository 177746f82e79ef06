//! Hashed TF-IDF dense embedder.
//!
//! Terms are hashed into fixed-dimension buckets and weighted by term
//! frequency times a length-based IDF approximation. Not as semantically
//! rich as a neural model, but deterministic and cheap, which is what the
//! engine actually relies on.

use std::collections::HashMap;

use quarry_core::errors::QuarryResult;
use quarry_core::traits::IEmbeddingProvider;

/// Deterministic hashed TF-IDF embedding provider.
pub struct HashedTfIdf {
    dimensions: usize,
    /// When set, output vectors are L2-normalized so inner product equals
    /// cosine similarity. The index is built for inner product, so the
    /// engine always requests normalized output.
    normalize: bool,
}

impl HashedTfIdf {
    pub fn new(dimensions: usize, normalize: bool) -> Self {
        Self {
            dimensions,
            normalize,
        }
    }

    /// Hash a term into a bucket index using FNV-1a.
    fn hash_term(term: &str, dims: usize) -> usize {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in term.as_bytes() {
            h ^= u64::from(*b);
            h = h.wrapping_mul(0x100000001b3);
        }
        (h as usize) % dims
    }

    /// Lowercase alphanumeric terms, two characters or longer.
    fn terms(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|s| s.len() >= 2)
            .map(str::to_lowercase)
            .collect()
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let terms = Self::terms(text);
        if terms.is_empty() {
            return vec![0.0; self.dimensions];
        }

        let mut tf: HashMap<&str, f32> = HashMap::new();
        for term in &terms {
            *tf.entry(term.as_str()).or_default() += 1.0;
        }

        let total = terms.len() as f32;
        let mut vec = vec![0.0f32; self.dimensions];
        for (term, count) in &tf {
            let freq = count / total;
            // IDF approximation: longer terms carry more signal than the
            // short, stopword-like ones.
            let idf = 1.0 + (term.len() as f32).ln();
            vec[Self::hash_term(term, self.dimensions)] += freq * idf;
        }

        if self.normalize {
            let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > f32::EPSILON {
                for v in &mut vec {
                    *v /= norm;
                }
            }
        }
        vec
    }
}

impl IEmbeddingProvider for HashedTfIdf {
    fn embed(&self, text: &str) -> QuarryResult<Vec<f32>> {
        Ok(self.vector(text))
    }

    fn embed_batch(&self, texts: &[String]) -> QuarryResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hashed-tfidf"
    }
}
