//! Deterministic, dependency-free embedding provider for tests and the
//! demo binary.
//!
//! Hashes overlapping character trigrams into a fixed-width vector and
//! normalizes it, so semantically similar strings (shared substrings)
//! land closer together without needing a real model on hand — useful
//! for exercising the chunker's adaptive merge and the store's ranking
//! without a network dependency.

use crate::domain::error::Result;
use crate::domain::ports::EmbeddingProvider;
use crate::domain::types::Embedding;
use async_trait::async_trait;

/// A hash-trigram embedding provider with a fixed, caller-chosen
/// dimensionality.
#[derive(Debug, Clone)]
pub struct LocalEmbeddingProvider {
    dimensions: usize,
}

impl LocalEmbeddingProvider {
    /// Build a provider that emits `dimensions`-wide unit vectors.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut buckets = vec![0f32; self.dimensions];
        let normalized: String = text.to_lowercase();
        let chars: Vec<char> = normalized.chars().collect();
        if chars.is_empty() {
            buckets[0] = 1.0;
            return buckets;
        }
        if chars.len() < 3 {
            let idx = fnv1a(normalized.as_bytes()) as usize % self.dimensions;
            buckets[idx] += 1.0;
        } else {
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let idx = fnv1a(trigram.as_bytes()) as usize % self.dimensions;
                buckets[idx] += 1.0;
            }
        }
        let norm = buckets.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut buckets {
                *v /= norm;
            }
        }
        buckets
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf29ce484222325u64;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(Embedding {
            vector: self.vectorize(text),
            model: self.model_name().to_string(),
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "local-trigram-hash"
    }

    async fn is_available(&self) -> bool {
        true
    }
}
