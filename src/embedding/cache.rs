//! LRU cache wrapper around an [`EmbeddingProvider`].
//!
//! Grounded on the teacher's `infrastructure::cache` module, which picks
//! `moka` as its default single-node cache backend; reused here at much
//! smaller scope, caching embeddings keyed on the first 16 hex chars of
//! `sha256(model_name || ':' || trim(lowercase(text)))` (spec §4.A) so
//! identical text, modulo case and surrounding whitespace, is never
//! embedded twice.

use crate::domain::error::Result;
use crate::domain::ports::EmbeddingProvider;
use crate::domain::types::Embedding;
use async_trait::async_trait;
use moka::future::Cache;
use sha2::{Digest, Sha256};

/// Default number of embeddings held in the cache at once.
pub const DEFAULT_CAPACITY: u64 = 1000;

/// Wraps an [`EmbeddingProvider`], caching results in an in-memory LRU.
pub struct CachedEmbeddingProvider {
    inner: Box<dyn EmbeddingProvider>,
    cache: Cache<String, Embedding>,
}

impl CachedEmbeddingProvider {
    /// Wrap `inner` with a cache of `capacity` entries.
    pub fn new(inner: Box<dyn EmbeddingProvider>, capacity: u64) -> Self {
        Self {
            inner,
            cache: Cache::new(capacity),
        }
    }

    /// Wrap `inner` with [`DEFAULT_CAPACITY`] entries.
    pub fn with_default_capacity(inner: Box<dyn EmbeddingProvider>) -> Self {
        Self::new(inner, DEFAULT_CAPACITY)
    }

    fn key(&self, text: &str) -> String {
        let normalized = text.trim().to_lowercase();
        let mut hasher = Sha256::new();
        hasher.update(self.inner.model_name().as_bytes());
        hasher.update(b":");
        hasher.update(normalized.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..16].to_string()
    }

    /// Number of entries currently resident in the cache.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let key = self.key(text);
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }
        let embedding = self.inner.embed(text).await?;
        self.cache.insert(key, embedding.clone()).await;
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }

    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }
}
