//! Embedding provider contract.
//!
//! Grounded on the teacher's `domain/ports/embedding.rs`: a narrow
//! async-trait boundary so the engine never depends on a concrete HTTP
//! client or local model runtime.

use crate::domain::error::Result;
use crate::domain::types::Embedding;
use async_trait::async_trait;

/// Text → fixed-dimension unit vector.
///
/// Implementations must be deterministic for identical input text and
/// must return unit-normalized vectors. Callers are responsible for
/// retrying on [`crate::domain::error::Error::ProviderUnavailable`] or
/// [`crate::domain::error::Error::Timeout`]; the trait itself never
/// retries internally.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single piece of text.
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Embed a batch of texts. The default implementation calls
    /// [`Self::embed`] once per item; providers with a native batch
    /// endpoint should override this.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Fixed output dimensionality this provider produces.
    fn dimensions(&self) -> usize;

    /// Stable name identifying the model/provider, used as part of the
    /// embedding cache key.
    fn model_name(&self) -> &str;

    /// Whether the provider is currently able to serve requests.
    async fn is_available(&self) -> bool {
        self.health_check().await.is_ok()
    }

    /// Health check; default implementation issues a sentinel embed call.
    async fn health_check(&self) -> Result<()> {
        self.embed("health check").await?;
        Ok(())
    }
}
