//! Background tag-generation contract (spec §4.F step 7).
//!
//! The LLM that turns a content excerpt into candidate tags is an
//! external collaborator, same as embedding and reranking; this trait
//! is the seam. [`crate::ingest`] owns the prompt template and the
//! tolerant response parsing, since both are this crate's behavior, not
//! the model's.
use crate::domain::error::Result;
use async_trait::async_trait;

/// `prompt -> raw completion text`.
#[async_trait]
pub trait TagGenerator: Send + Sync {
    /// Run `prompt` through the configured model and return its raw
    /// text completion. Tag-specific parsing happens in the caller.
    async fn generate(&self, prompt: &str) -> Result<String>;
}
