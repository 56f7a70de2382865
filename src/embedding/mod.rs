//! Embedding provider implementations: a cache decorator, a deterministic
//! local provider for tests/demos, and an OpenAI-compatible HTTP client.

pub mod cache;
pub mod http;
pub mod local;

pub use cache::CachedEmbeddingProvider;
pub use http::{HttpEmbeddingConfig, HttpEmbeddingProvider};
pub use local::LocalEmbeddingProvider;
