//! Port interfaces: boundary contracts between the domain core and its
//! pluggable collaborators (embedding providers, rerankers, the store,
//! text extractors, and the tag generator).

pub mod embedding;
pub mod extractor;
pub mod reranker;
pub mod store;
pub mod tagging;

pub use embedding::EmbeddingProvider;
pub use extractor::{ExtractedDocument, TextExtractor};
pub use reranker::{RerankHit, RerankOptions, RerankerProvider};
pub use store::{DocumentFilter, KnowledgeStore, StoreStats, VectorHit};
pub use tagging::TagGenerator;
