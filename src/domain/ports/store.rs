//! The store's capability-set contract.
//!
//! Spec §9 flags the teacher's duck-typed store interface (reflection
//! sniffing for optional methods like `addCodeBlocks`) as needing a
//! redesign: here the full capability set is a single trait and code
//! block support is not optional.

use crate::domain::error::Result;
use crate::domain::types::{
    Chunk, CodeBlock, Document, DocumentLanguage, DocumentTag, Embedding, Keyword, SchemaVersion,
};
use async_trait::async_trait;
use std::collections::HashMap;

/// One hit from a vector search: the matched row id, its owning
/// document id, and the cosine distance to the query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    /// Id of the matched chunk or code block row.
    pub row_id: String,
    /// Id of the document that owns the matched row.
    pub document_id: String,
    /// Cosine distance to the query vector (`0` = identical direction).
    pub distance: f32,
}

/// Scalar filter applied to `list_documents` and (post-join) to query
/// results. All present fields are ANDed together.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    /// Document must have at least one of these tags.
    pub tags: Vec<String>,
    /// Document source must equal this value.
    pub source: Option<String>,
    /// Document crawl_id must equal this value.
    pub crawl_id: Option<String>,
    /// Document author must equal this value.
    pub author: Option<String>,
    /// Document content_type must equal this value.
    pub content_type: Option<String>,
    /// Document must have at least one language in this set (or, if the
    /// set contains `"unknown"`, may have no recorded language at all).
    pub languages: Vec<String>,
    /// Only documents with this status are returned. Defaults to Active.
    pub status: Option<crate::domain::types::DocumentStatus>,
}

/// Aggregate counts describing the current store contents.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    /// Number of active documents.
    pub documents: usize,
    /// Number of persisted chunks.
    pub chunks: usize,
    /// Number of persisted code blocks.
    pub code_blocks: usize,
    /// Number of distinct keywords indexed.
    pub keywords: usize,
}

/// The full capability set the engine needs from its vector/metadata
/// store (spec §4.C). One production implementation
/// ([`crate::store::LocalStore`]) backs this; tests may substitute a
/// smaller in-memory double.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Append or replace document rows.
    async fn put_documents(&self, documents: Vec<Document>) -> Result<()>;
    /// Append chunk rows. Rejects any chunk whose embedding is empty or
    /// of the wrong dimension.
    async fn put_chunks(&self, chunks: Vec<Chunk>) -> Result<()>;
    /// Append code-block rows.
    async fn put_code_blocks(&self, blocks: Vec<CodeBlock>) -> Result<()>;
    /// Append document-tag rows.
    async fn put_tags(&self, tags: Vec<DocumentTag>) -> Result<()>;
    /// Append document-language rows.
    async fn put_languages(&self, languages: Vec<DocumentLanguage>) -> Result<()>;
    /// Append keyword rows.
    async fn put_keywords(&self, keywords: Vec<Keyword>) -> Result<()>;

    /// Delete a document and cascade to every dependent table. Returns
    /// `Ok(false)` if the document did not exist.
    async fn delete_document(&self, id: &str) -> Result<bool>;
    /// Delete every document sharing `crawl_id` and cascade. Returns the
    /// count of documents removed; per-entity failures are reported as
    /// `Error::Cascade` without aborting the rest of the batch.
    async fn delete_crawl_session(&self, crawl_id: &str) -> Result<usize>;

    /// Fetch a single document by id.
    async fn get_document(&self, id: &str) -> Result<Option<Document>>;
    /// Look up a document by its full content hash (dedup key).
    async fn find_by_content_hash(&self, hash: &str) -> Result<Option<Document>>;
    /// Paginated, filtered document listing. Returns the page and the
    /// total count of documents surviving the filter.
    async fn list_documents(
        &self,
        filter: &DocumentFilter,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Document>, usize)>;

    /// Vector search over chunks, optionally scoped to one document.
    async fn search_chunks(
        &self,
        query: &Embedding,
        limit: usize,
        document_id: Option<&str>,
    ) -> Result<Vec<VectorHit>>;
    /// Vector search over code blocks, optionally filtered by language.
    async fn search_code_blocks(
        &self,
        query: &Embedding,
        limit: usize,
        language: Option<&str>,
    ) -> Result<Vec<VectorHit>>;

    /// All chunks belonging to one document, ordered by `chunk_index`.
    async fn chunks_for_document(&self, document_id: &str) -> Result<Vec<Chunk>>;
    /// All code blocks belonging to one document, ordered by `block_index`.
    async fn code_blocks_for_document(&self, document_id: &str) -> Result<Vec<CodeBlock>>;
    /// Tags for a set of documents, keyed by document id.
    async fn tags_for_documents(
        &self,
        document_ids: &[String],
    ) -> Result<HashMap<String, Vec<DocumentTag>>>;
    /// Language codes for a set of documents, keyed by document id.
    async fn languages_for_documents(
        &self,
        document_ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>>;

    /// Documents whose title or content keywords intersect `words`,
    /// with a default relevance score (spec §4.G step 7).
    async fn keyword_search(&self, words: &[String], limit: usize) -> Result<Vec<String>>;

    /// Current aggregate counts.
    async fn stats(&self) -> Result<StoreStats>;
    /// The schema version recorded in the store.
    async fn schema_version(&self) -> Result<SchemaVersion>;
}
