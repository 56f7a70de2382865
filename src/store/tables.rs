//! In-memory columnar tables backing [`crate::store::LocalStore`] (spec §3,
//! §4.C): seven tables, plus the scalar/vector indexes kept over them.

use super::index::scalar::{BitmapIndex, BtreeIndex};
use super::index::VectorIndex;
use crate::domain::types::{
    Chunk, CodeBlock, Document, DocumentLanguage, DocumentStatus, DocumentTag, Keyword,
    SchemaVersion, CURRENT_SCHEMA_VERSION,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The store's full persisted state. Serialized wholesale by
/// [`super::persistence`]; indexes are rebuilt from these rows on load
/// rather than persisted themselves.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TableRows {
    pub documents: HashMap<String, Document>,
    pub chunks: HashMap<String, Chunk>,
    pub code_blocks: HashMap<String, CodeBlock>,
    pub tags: Vec<DocumentTag>,
    pub languages: Vec<DocumentLanguage>,
    pub keywords: Vec<Keyword>,
    pub schema_version: Option<SchemaVersion>,
}

/// Rows plus the indexes maintained over them. Not itself serialized;
/// rebuilt by [`Tables::reindex`] after loading [`TableRows`].
pub struct Tables {
    pub rows: TableRows,

    pub documents_by_source: BitmapIndex<String>,
    pub documents_by_status: BitmapIndex<DocumentStatus>,
    pub documents_by_content_hash: BtreeIndex<String>,
    pub documents_by_crawl_id: BtreeIndex<String>,

    pub chunks_by_document: BtreeIndex<String>,
    pub chunk_vectors: VectorIndex,

    pub code_blocks_by_document: BtreeIndex<String>,
    pub code_blocks_by_language: BitmapIndex<String>,
    pub code_block_vectors: VectorIndex,
}

impl Tables {
    pub fn new(hnsw_enabled: bool) -> Self {
        let mut tables = Self {
            rows: TableRows::default(),
            documents_by_source: BitmapIndex::new(),
            documents_by_status: BitmapIndex::new(),
            documents_by_content_hash: BtreeIndex::new(),
            documents_by_crawl_id: BtreeIndex::new(),
            chunks_by_document: BtreeIndex::new(),
            chunk_vectors: VectorIndex::new(hnsw_enabled),
            code_blocks_by_document: BtreeIndex::new(),
            code_blocks_by_language: BitmapIndex::new(),
            code_block_vectors: VectorIndex::new(hnsw_enabled),
        };
        // Spec §4.C: a missing schema_version row is inserted on first
        // init, which for a brand-new store is right here rather than in
        // `reindex` (that path only ever runs for a *reloaded* snapshot).
        tables.ensure_schema_version();
        tables
    }

    /// Rebuild every index from `rows` (used after loading a persisted
    /// snapshot, whose indexes are never themselves serialized).
    pub fn from_rows(rows: TableRows, hnsw_enabled: bool) -> Self {
        let mut tables = Self::new(hnsw_enabled);
        tables.rows = rows;
        tables.reindex();
        tables
    }

    pub fn reindex(&mut self) {
        for doc in self.rows.documents.values() {
            self.index_document(doc);
        }
        for chunk in self.rows.chunks.values() {
            self.chunks_by_document.insert(chunk.document_id.clone(), chunk.id.clone());
            self.chunk_vectors.insert(chunk.id.clone(), chunk.embedding.vector.clone());
        }
        for block in self.rows.code_blocks.values() {
            self.code_blocks_by_document.insert(block.document_id.clone(), block.id.clone());
            self.code_blocks_by_language.insert(block.language.clone(), block.id.clone());
            self.code_block_vectors.insert(block.id.clone(), block.embedding.vector.clone());
        }
        self.ensure_schema_version();
    }

    fn ensure_schema_version(&mut self) {
        if self.rows.schema_version.is_none() {
            self.rows.schema_version = Some(SchemaVersion {
                version: CURRENT_SCHEMA_VERSION,
                applied_at: 0,
            });
        }
    }

    pub fn index_document(&mut self, doc: &Document) {
        self.documents_by_source.insert(format!("{:?}", doc.source).to_lowercase(), doc.id.clone());
        self.documents_by_status.insert(doc.status, doc.id.clone());
        self.documents_by_content_hash.insert(doc.content_hash.clone(), doc.id.clone());
        if let Some(crawl_id) = &doc.crawl_id {
            self.documents_by_crawl_id.insert(crawl_id.clone(), doc.id.clone());
        }
    }

    pub fn unindex_document(&mut self, doc: &Document) {
        self.documents_by_source.remove(&format!("{:?}", doc.source).to_lowercase(), &doc.id);
        self.documents_by_status.remove(&doc.status, &doc.id);
        self.documents_by_content_hash.remove(&doc.content_hash, &doc.id);
        if let Some(crawl_id) = &doc.crawl_id {
            self.documents_by_crawl_id.remove(crawl_id, &doc.id);
        }
    }

    pub fn remove_chunk(&mut self, chunk: &Chunk) {
        self.chunks_by_document.remove(&chunk.document_id, &chunk.id);
        self.chunk_vectors.remove(&chunk.id);
    }

    pub fn remove_code_block(&mut self, block: &CodeBlock) {
        self.code_blocks_by_document.remove(&block.document_id, &block.id);
        self.code_blocks_by_language.remove(&block.language, &block.id);
        self.code_block_vectors.remove(&block.id);
    }
}
