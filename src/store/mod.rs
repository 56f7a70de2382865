//! Local, single-node implementation of [`KnowledgeStore`] (spec §4.C).
//!
//! Rows live in a [`Tables`] guarded by a `tokio::sync::RwLock`; writes are
//! batched (spec default: 1000 rows per append) and wrapped in
//! [`retry::with_conflict_retry`]; every write also schedules a debounced
//! snapshot flush rather than fsyncing per call, mirroring the teacher's
//! `infrastructure/cache` write-behind posture.

pub mod index;
pub mod persistence;
pub mod retry;
pub mod tables;

use crate::domain::error::{Error, Result};
use crate::domain::ports::store::{DocumentFilter, KnowledgeStore, StoreStats, VectorHit};
use crate::domain::types::{
    Chunk, CodeBlock, Document, DocumentLanguage, DocumentStatus, DocumentTag, Embedding, Keyword,
    SchemaVersion, CURRENT_SCHEMA_VERSION,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tables::Tables;
use tokio::sync::{Notify, RwLock};

/// Number of rows flushed to disk per batch append.
pub const DEFAULT_BATCH_SIZE: usize = 1000;
/// How long a dirty store waits before flushing a snapshot.
const FLUSH_DEBOUNCE: std::time::Duration = std::time::Duration::from_millis(200);

/// Local on-disk store. Opens (or creates) a snapshot file at `path` and
/// keeps every table in memory, rebuilding indexes from the snapshot on
/// open.
pub struct LocalStore {
    path: PathBuf,
    tables: RwLock<Tables>,
    dirty: AtomicBool,
    flush_notify: Notify,
}

impl LocalStore {
    /// Open (or create) a store at `path`. Fails with
    /// [`Error::SchemaMismatch`] if an existing snapshot was written by an
    /// incompatible schema version.
    pub async fn open(path: PathBuf, hnsw_enabled: bool) -> Result<Self> {
        let tables = match persistence::load(&path).await? {
            Some(rows) => {
                if let Some(version) = &rows.schema_version {
                    if version.version != CURRENT_SCHEMA_VERSION {
                        return Err(Error::SchemaMismatch {
                            path: path.display().to_string(),
                            expected: CURRENT_SCHEMA_VERSION,
                            found: version.version,
                        });
                    }
                }
                Tables::from_rows(rows, hnsw_enabled)
            }
            None => Tables::new(hnsw_enabled),
        };
        Ok(Self {
            path,
            tables: RwLock::new(tables),
            dirty: AtomicBool::new(false),
            flush_notify: Notify::new(),
        })
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
        self.flush_notify.notify_one();
    }

    /// Force an immediate snapshot write regardless of debounce state.
    pub async fn flush(&self) -> Result<()> {
        let rows = self.tables.read().await.rows.clone();
        persistence::save(&self.path, &rows).await?;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Background task: wait for dirty writes, debounce, then flush. Runs
    /// until the returned future is dropped or the store is dropped.
    pub async fn run_flush_loop(&self) {
        loop {
            self.flush_notify.notified().await;
            tokio::time::sleep(FLUSH_DEBOUNCE).await;
            if self.dirty.load(Ordering::SeqCst) {
                if let Err(err) = self.flush().await {
                    tracing::warn!(%err, "snapshot flush failed");
                }
            }
        }
    }

    fn document_matches(doc: &Document, filter: &DocumentFilter, tags: &HashSet<String>, languages: &HashSet<String>) -> bool {
        let status = filter.status.unwrap_or(DocumentStatus::Active);
        if doc.status != status {
            return false;
        }
        if !filter.tags.is_empty() && !filter.tags.iter().any(|t| tags.contains(t)) {
            return false;
        }
        if let Some(source) = &filter.source {
            if format!("{:?}", doc.source).to_lowercase() != source.to_lowercase() {
                return false;
            }
        }
        if let Some(crawl_id) = &filter.crawl_id {
            if doc.crawl_id.as_deref() != Some(crawl_id.as_str()) {
                return false;
            }
        }
        if let Some(author) = &filter.author {
            if doc.author.as_deref() != Some(author.as_str()) {
                return false;
            }
        }
        if let Some(content_type) = &filter.content_type {
            if doc.content_type.as_deref() != Some(content_type.as_str()) {
                return false;
            }
        }
        if !filter.languages.is_empty() {
            let accepts_unknown = filter.languages.iter().any(|l| l == "unknown");
            let matches = filter.languages.iter().any(|l| languages.contains(l))
                || (accepts_unknown && languages.is_empty());
            if !matches {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl KnowledgeStore for LocalStore {
    async fn put_documents(&self, documents: Vec<Document>) -> Result<()> {
        for batch in documents.chunks(DEFAULT_BATCH_SIZE) {
            let batch = batch.to_vec();
            retry::with_conflict_retry(|| async {
                let mut tables = self.tables.write().await;
                for doc in &batch {
                    if let Some(existing) = tables.rows.documents.get(&doc.id).cloned() {
                        tables.unindex_document(&existing);
                    }
                    tables.index_document(doc);
                    tables.rows.documents.insert(doc.id.clone(), doc.clone());
                }
                Ok(())
            })
            .await?;
        }
        self.mark_dirty();
        Ok(())
    }

    async fn put_chunks(&self, chunks: Vec<Chunk>) -> Result<()> {
        for chunk in &chunks {
            if chunk.embedding.vector.is_empty() {
                return Err(Error::validation(format!(
                    "chunk {} has an empty embedding",
                    chunk.id
                )));
            }
        }
        for batch in chunks.chunks(DEFAULT_BATCH_SIZE) {
            let batch = batch.to_vec();
            retry::with_conflict_retry(|| async {
                let mut tables = self.tables.write().await;
                for chunk in &batch {
                    tables
                        .chunks_by_document
                        .insert(chunk.document_id.clone(), chunk.id.clone());
                    tables
                        .chunk_vectors
                        .insert(chunk.id.clone(), chunk.embedding.vector.clone());
                    tables.rows.chunks.insert(chunk.id.clone(), chunk.clone());
                }
                Ok(())
            })
            .await?;
        }
        self.mark_dirty();
        Ok(())
    }

    async fn put_code_blocks(&self, blocks: Vec<CodeBlock>) -> Result<()> {
        for batch in blocks.chunks(DEFAULT_BATCH_SIZE) {
            let batch = batch.to_vec();
            retry::with_conflict_retry(|| async {
                let mut tables = self.tables.write().await;
                for block in &batch {
                    tables
                        .code_blocks_by_document
                        .insert(block.document_id.clone(), block.id.clone());
                    tables
                        .code_blocks_by_language
                        .insert(block.language.clone(), block.id.clone());
                    tables
                        .code_block_vectors
                        .insert(block.id.clone(), block.embedding.vector.clone());
                    tables.rows.code_blocks.insert(block.id.clone(), block.clone());
                }
                Ok(())
            })
            .await?;
        }
        self.mark_dirty();
        Ok(())
    }

    async fn put_tags(&self, tags: Vec<DocumentTag>) -> Result<()> {
        let mut tables = self.tables.write().await;
        for tag in tags {
            if !tables.rows.tags.contains(&tag) {
                tables.rows.tags.push(tag);
            }
        }
        drop(tables);
        self.mark_dirty();
        Ok(())
    }

    async fn put_languages(&self, languages: Vec<DocumentLanguage>) -> Result<()> {
        let mut tables = self.tables.write().await;
        for lang in languages {
            if !tables.rows.languages.contains(&lang) {
                tables.rows.languages.push(lang);
            }
        }
        drop(tables);
        self.mark_dirty();
        Ok(())
    }

    async fn put_keywords(&self, keywords: Vec<Keyword>) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.rows.keywords.extend(keywords);
        drop(tables);
        self.mark_dirty();
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(doc) = tables.rows.documents.remove(id) else {
            return Ok(false);
        };
        tables.unindex_document(&doc);

        let mut failures = Vec::new();

        let chunk_ids: Vec<String> = tables
            .rows
            .chunks
            .values()
            .filter(|c| c.document_id == id)
            .map(|c| c.id.clone())
            .collect();
        for chunk_id in chunk_ids {
            match tables.rows.chunks.remove(&chunk_id) {
                Some(chunk) => tables.remove_chunk(&chunk),
                None => failures.push(crate::domain::error::CascadeFailure {
                    table: "chunks".into(),
                    message: format!("chunk {chunk_id} missing during cascade"),
                }),
            }
        }

        let block_ids: Vec<String> = tables
            .rows
            .code_blocks
            .values()
            .filter(|b| b.document_id == id)
            .map(|b| b.id.clone())
            .collect();
        for block_id in block_ids {
            match tables.rows.code_blocks.remove(&block_id) {
                Some(block) => tables.remove_code_block(&block),
                None => failures.push(crate::domain::error::CascadeFailure {
                    table: "code_blocks".into(),
                    message: format!("code block {block_id} missing during cascade"),
                }),
            }
        }

        tables.rows.tags.retain(|t| t.document_id != id);
        tables.rows.languages.retain(|l| l.document_id != id);
        tables.rows.keywords.retain(|k| k.document_id != id);
        drop(tables);
        self.mark_dirty();

        if !failures.is_empty() {
            return Err(Error::Cascade(failures));
        }
        Ok(true)
    }

    async fn delete_crawl_session(&self, crawl_id: &str) -> Result<usize> {
        let ids: Vec<String> = {
            let tables = self.tables.read().await;
            tables
                .rows
                .documents
                .values()
                .filter(|d| d.crawl_id.as_deref() == Some(crawl_id))
                .map(|d| d.id.clone())
                .collect()
        };
        let mut removed = 0usize;
        let mut failures = Vec::new();
        for id in ids {
            match self.delete_document(&id).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(Error::Cascade(mut inner)) => {
                    removed += 1;
                    failures.append(&mut inner);
                }
                Err(other) => failures.push(crate::domain::error::CascadeFailure {
                    table: "documents".into(),
                    message: format!("deleting {id}: {other}"),
                }),
            }
        }
        if !failures.is_empty() {
            return Err(Error::Cascade(failures));
        }
        Ok(removed)
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.tables.read().await.rows.documents.get(id).cloned())
    }

    async fn find_by_content_hash(&self, hash: &str) -> Result<Option<Document>> {
        let tables = self.tables.read().await;
        let ids = tables.documents_by_content_hash.get(&hash.to_string());
        Ok(ids
            .iter()
            .next()
            .and_then(|id| tables.rows.documents.get(id))
            .cloned())
    }

    async fn list_documents(
        &self,
        filter: &DocumentFilter,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Document>, usize)> {
        let tables = self.tables.read().await;
        let mut matched: Vec<&Document> = tables
            .rows
            .documents
            .values()
            .filter(|doc| {
                let tags: HashSet<String> = tables
                    .rows
                    .tags
                    .iter()
                    .filter(|t| t.document_id == doc.id)
                    .map(|t| t.tag.clone())
                    .collect();
                let languages: HashSet<String> = tables
                    .rows
                    .languages
                    .iter()
                    .filter(|l| l.document_id == doc.id)
                    .map(|l| l.language_code.clone())
                    .collect();
                Self::document_matches(doc, filter, &tags, &languages)
            })
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matched.len();
        let page = matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn search_chunks(
        &self,
        query: &Embedding,
        limit: usize,
        document_id: Option<&str>,
    ) -> Result<Vec<VectorHit>> {
        let tables = self.tables.read().await;
        let hits = tables.chunk_vectors.search(query, limit, |id| {
            document_id.is_none_or(|doc_id| {
                tables
                    .rows
                    .chunks
                    .get(id)
                    .is_some_and(|c| c.document_id == doc_id)
            })
        });
        Ok(hits
            .into_iter()
            .filter_map(|(row_id, distance)| {
                tables.rows.chunks.get(&row_id).map(|c| VectorHit {
                    row_id,
                    document_id: c.document_id.clone(),
                    distance,
                })
            })
            .collect())
    }

    async fn search_code_blocks(
        &self,
        query: &Embedding,
        limit: usize,
        language: Option<&str>,
    ) -> Result<Vec<VectorHit>> {
        let tables = self.tables.read().await;
        let hits = tables.code_block_vectors.search(query, limit, |id| {
            language.is_none_or(|lang| {
                tables
                    .rows
                    .code_blocks
                    .get(id)
                    .is_some_and(|b| b.language == lang)
            })
        });
        Ok(hits
            .into_iter()
            .filter_map(|(row_id, distance)| {
                tables.rows.code_blocks.get(&row_id).map(|b| VectorHit {
                    row_id,
                    document_id: b.document_id.clone(),
                    distance,
                })
            })
            .collect())
    }

    async fn chunks_for_document(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let tables = self.tables.read().await;
        let mut chunks: Vec<Chunk> = tables
            .chunks_by_document
            .get(&document_id.to_string())
            .iter()
            .filter_map(|id| tables.rows.chunks.get(id).cloned())
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn code_blocks_for_document(&self, document_id: &str) -> Result<Vec<CodeBlock>> {
        let tables = self.tables.read().await;
        let mut blocks: Vec<CodeBlock> = tables
            .code_blocks_by_document
            .get(&document_id.to_string())
            .iter()
            .filter_map(|id| tables.rows.code_blocks.get(id).cloned())
            .collect();
        blocks.sort_by_key(|b| b.block_index);
        Ok(blocks)
    }

    async fn tags_for_documents(
        &self,
        document_ids: &[String],
    ) -> Result<HashMap<String, Vec<DocumentTag>>> {
        let tables = self.tables.read().await;
        let wanted: HashSet<&String> = document_ids.iter().collect();
        let mut out: HashMap<String, Vec<DocumentTag>> = HashMap::new();
        for tag in tables.rows.tags.iter().filter(|t| wanted.contains(&t.document_id)) {
            out.entry(tag.document_id.clone()).or_default().push(tag.clone());
        }
        Ok(out)
    }

    async fn languages_for_documents(
        &self,
        document_ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>> {
        let tables = self.tables.read().await;
        let wanted: HashSet<&String> = document_ids.iter().collect();
        let mut out: HashMap<String, Vec<String>> = HashMap::new();
        for lang in tables
            .rows
            .languages
            .iter()
            .filter(|l| wanted.contains(&l.document_id))
        {
            out.entry(lang.document_id.clone())
                .or_default()
                .push(lang.language_code.clone());
        }
        Ok(out)
    }

    async fn keyword_search(&self, words: &[String], limit: usize) -> Result<Vec<String>> {
        let tables = self.tables.read().await;
        let wanted: HashSet<String> = words.iter().map(|w| w.to_lowercase()).collect();
        let mut scores: HashMap<String, u32> = HashMap::new();
        for keyword in tables
            .rows
            .keywords
            .iter()
            .filter(|k| wanted.contains(&k.keyword))
        {
            *scores.entry(keyword.document_id.clone()).or_insert(0) += keyword.frequency;
        }
        let mut ranked: Vec<(String, u32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(limit);
        Ok(ranked.into_iter().map(|(id, _)| id).collect())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let tables = self.tables.read().await;
        let keywords: HashSet<&String> = tables.rows.keywords.iter().map(|k| &k.keyword).collect();
        Ok(StoreStats {
            documents: tables
                .rows
                .documents
                .values()
                .filter(|d| d.status == DocumentStatus::Active)
                .count(),
            chunks: tables.rows.chunks.len(),
            code_blocks: tables.rows.code_blocks.len(),
            keywords: keywords.len(),
        })
    }

    async fn schema_version(&self) -> Result<SchemaVersion> {
        let tables = self.tables.read().await;
        Ok(tables.rows.schema_version.unwrap_or(SchemaVersion {
            version: CURRENT_SCHEMA_VERSION,
            applied_at: 0,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(id: &str, status: DocumentStatus) -> Document {
        let now = Utc::now();
        Document {
            id: id.into(),
            title: format!("doc {id}"),
            content: "hello world".into(),
            content_hash: format!("hash-{id}"),
            content_length: 11,
            source: crate::domain::types::DocumentSource::Upload,
            original_filename: None,
            file_extension: None,
            crawl_id: None,
            crawl_url: None,
            author: None,
            description: None,
            content_type: None,
            created_at: now,
            updated_at: now,
            processed_at: now,
            chunks_count: 0,
            code_blocks_count: 0,
            status,
        }
    }

    fn embedding(v: Vec<f32>) -> Embedding {
        Embedding { vector: v, model: "t".into() }
    }

    fn chunk(id: &str, document_id: &str, index: usize, vector: Vec<f32>) -> Chunk {
        Chunk {
            id: id.into(),
            document_id: document_id.into(),
            chunk_index: index,
            start_position: 0,
            end_position: 11,
            content: "hello world".into(),
            content_length: 11,
            embedding: embedding(vector),
            surrounding_context: None,
            semantic_topic: None,
            created_at: Utc::now(),
        }
    }

    async fn open_temp() -> (LocalStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let store = LocalStore::open(path, false).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn put_and_get_document_round_trips() {
        let (store, _dir) = open_temp().await;
        store.put_documents(vec![doc("d1", DocumentStatus::Active)]).await.unwrap();
        let fetched = store.get_document("d1").await.unwrap().unwrap();
        assert_eq!(fetched.title, "doc d1");
    }

    #[tokio::test]
    async fn delete_document_cascades_to_chunks() {
        let (store, _dir) = open_temp().await;
        store.put_documents(vec![doc("d1", DocumentStatus::Active)]).await.unwrap();
        store
            .put_chunks(vec![chunk("d1_chunk_0", "d1", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        assert!(store.delete_document("d1").await.unwrap());
        assert!(store.chunks_for_document("d1").await.unwrap().is_empty());
        assert!(store.get_document("d1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_missing_document_returns_false() {
        let (store, _dir) = open_temp().await;
        assert!(!store.delete_document("nope").await.unwrap());
    }

    #[tokio::test]
    async fn search_chunks_scopes_to_document_when_requested() {
        let (store, _dir) = open_temp().await;
        store
            .put_documents(vec![doc("d1", DocumentStatus::Active), doc("d2", DocumentStatus::Active)])
            .await
            .unwrap();
        store
            .put_chunks(vec![
                chunk("d1_chunk_0", "d1", 0, vec![1.0, 0.0]),
                chunk("d2_chunk_0", "d2", 0, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();
        let hits = store
            .search_chunks(&embedding(vec![1.0, 0.0]), 10, Some("d1"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, "d1");
    }

    #[tokio::test]
    async fn list_documents_paginates_and_reports_total() {
        let (store, _dir) = open_temp().await;
        store
            .put_documents(vec![
                doc("d1", DocumentStatus::Active),
                doc("d2", DocumentStatus::Active),
                doc("d3", DocumentStatus::Active),
            ])
            .await
            .unwrap();
        let (page, total) = store
            .list_documents(&DocumentFilter::default(), 0, 2)
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        {
            let store = LocalStore::open(path.clone(), false).await.unwrap();
            store.put_documents(vec![doc("d1", DocumentStatus::Active)]).await.unwrap();
            store.flush().await.unwrap();
        }
        let reopened = LocalStore::open(path, false).await.unwrap();
        assert!(reopened.get_document("d1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn fresh_store_inserts_the_schema_version_row_on_first_init() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let store = LocalStore::open(path.clone(), false).await.unwrap();
        assert_eq!(store.schema_version().await.unwrap().version, CURRENT_SCHEMA_VERSION);

        store.flush().await.unwrap();
        let persisted = persistence::load(&path).await.unwrap().unwrap();
        assert_eq!(persisted.schema_version.map(|v| v.version), Some(CURRENT_SCHEMA_VERSION));
    }

    #[tokio::test]
    async fn schema_mismatch_is_rejected_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let mut rows = tables::TableRows::default();
        rows.schema_version = Some(SchemaVersion { version: 9999, applied_at: 0 });
        persistence::save(&path, &rows).await.unwrap();
        let result = LocalStore::open(path, false).await;
        assert!(matches!(result, Err(Error::SchemaMismatch { .. })));
    }
}
