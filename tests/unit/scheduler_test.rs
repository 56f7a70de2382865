//! Cross-cutting [`WriteScheduler`] behavior not already exercised by
//! its own unit tests: permanent disablement, and a flush failure
//! re-queueing chunks instead of dropping them (spec §4.J).

use async_trait::async_trait;
use saga::domain::ports::store::{DocumentFilter, StoreStats, VectorHit};
use saga::domain::ports::KnowledgeStore;
use saga::{
    Chunk, CodeBlock, Document, DocumentLanguage, DocumentTag, Embedding, Keyword, ReadyState,
    Result, SchemaVersion, WriteScheduler,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn chunk(id: &str, document_id: &str) -> Chunk {
    Chunk {
        id: id.into(),
        document_id: document_id.into(),
        chunk_index: 0,
        start_position: 0,
        end_position: 5,
        content: "hello".into(),
        content_length: 5,
        embedding: Embedding { vector: vec![1.0, 0.0], model: "t".into() },
        surrounding_context: None,
        semantic_topic: None,
        created_at: chrono::Utc::now(),
    }
}

/// A store whose `put_chunks` always fails, to exercise the
/// scheduler's re-queue-on-failure path.
struct FailingStore;

#[async_trait]
impl KnowledgeStore for FailingStore {
    async fn put_documents(&self, _: Vec<Document>) -> Result<()> {
        Ok(())
    }
    async fn put_chunks(&self, _: Vec<Chunk>) -> Result<()> {
        Err(saga::Error::provider_unavailable("store offline"))
    }
    async fn put_code_blocks(&self, _: Vec<CodeBlock>) -> Result<()> {
        Ok(())
    }
    async fn put_tags(&self, _: Vec<DocumentTag>) -> Result<()> {
        Ok(())
    }
    async fn put_languages(&self, _: Vec<DocumentLanguage>) -> Result<()> {
        Ok(())
    }
    async fn put_keywords(&self, _: Vec<Keyword>) -> Result<()> {
        Ok(())
    }
    async fn delete_document(&self, _: &str) -> Result<bool> {
        Ok(false)
    }
    async fn delete_crawl_session(&self, _: &str) -> Result<usize> {
        Ok(0)
    }
    async fn get_document(&self, _: &str) -> Result<Option<Document>> {
        Ok(None)
    }
    async fn find_by_content_hash(&self, _: &str) -> Result<Option<Document>> {
        Ok(None)
    }
    async fn list_documents(&self, _: &DocumentFilter, _: usize, _: usize) -> Result<(Vec<Document>, usize)> {
        Ok((Vec::new(), 0))
    }
    async fn search_chunks(&self, _: &Embedding, _: usize, _: Option<&str>) -> Result<Vec<VectorHit>> {
        Ok(Vec::new())
    }
    async fn search_code_blocks(&self, _: &Embedding, _: usize, _: Option<&str>) -> Result<Vec<VectorHit>> {
        Ok(Vec::new())
    }
    async fn chunks_for_document(&self, _: &str) -> Result<Vec<Chunk>> {
        Ok(Vec::new())
    }
    async fn code_blocks_for_document(&self, _: &str) -> Result<Vec<CodeBlock>> {
        Ok(Vec::new())
    }
    async fn tags_for_documents(&self, _: &[String]) -> Result<HashMap<String, Vec<DocumentTag>>> {
        Ok(Default::default())
    }
    async fn languages_for_documents(&self, _: &[String]) -> Result<HashMap<String, Vec<String>>> {
        Ok(Default::default())
    }
    async fn keyword_search(&self, _: &[String], _: usize) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
    async fn stats(&self) -> Result<StoreStats> {
        Ok(Default::default())
    }
    async fn schema_version(&self) -> Result<SchemaVersion> {
        Ok(SchemaVersion { version: 1, applied_at: 0 })
    }
}

#[tokio::test]
async fn ensure_ready_returns_false_once_disabled() {
    let scheduler = WriteScheduler::new();
    scheduler.mark_disabled().await;
    assert!(!scheduler.ensure_ready().await);
    assert_eq!(scheduler.state().await, ReadyState::Disabled);
}

#[tokio::test]
async fn waiters_resolve_to_false_when_disabled_concurrently() {
    let scheduler = Arc::new(WriteScheduler::new());
    let waiter = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.ensure_ready().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    scheduler.mark_disabled().await;
    assert!(!waiter.await.unwrap());
}

#[tokio::test]
async fn failed_flush_requeues_chunks_instead_of_dropping_them() {
    let scheduler = WriteScheduler::ready();
    scheduler.enqueue("d1".into(), vec![chunk("d1_chunk_0", "d1")]).await;

    let err = scheduler.flush(&FailingStore).await.unwrap_err();
    assert!(format!("{err}").contains("store offline"));
    assert_eq!(scheduler.pending_len().await, 1, "failed batch must stay queued for a later retry");
}

#[tokio::test]
async fn enqueueing_an_empty_batch_is_a_no_op() {
    let scheduler = WriteScheduler::new();
    scheduler.enqueue("d1".into(), Vec::new()).await;
    assert_eq!(scheduler.pending_len().await, 0);
}
