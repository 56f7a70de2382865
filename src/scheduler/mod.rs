//! Deferred write scheduler (spec §4.J).
//!
//! The teacher's source represents "store not ready yet" with a future
//! stashed on the object and sniffed with reflection; spec §9 flags that
//! for redesign as an explicit state machine. Here `ReadyState` is that
//! state machine, guarded by a `tokio::sync::RwLock` the way
//! [`crate::store::LocalStore`] guards its tables, and the deferred
//! chunks sit in a per-document map drained by [`WriteScheduler::flush`]
//! under a single reentrancy flag, mirroring the debounced-writer
//! single-slot-flag shape in [`crate::docindex::snapshot::DebouncedWriter`].

use crate::domain::error::Result;
use crate::domain::ports::store::KnowledgeStore;
use crate::domain::types::Chunk;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::warn;

/// Bounded-timeout retry schedule for [`WriteScheduler::ensure_ready`]
/// (spec §4.J: "30s, 60s, 120s over 3 attempts").
const READY_TIMEOUTS: [Duration; 3] =
    [Duration::from_secs(30), Duration::from_secs(60), Duration::from_secs(120)];
/// Interstitial sleep bounds between retry attempts.
const INTERSTITIAL_MIN: Duration = Duration::from_secs(1);
const INTERSTITIAL_MAX: Duration = Duration::from_secs(5);

/// Lifecycle of the store this scheduler defers writes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Store open/initialize is still in flight.
    Initializing,
    /// Store is open and accepting writes.
    Ready,
    /// Initialization timed out; the store is disabled for the rest of
    /// the process (spec §4.J).
    Disabled,
}

/// Deferred queue of chunks awaiting store readiness, keyed by
/// `document_id` so a flush can batch per-document (spec §4.J).
pub struct WriteScheduler {
    state: RwLock<ReadyState>,
    ready_notify: Notify,
    pending: Mutex<HashMap<String, Vec<Chunk>>>,
    flushing: AtomicBool,
}

impl Default for WriteScheduler {
    fn default() -> Self {
        Self {
            state: RwLock::new(ReadyState::Initializing),
            ready_notify: Notify::new(),
            pending: Mutex::new(HashMap::new()),
            flushing: AtomicBool::new(false),
        }
    }
}

impl WriteScheduler {
    /// Construct a scheduler in the `Initializing` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a scheduler that is already `Ready` (store opened
    /// synchronously, e.g. in tests and the demo binary).
    pub fn ready() -> Self {
        Self {
            state: RwLock::new(ReadyState::Ready),
            ..Self::default()
        }
    }

    /// Current state.
    pub async fn state(&self) -> ReadyState {
        *self.state.read().await
    }

    /// Signal that store initialization completed successfully.
    pub async fn mark_ready(&self) {
        *self.state.write().await = ReadyState::Ready;
        self.ready_notify.notify_waiters();
    }

    /// Signal that store initialization failed permanently.
    pub async fn mark_disabled(&self) {
        *self.state.write().await = ReadyState::Disabled;
        self.ready_notify.notify_waiters();
    }

    /// Await readiness with bounded-timeout retries. Returns `true` once
    /// ready; returns `false` (and transitions to `Disabled`) if every
    /// attempt in [`READY_TIMEOUTS`] times out, or immediately if the
    /// scheduler was already `Disabled`.
    pub async fn ensure_ready(&self) -> bool {
        match self.state().await {
            ReadyState::Ready => return true,
            ReadyState::Disabled => return false,
            ReadyState::Initializing => {}
        }

        for (attempt, timeout) in READY_TIMEOUTS.iter().enumerate() {
            match tokio::time::timeout(*timeout, self.wait_for_resolution()).await {
                Ok(true) => return true,
                Ok(false) => return false,
                Err(_) => {
                    warn!(attempt = attempt + 1, timeout_secs = timeout.as_secs(), "store readiness wait timed out");
                    if attempt + 1 < READY_TIMEOUTS.len() {
                        tokio::time::sleep(interstitial()).await;
                    }
                }
            }
        }
        self.mark_disabled().await;
        false
    }

    async fn wait_for_resolution(&self) -> bool {
        loop {
            match self.state().await {
                ReadyState::Ready => return true,
                ReadyState::Disabled => return false,
                ReadyState::Initializing => self.ready_notify.notified().await,
            }
        }
    }

    /// Enqueue chunks for `document_id`, to be written once the store
    /// becomes ready.
    pub async fn enqueue(&self, document_id: String, chunks: Vec<Chunk>) {
        if chunks.is_empty() {
            return;
        }
        self.pending.lock().await.entry(document_id).or_default().extend(chunks);
    }

    /// Total number of chunks currently deferred.
    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.values().map(Vec::len).sum()
    }

    /// Discard any pending chunks for `document_id` (ingest deletion,
    /// spec §4.F "deletion ... discards any pending chunks in the
    /// scheduler").
    pub async fn discard(&self, document_id: &str) {
        self.pending.lock().await.remove(document_id);
    }

    /// Drain the pending queue into `store`, one `put_chunks` batch per
    /// document; `store`'s own conflict-retry policy applies to each
    /// batch. A reentrancy flag means a flush already in progress makes
    /// this call a no-op rather than racing another flush.
    pub async fn flush(&self, store: &dyn KnowledgeStore) -> Result<()> {
        if self.flushing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let result = self.flush_inner(store).await;
        self.flushing.store(false, Ordering::SeqCst);
        result
    }

    async fn flush_inner(&self, store: &dyn KnowledgeStore) -> Result<()> {
        let batches: Vec<(String, Vec<Chunk>)> = {
            let mut pending = self.pending.lock().await;
            pending.drain().collect()
        };
        for (document_id, chunks) in batches {
            if let Err(err) = store.put_chunks(chunks.clone()).await {
                warn!(%document_id, %err, "flushing deferred chunks failed, re-queueing");
                self.pending.lock().await.entry(document_id).or_default().extend(chunks);
                return Err(err);
            }
        }
        Ok(())
    }
}

fn interstitial() -> Duration {
    let millis = rand::rng().random_range(INTERSTITIAL_MIN.as_millis()..=INTERSTITIAL_MAX.as_millis());
    Duration::from_millis(millis as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Embedding, SchemaVersion};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Mutex as TokioMutex;

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

    struct RecordingStore {
        received: TokioMutex<Vec<Chunk>>,
    }

    #[async_trait]
    impl KnowledgeStore for RecordingStore {
        async fn put_documents(&self, _: Vec<crate::domain::types::Document>) -> Result<()> {
            Ok(())
        }
        async fn put_chunks(&self, chunks: Vec<Chunk>) -> Result<()> {
            self.received.lock().await.extend(chunks);
            Ok(())
        }
        async fn put_code_blocks(&self, _: Vec<crate::domain::types::CodeBlock>) -> Result<()> {
            Ok(())
        }
        async fn put_tags(&self, _: Vec<crate::domain::types::DocumentTag>) -> Result<()> {
            Ok(())
        }
        async fn put_languages(&self, _: Vec<crate::domain::types::DocumentLanguage>) -> Result<()> {
            Ok(())
        }
        async fn put_keywords(&self, _: Vec<crate::domain::types::Keyword>) -> Result<()> {
            Ok(())
        }
        async fn delete_document(&self, _: &str) -> Result<bool> {
            Ok(false)
        }
        async fn delete_crawl_session(&self, _: &str) -> Result<usize> {
            Ok(0)
        }
        async fn get_document(&self, _: &str) -> Result<Option<crate::domain::types::Document>> {
            Ok(None)
        }
        async fn find_by_content_hash(&self, _: &str) -> Result<Option<crate::domain::types::Document>> {
            Ok(None)
        }
        async fn list_documents(
            &self,
            _: &crate::domain::ports::store::DocumentFilter,
            _: usize,
            _: usize,
        ) -> Result<(Vec<crate::domain::types::Document>, usize)> {
            Ok((Vec::new(), 0))
        }
        async fn search_chunks(
            &self,
            _: &Embedding,
            _: usize,
            _: Option<&str>,
        ) -> Result<Vec<crate::domain::ports::store::VectorHit>> {
            Ok(Vec::new())
        }
        async fn search_code_blocks(
            &self,
            _: &Embedding,
            _: usize,
            _: Option<&str>,
        ) -> Result<Vec<crate::domain::ports::store::VectorHit>> {
            Ok(Vec::new())
        }
        async fn chunks_for_document(&self, _: &str) -> Result<Vec<Chunk>> {
            Ok(Vec::new())
        }
        async fn code_blocks_for_document(&self, _: &str) -> Result<Vec<crate::domain::types::CodeBlock>> {
            Ok(Vec::new())
        }
        async fn tags_for_documents(
            &self,
            _: &[String],
        ) -> Result<std::collections::HashMap<String, Vec<crate::domain::types::DocumentTag>>> {
            Ok(Default::default())
        }
        async fn languages_for_documents(
            &self,
            _: &[String],
        ) -> Result<std::collections::HashMap<String, Vec<String>>> {
            Ok(Default::default())
        }
        async fn keyword_search(&self, _: &[String], _: usize) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn stats(&self) -> Result<crate::domain::ports::store::StoreStats> {
            Ok(Default::default())
        }
        async fn schema_version(&self) -> Result<SchemaVersion> {
            Ok(SchemaVersion { version: 1, applied_at: 0 })
        }
    }

    #[tokio::test]
    async fn ensure_ready_returns_true_immediately_when_already_ready() {
        let scheduler = WriteScheduler::ready();
        assert!(scheduler.ensure_ready().await);
    }

    #[tokio::test]
    async fn ensure_ready_resolves_once_marked_ready_concurrently() {
        let scheduler = Arc::new(WriteScheduler::new());
        let waiter = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.ensure_ready().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        scheduler.mark_ready().await;
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn enqueue_and_flush_drains_pending_chunks_per_document() {
        let scheduler = WriteScheduler::new();
        scheduler.enqueue("d1".into(), vec![chunk("d1_chunk_0", "d1")]).await;
        scheduler.enqueue("d2".into(), vec![chunk("d2_chunk_0", "d2")]).await;
        assert_eq!(scheduler.pending_len().await, 2);

        let store = RecordingStore { received: TokioMutex::new(Vec::new()) };
        scheduler.flush(&store).await.unwrap();
        assert_eq!(scheduler.pending_len().await, 0);
        assert_eq!(store.received.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn discard_drops_pending_chunks_for_one_document() {
        let scheduler = WriteScheduler::new();
        scheduler.enqueue("d1".into(), vec![chunk("d1_chunk_0", "d1")]).await;
        scheduler.discard("d1").await;
        assert_eq!(scheduler.pending_len().await, 0);
    }

    #[tokio::test]
    async fn reentrant_flush_is_a_no_op_while_one_is_in_progress() {
        let scheduler = WriteScheduler::new();
        scheduler.enqueue("d1".into(), vec![chunk("d1_chunk_0", "d1")]).await;
        scheduler.flushing.store(true, Ordering::SeqCst);

        let store = RecordingStore { received: TokioMutex::new(Vec::new()) };
        scheduler.flush(&store).await.unwrap();

        assert_eq!(store.received.lock().await.len(), 0);
        assert_eq!(scheduler.pending_len().await, 1, "pending chunks stay queued, not dropped");
    }
}
