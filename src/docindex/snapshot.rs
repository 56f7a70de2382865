//! Debounced persistence for [`super::DocumentIndex`] (spec §4.D): a
//! mutation schedules a write ~200ms later, coalescing bursts, rather than
//! fsyncing on every call. Grounded on [`crate::store::persistence`]'s
//! bincode snapshot shape, with its own schema tag since the index's
//! on-disk layout versions independently of the store's.
//!
//! On startup, if the snapshot is empty but the store already has
//! documents, the caller should rebuild the index in one pass over the
//! store with auto-save suppressed (`rebuild_from` below) rather than
//! trust a stale or missing snapshot.

use super::DocumentIndex;
use crate::domain::error::{Error, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Schema tag for the on-disk index snapshot format.
pub const SCHEMA_VERSION: &str = "2.0";
const DEBOUNCE: std::time::Duration = std::time::Duration::from_millis(200);

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct SnapshotEnvelope {
    schema_version: String,
    index: DocumentIndex,
}

/// Write `index` to `path` immediately (used by the debounce loop and by
/// callers that want a synchronous flush, e.g. on shutdown).
pub async fn save(path: &Path, index: &DocumentIndex) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = bincode::serde::encode_to_vec(
        SnapshotRef { schema_version: SCHEMA_VERSION, index },
        bincode::config::standard(),
    )
    .map_err(|e| Error::malformed(format!("encoding index snapshot: {e}")))?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

#[derive(serde::Serialize)]
struct SnapshotRef<'a> {
    schema_version: &'a str,
    index: &'a DocumentIndex,
}

/// Load a persisted snapshot, or `None` if absent. Rejects snapshots
/// written by an incompatible schema version.
pub async fn load(path: &Path) -> Result<Option<DocumentIndex>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = tokio::fs::read(path).await?;
    let (envelope, _): (SnapshotEnvelope, usize) =
        bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
            .map_err(|e| Error::malformed(format!("decoding index snapshot: {e}")))?;
    if envelope.schema_version != SCHEMA_VERSION {
        return Err(Error::validation(format!(
            "document index snapshot at {} has schema {}, expected {SCHEMA_VERSION}",
            path.display(),
            envelope.schema_version
        )));
    }
    Ok(Some(envelope.index))
}

/// Rebuild an index from scratch over every `(document, path, tags)` row
/// the store currently holds. Used on startup when the snapshot is
/// missing or empty but the store is not; callers should suppress
/// [`DebouncedWriter::mark_dirty`] calls until this returns.
pub fn rebuild_from<'a>(
    rows: impl Iterator<Item = (&'a crate::domain::types::Document, Option<String>, &'a [String])>,
) -> DocumentIndex {
    let mut index = DocumentIndex::new();
    for (doc, path, tags) in rows {
        index.add_document(doc, path, tags);
    }
    index
}

/// Debounce coordinator: call [`DebouncedWriter::mark_dirty`] on every
/// mutation; [`DebouncedWriter::run`] flushes at most once per
/// [`DEBOUNCE`] window.
pub struct DebouncedWriter {
    notify: Notify,
    dirty: AtomicBool,
}

impl Default for DebouncedWriter {
    fn default() -> Self {
        Self {
            notify: Notify::new(),
            dirty: AtomicBool::new(false),
        }
    }
}

impl DebouncedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Run until cancelled, flushing `index` through `path` whenever a
    /// burst of `mark_dirty` calls settles for [`DEBOUNCE`].
    pub async fn run(&self, path: &Path, index: &tokio::sync::RwLock<DocumentIndex>) {
        loop {
            self.notify.notified().await;
            tokio::time::sleep(DEBOUNCE).await;
            if self.dirty.swap(false, Ordering::SeqCst) {
                let guard = index.read().await;
                if let Err(err) = save(path, &guard).await {
                    tracing::warn!(%err, "document index snapshot flush failed");
                }
            }
        }
    }
}
