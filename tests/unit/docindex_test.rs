//! Cross-cutting [`DocumentIndex`] behavior: re-indexing, snapshot
//! schema enforcement, rebuild-from-store equivalence, and the
//! debounced writer's actual flush-to-disk timing (spec §4.D).

use chrono::Utc;
use saga::docindex::snapshot::{self, DebouncedWriter, SCHEMA_VERSION};
use saga::docindex::DocumentIndex;
use saga::{Document, DocumentSource, DocumentStatus};
use tokio::sync::RwLock;

fn doc(id: &str, title: &str, content: &str) -> Document {
    let now = Utc::now();
    Document {
        id: id.into(),
        title: title.into(),
        content: content.into(),
        content_hash: format!("hash-{id}"),
        content_length: content.len(),
        source: DocumentSource::Upload,
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
        status: DocumentStatus::Active,
    }
}

#[test]
fn reindexing_the_same_id_replaces_rather_than_duplicates_postings() {
    let mut idx = DocumentIndex::new();
    idx.add_document(&doc("d1", "Rust Guide", "old body"), None, &["draft".into()]);
    idx.add_document(&doc("d1", "Rust Guide", "new body"), None, &["final".into()]);

    assert_eq!(idx.len(), 1);
    assert!(idx.search_by_tags(&["draft".to_string()]).is_empty());
    assert_eq!(idx.search_by_tags(&["final".to_string()]).len(), 1);
    assert!(idx.search_by_keywords(&["new".to_string()]).contains("d1"));
}

#[test]
fn rebuild_from_matches_incremental_indexing() {
    let rows = [
        (doc("d1", "Rust Guide", "async patterns"), Some("data/d1.txt".to_string()), vec!["rust".to_string()]),
        (doc("d2", "Python Guide", "async basics"), None, vec![]),
    ];
    let rebuilt = snapshot::rebuild_from(rows.iter().map(|(d, p, t)| (d, p.clone(), t.as_slice())));

    let mut incremental = DocumentIndex::new();
    for (d, p, t) in &rows {
        incremental.add_document(d, p.clone(), t);
    }

    assert_eq!(rebuilt.len(), incremental.len());
    assert_eq!(rebuilt.find_document("d1"), incremental.find_document("d1"));
    assert_eq!(
        rebuilt.search_by_keywords(&["async".to_string()]),
        incremental.search_by_keywords(&["async".to_string()])
    );
}

#[tokio::test]
async fn loading_a_snapshot_with_a_different_schema_version_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.bin");

    #[derive(serde::Serialize)]
    struct OldEnvelope<'a> {
        schema_version: &'a str,
        index: &'a DocumentIndex,
    }
    let index = DocumentIndex::new();
    let bytes = bincode::serde::encode_to_vec(
        OldEnvelope { schema_version: "0.1", index: &index },
        bincode::config::standard(),
    )
    .unwrap();
    tokio::fs::write(&path, bytes).await.unwrap();

    let err = snapshot::load(&path).await.unwrap_err();
    assert!(format!("{err}").contains("0.1"));
    assert_ne!(SCHEMA_VERSION, "0.1");
}

#[tokio::test]
async fn debounced_writer_waits_for_the_debounce_window_before_flushing() {
    use std::sync::Arc;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.bin");
    let index = Arc::new(RwLock::new(DocumentIndex::new()));
    {
        let mut guard = index.write().await;
        guard.add_document(&doc("d1", "Title", "content"), None, &[]);
    }

    let writer = Arc::new(DebouncedWriter::new());
    let run = tokio::spawn({
        let writer = writer.clone();
        let index = index.clone();
        let path = path.clone();
        async move {
            writer.run(&path, &index).await;
        }
    });

    writer.mark_dirty();
    // Fire a burst; only the settled state after the debounce window
    // should land on disk, not one write per mark.
    for _ in 0..5 {
        writer.mark_dirty();
    }
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    assert!(!path.exists(), "writer must not flush before the debounce window elapses");

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    assert!(path.exists(), "writer must flush once the burst settles");
    run.abort();

    let loaded = snapshot::load(&path).await.unwrap().unwrap();
    assert_eq!(loaded.len(), 1);
    assert!(loaded.search_by_keywords(&["content".to_string()]).contains("d1"));
}
