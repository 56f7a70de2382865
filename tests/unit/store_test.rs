//! Cross-cutting [`LocalStore`] behavior not already covered by its own
//! unit tests: content-hash dedup lookup, code-block cascade on
//! delete, keyword/tag/language projections, stats, and the
//! background flush loop's debounce timing (spec §4.C).

use chrono::Utc;
use saga::domain::ports::store::DocumentFilter;
use saga::domain::ports::KnowledgeStore;
use saga::store::LocalStore;
use saga::{CodeBlock, Document, DocumentLanguage, DocumentSource, DocumentStatus, DocumentTag, Embedding, Keyword, KeywordSource};
use std::sync::Arc;

fn doc(id: &str) -> Document {
    let now = Utc::now();
    Document {
        id: id.into(),
        title: format!("doc {id}"),
        content: "hello world".into(),
        content_hash: format!("hash-{id}"),
        content_length: 11,
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

async fn open_temp() -> (LocalStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.bin");
    let store = LocalStore::open(path, false).await.unwrap();
    (store, dir)
}

#[tokio::test]
async fn finds_existing_document_by_content_hash() {
    let (store, _dir) = open_temp().await;
    store.put_documents(vec![doc("d1")]).await.unwrap();
    let found = store.find_by_content_hash("hash-d1").await.unwrap().unwrap();
    assert_eq!(found.id, "d1");
    assert!(store.find_by_content_hash("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn delete_document_cascades_to_code_blocks() {
    let (store, _dir) = open_temp().await;
    store.put_documents(vec![doc("d1")]).await.unwrap();
    store
        .put_code_blocks(vec![CodeBlock {
            id: "d1_block_0".into(),
            document_id: "d1".into(),
            block_id: "0".into(),
            block_index: 0,
            language: "rust".into(),
            content: "fn main() {}".into(),
            content_length: 12,
            embedding: Embedding { vector: vec![1.0, 0.0], model: "t".into() },
            source_url: None,
        }])
        .await
        .unwrap();

    assert!(store.delete_document("d1").await.unwrap());
    assert!(store.code_blocks_for_document("d1").await.unwrap().is_empty());
}

#[tokio::test]
async fn tags_languages_and_keywords_project_by_document_id() {
    let (store, _dir) = open_temp().await;
    store.put_documents(vec![doc("d1"), doc("d2")]).await.unwrap();
    store
        .put_tags(vec![DocumentTag { document_id: "d1".into(), tag: "rust".into(), is_generated: false }])
        .await
        .unwrap();
    store
        .put_languages(vec![DocumentLanguage { document_id: "d1".into(), language_code: "en".into() }])
        .await
        .unwrap();
    store
        .put_keywords(vec![Keyword { keyword: "hello".into(), document_id: "d1".into(), source: KeywordSource::Content, frequency: 1 }])
        .await
        .unwrap();

    let tags = store.tags_for_documents(&["d1".to_string(), "d2".to_string()]).await.unwrap();
    assert_eq!(tags.get("d1").map(Vec::len), Some(1));
    assert!(tags.get("d2").is_none_or(|v| v.is_empty()));

    let languages = store.languages_for_documents(&["d1".to_string()]).await.unwrap();
    assert_eq!(languages.get("d1"), Some(&vec!["en".to_string()]));

    let hits = store.keyword_search(&["hello".to_string()], 10).await.unwrap();
    assert_eq!(hits, vec!["d1".to_string()]);
}

#[tokio::test]
async fn stats_reflects_table_sizes() {
    let (store, _dir) = open_temp().await;
    store.put_documents(vec![doc("d1")]).await.unwrap();
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.documents, 1);
    assert_eq!(stats.chunks, 0);
}

#[tokio::test]
async fn background_flush_loop_writes_after_the_debounce_window() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.bin");
    let store = Arc::new(LocalStore::open(path.clone(), false).await.unwrap());

    let loop_handle = tokio::spawn({
        let store = store.clone();
        async move { store.run_flush_loop().await }
    });

    store.put_documents(vec![doc("d1")]).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(350)).await;
    loop_handle.abort();

    let reopened = LocalStore::open(path, false).await.unwrap();
    assert!(reopened.get_document("d1").await.unwrap().is_some());
}
