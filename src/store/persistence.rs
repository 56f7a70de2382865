//! On-disk snapshot read/write for the store (spec §4.C, §6).
//!
//! Grounded on `cognitive-glitch-agcodex`'s `VectorIndex::save_to_disk` /
//! `load_from_disk` (`codex-rs/core/src/embeddings/index_manager.rs`):
//! the whole table set is bincode-encoded and written as one file.

use crate::domain::error::{Error, Result};
use crate::store::tables::TableRows;
use std::path::Path;

const CONFIG: bincode::config::Configuration = bincode::config::standard();

/// Write `rows` to `path`, creating parent directories as needed.
pub async fn save(path: &Path, rows: &TableRows) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = bincode::serde::encode_to_vec(rows, CONFIG)
        .map_err(|e| Error::malformed(format!("encoding store snapshot: {e}")))?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

/// Load table rows from `path`, or `None` if no snapshot exists yet.
pub async fn load(path: &Path) -> Result<Option<TableRows>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = tokio::fs::read(path).await?;
    let (rows, _) = bincode::serde::decode_from_slice(&bytes, CONFIG)
        .map_err(|e| Error::malformed(format!("decoding store snapshot: {e}")))?;
    Ok(Some(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Document, DocumentSource, DocumentStatus};
    use chrono::Utc;

    fn sample_document() -> Document {
        let now = Utc::now();
        Document {
            id: "abc123".into(),
            title: "Title".into(),
            content: "content".into(),
            content_hash: "fullhash".into(),
            content_length: 7,
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

    #[tokio::test]
    async fn round_trips_table_rows_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.bin");
        let mut rows = TableRows::default();
        let doc = sample_document();
        rows.documents.insert(doc.id.clone(), doc.clone());

        save(&path, &rows).await.unwrap();
        let loaded = load(&path).await.unwrap().unwrap();
        assert_eq!(loaded.documents.get(&doc.id).unwrap().title, "Title");
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.bin");
        assert!(load(&path).await.unwrap().is_none());
    }
}
