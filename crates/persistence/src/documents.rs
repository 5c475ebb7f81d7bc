//! Document blob storage
//!
//! Uploaded bytes are gzip-compressed on insert and immutable afterwards.

use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::client::PgClient;
use crate::error::PersistenceError;

/// Result of storing a new blob
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub doc_id: String,
    pub original_size: usize,
    pub compressed_size: usize,
}

/// A blob row as read back from the database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentBlob {
    pub id: String,
    pub workspace: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub compressed_blob: Vec<u8>,
    pub original_size: i64,
    pub created_at: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct DocumentStore {
    client: PgClient,
}

impl DocumentStore {
    pub fn new(client: PgClient) -> Self {
        Self { client }
    }

    /// Compress and insert a new blob under a caller-supplied id
    pub async fn store(
        &self,
        doc_id: &str,
        workspace: &str,
        file_name: &str,
        content_type: Option<&str>,
        content: &[u8],
        metadata: Option<serde_json::Value>,
    ) -> Result<StoredDocument, PersistenceError> {
        let compressed = gzip_compress(content)?;
        let compressed_size = compressed.len();

        sqlx::query(
            r#"INSERT INTO orchestrator_documents
               (id, workspace, file_name, content_type, compressed_blob, original_size, metadata)
               VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, '{}'::jsonb))"#,
        )
        .bind(doc_id)
        .bind(workspace)
        .bind(file_name)
        .bind(content_type)
        .bind(&compressed)
        .bind(content.len() as i64)
        .bind(metadata)
        .execute(self.client.pool())
        .await?;

        Ok(StoredDocument {
            doc_id: doc_id.to_string(),
            original_size: content.len(),
            compressed_size,
        })
    }

    pub async fn fetch(&self, doc_id: &str) -> Result<Option<DocumentBlob>, PersistenceError> {
        let row = sqlx::query_as::<_, DocumentBlob>(
            r#"SELECT id, workspace, file_name, content_type, compressed_blob,
                      original_size, created_at, metadata
               FROM orchestrator_documents WHERE id = $1"#,
        )
        .bind(doc_id)
        .fetch_optional(self.client.pool())
        .await?;
        Ok(row)
    }

    /// Fetch and gunzip, for the download route and the worker
    pub async fn fetch_decompressed(
        &self,
        doc_id: &str,
    ) -> Result<Option<(DocumentBlob, Vec<u8>)>, PersistenceError> {
        match self.fetch(doc_id).await? {
            Some(blob) => {
                let content = gzip_decompress(&blob.compressed_blob)?;
                Ok(Some((blob, content)))
            }
            None => Ok(None),
        }
    }
}

pub fn gzip_compress(data: &[u8]) -> Result<Vec<u8>, PersistenceError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub fn gzip_decompress(data: &[u8]) -> Result<Vec<u8>, PersistenceError> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_round_trip() {
        let data = b"fn main() { println!(\"hello\"); }".repeat(50);
        let compressed = gzip_compress(&data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(gzip_decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_gzip_decompress_rejects_garbage() {
        assert!(gzip_decompress(b"not a gzip stream").is_err());
    }
}
