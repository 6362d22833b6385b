use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use branchchat_db::{Database, NewDocument, StoreError};

use crate::chunker::TextChunker;
use crate::error::RetrievalError;

/// Turns uploaded documents into queryable context.
///
/// Implementations must be shareable across request handlers; a handle
/// returned by `ingest` stays valid for every later `query`.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Stores a document and returns its handle.
    async fn ingest(&self, uploader_id: Uuid, bytes: Vec<u8>) -> Result<String, RetrievalError>;

    /// Returns the passages of `doc_id` most relevant to `question`, joined
    /// by blank lines. Unknown handles fail with [`RetrievalError::NotFound`].
    async fn query(&self, doc_id: &str, question: &str) -> Result<String, RetrievalError>;
}

#[derive(Debug, Clone)]
pub struct RagConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
            top_k: 4,
        }
    }
}

/// Retriever that keeps chunks in the application database and ranks them
/// with its full-text index.
pub struct SqliteRetriever {
    db: Arc<Database>,
    chunker: TextChunker,
    top_k: usize,
}

impl SqliteRetriever {
    pub fn new(db: Arc<Database>, config: RagConfig) -> Self {
        Self {
            db,
            chunker: TextChunker::new(config.chunk_size, config.chunk_overlap),
            top_k: config.top_k.max(1),
        }
    }
}

#[async_trait]
impl Retriever for SqliteRetriever {
    async fn ingest(&self, uploader_id: Uuid, bytes: Vec<u8>) -> Result<String, RetrievalError> {
        let text = String::from_utf8_lossy(&bytes);
        let chunks = self.chunker.split(&text);
        if chunks.is_empty() {
            return Err(RetrievalError::EmptyDocument);
        }

        let doc = NewDocument {
            id: Uuid::new_v4().to_string(),
            uploader_id: uploader_id.to_string(),
            sha256: hex::encode(Sha256::digest(&bytes)),
            byte_size: bytes.len() as i64,
            chunks,
        };
        let chunk_count = doc.chunks.len();

        let db = Arc::clone(&self.db);
        let doc = tokio::task::spawn_blocking(move || db.insert_document(&doc).map(|_| doc))
            .await
            .map_err(|e| RetrievalError::Task(e.to_string()))??;

        info!(
            "Ingested document {} ({} bytes, {} chunks)",
            doc.id, doc.byte_size, chunk_count
        );
        Ok(doc.id)
    }

    async fn query(&self, doc_id: &str, question: &str) -> Result<String, RetrievalError> {
        let db = Arc::clone(&self.db);
        let (id, q, top_k) = (doc_id.to_string(), question.to_string(), self.top_k);
        let chunks = tokio::task::spawn_blocking(move || db.search_document_chunks(&id, &q, top_k))
            .await
            .map_err(|e| RetrievalError::Task(e.to_string()))?
            .map_err(|e| match e {
                StoreError::NotFound { .. } => RetrievalError::NotFound(doc_id.to_string()),
                other => RetrievalError::Store(other),
            })?;

        debug!(
            "Document {}: selected chunks {:?}",
            doc_id,
            chunks.iter().map(|c| c.chunk_index).collect::<Vec<_>>()
        );

        Ok(chunks
            .into_iter()
            .map(|c| c.content)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}
