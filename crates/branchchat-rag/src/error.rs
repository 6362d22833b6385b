use branchchat_db::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("document contains no text")]
    EmptyDocument,

    #[error("document store error: {0}")]
    Store(#[from] StoreError),

    #[error("retrieval task failed: {0}")]
    Task(String),
}
