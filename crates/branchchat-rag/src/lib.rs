//! Retrieval collaborator.
//!
//! - [`Retriever`] - ingest a document, answer "most relevant passages for a query"
//! - [`SqliteRetriever`] - durable implementation backed by the shared database
//! - [`TextChunker`] - recursive character splitter used at ingest time

mod chunker;
mod error;
mod retriever;

pub use chunker::TextChunker;
pub use error::RetrievalError;
pub use retriever::{RagConfig, Retriever, SqliteRetriever};
