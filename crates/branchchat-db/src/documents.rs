use chrono::Utc;
use rusqlite::{Connection, params};
use tracing::debug;

use crate::models::{ChunkRow, format_timestamp};
use crate::{Database, Result, StoreError};

/// An ingested document and its text chunks, in document order.
pub struct NewDocument {
    pub id: String,
    pub uploader_id: String,
    pub sha256: String,
    pub byte_size: i64,
    pub chunks: Vec<String>,
}

impl Database {
    /// Writes the document row and all of its chunks in one transaction.
    pub fn insert_document(&self, doc: &NewDocument) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO documents (id, uploader_id, sha256, byte_size, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    &doc.id,
                    &doc.uploader_id,
                    &doc.sha256,
                    doc.byte_size,
                    format_timestamp(&Utc::now()),
                ],
            )?;

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO document_chunks (document_id, chunk_index, content) VALUES (?1, ?2, ?3)",
                )?;
                for (index, chunk) in doc.chunks.iter().enumerate() {
                    stmt.execute(params![&doc.id, index as i64, chunk])?;
                }
            }

            tx.commit()?;
            debug!("Stored document {} ({} chunks)", doc.id, doc.chunks.len());
            Ok(())
        })
    }

    /// Up to `limit` chunks of document `id`, most relevant to `query` first.
    ///
    /// Chunks matching any query term are ranked by FTS5 `bm25()`, ties going
    /// to the earlier chunk. Remaining slots are filled with the leading
    /// unmatched chunks in document order, so a query with no matching terms
    /// still yields context. Fails with `NotFound` for an unknown document.
    pub fn search_document_chunks(&self, id: &str, query: &str, limit: usize) -> Result<Vec<ChunkRow>> {
        self.with_conn(|conn| {
            if !document_exists(conn, id)? {
                return Err(StoreError::not_found("document", id));
            }
            if limit == 0 {
                return Ok(Vec::new());
            }

            let mut chunks = match match_expression(query) {
                Some(expr) => {
                    let mut stmt = conn.prepare(
                        "SELECT document_id, chunk_index, content FROM document_chunks_fts
                         WHERE document_chunks_fts MATCH ?1 AND document_id = ?2
                         ORDER BY bm25(document_chunks_fts), chunk_index
                         LIMIT ?3",
                    )?;
                    stmt.query_map(params![expr, id, limit as i64], chunk_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?
                }
                None => Vec::new(),
            };

            if chunks.len() < limit {
                let mut stmt = conn.prepare(
                    "SELECT document_id, chunk_index, content FROM document_chunks
                     WHERE document_id = ?1
                     ORDER BY chunk_index
                     LIMIT ?2",
                )?;
                let leading = stmt
                    .query_map(params![id, limit as i64], chunk_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                for chunk in leading {
                    if chunks.len() == limit {
                        break;
                    }
                    if chunks.iter().all(|c| c.chunk_index != chunk.chunk_index) {
                        chunks.push(chunk);
                    }
                }
            }

            Ok(chunks)
        })
    }
}

fn document_exists(conn: &Connection, id: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM documents WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?)
}

fn chunk_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChunkRow> {
    Ok(ChunkRow {
        document_id: row.get(0)?,
        chunk_index: row.get(1)?,
        content: row.get(2)?,
    })
}

/// FTS5 query matching any alphanumeric term of `text`, each term quoted so
/// that FTS5 operators in user input are taken literally.
fn match_expression(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t.to_lowercase()))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}
