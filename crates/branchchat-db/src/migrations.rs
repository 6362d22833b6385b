use anyhow::Context;
use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, message tree)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE messages (
                id          TEXT PRIMARY KEY,
                seq         INTEGER NOT NULL UNIQUE,
                owner_id    TEXT NOT NULL REFERENCES users(id),
                parent_id   TEXT REFERENCES messages(id),
                path        TEXT NOT NULL,
                content     TEXT NOT NULL,
                is_user     INTEGER NOT NULL,
                doc_id      TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_messages_path ON messages(path);
            CREATE INDEX idx_messages_owner_path ON messages(owner_id, path);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )
        .context("migration v1 failed")?;
    }

    if version < 2 {
        info!("Running migration v2 (documents)");
        conn.execute_batch(
            "
            CREATE TABLE documents (
                id           TEXT PRIMARY KEY,
                uploader_id  TEXT NOT NULL REFERENCES users(id),
                sha256       TEXT NOT NULL,
                byte_size    INTEGER NOT NULL,
                created_at   TEXT NOT NULL
            );

            CREATE TABLE document_chunks (
                document_id  TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                chunk_index  INTEGER NOT NULL,
                content      TEXT NOT NULL,
                PRIMARY KEY (document_id, chunk_index)
            );

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )
        .context("migration v2 failed")?;
    }

    if version < 3 {
        info!("Running migration v3 (chunk full-text index)");
        conn.execute_batch(
            "
            CREATE VIRTUAL TABLE document_chunks_fts USING fts5(
                content,
                document_id UNINDEXED,
                chunk_index UNINDEXED
            );

            INSERT INTO document_chunks_fts (content, document_id, chunk_index)
                SELECT content, document_id, chunk_index FROM document_chunks;

            CREATE TRIGGER document_chunks_fts_insert
            AFTER INSERT ON document_chunks BEGIN
                INSERT INTO document_chunks_fts (content, document_id, chunk_index)
                VALUES (NEW.content, NEW.document_id, NEW.chunk_index);
            END;

            CREATE TRIGGER document_chunks_fts_delete
            AFTER DELETE ON document_chunks BEGIN
                DELETE FROM document_chunks_fts
                WHERE document_id = OLD.document_id AND chunk_index = OLD.chunk_index;
            END;

            INSERT INTO schema_version (version) VALUES (3);
            ",
        )
        .context("migration v3 failed")?;
    }

    info!("Database migrations complete");
    Ok(())
}
