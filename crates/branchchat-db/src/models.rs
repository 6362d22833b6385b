//! Database row types. These map directly to SQLite rows and are converted to
//! `branchchat-types` models at the edge of this crate.

use anyhow::anyhow;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::Row;
use uuid::Uuid;

use branchchat_types::models::Message;

use crate::{Result, StoreError};

#[derive(Debug)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
}

impl UserRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            password: row.get(2)?,
        })
    }

    pub fn user_id(&self) -> Result<Uuid> {
        parse_uuid("user id", &self.id)
    }
}

#[derive(Debug)]
pub struct MessageRow {
    pub id: String,
    pub owner_id: String,
    pub parent_id: Option<String>,
    pub path: String,
    pub content: String,
    pub is_user: bool,
    pub doc_id: Option<String>,
    pub created_at: String,
}

impl MessageRow {
    pub(crate) const COLUMNS: &'static str =
        "id, owner_id, parent_id, path, content, is_user, doc_id, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            parent_id: row.get(2)?,
            path: row.get(3)?,
            content: row.get(4)?,
            is_user: row.get(5)?,
            doc_id: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self> {
        Ok(Message {
            id: parse_uuid("message id", &row.id)?,
            owner_id: parse_uuid("owner id", &row.owner_id)?,
            parent_id: row
                .parent_id
                .as_deref()
                .map(|p| parse_uuid("parent id", p))
                .transpose()?,
            path: row.path,
            content: row.content,
            is_user: row.is_user,
            doc_id: row.doc_id,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

#[derive(Debug)]
pub struct ChunkRow {
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Accepts RFC 3339 as written by this crate, and SQLite's
/// `datetime('now')` form (`YYYY-MM-DD HH:MM:SS`, implicitly UTC).
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .map_err(|e| StoreError::Other(anyhow!("Corrupt timestamp '{}': {}", raw, e)))
}

fn parse_uuid(what: &str, raw: &str) -> Result<Uuid> {
    raw.parse()
        .map_err(|e| StoreError::Other(anyhow!("Corrupt {} '{}': {}", what, raw, e)))
}
