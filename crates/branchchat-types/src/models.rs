use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One node of a user's conversation forest.
///
/// `path` is the materialized path: the parent's path with one segment
/// appended, or a single segment for a root. It is written once at insert
/// time and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    #[serde(rename = "user_id")]
    pub owner_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub path: String,
    pub content: String,
    pub is_user: bool,
    pub doc_id: Option<String>,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
