use thiserror::Error;

use crate::path::PathError;

/// Errors surfaced by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The row is missing, or belongs to a different owner.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("username already taken: {0}")]
    UsernameTaken(String),

    #[error("corrupt message path: {0}")]
    Path(#[from] PathError),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
