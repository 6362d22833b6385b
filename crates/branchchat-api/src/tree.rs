use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use branchchat_db::NewMessage;
use branchchat_types::api::{Claims, CreateMessageRequest};

use crate::error::{ApiError, blocking};
use crate::orchestrator::document_handle;
use crate::state::AppState;

/// POST /chat/message: inserts one node directly, as a new root or as a
/// child of `parent_id`. No collaborators are involved.
pub async fn create_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let owner_id = claims.sub;
    let msg = NewMessage {
        content: req.content,
        is_user: req.is_user,
        doc_id: document_handle(req.doc_id),
    };

    let message = blocking(move || db.create_message(owner_id, req.parent_id, msg))
        .await
        .map_err(|e| match e {
            ApiError::NotFound(_) => ApiError::NotFound("Parent message not found".into()),
            other => other,
        })?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /chat/tree: the caller's whole forest in path order.
pub async fn get_tree(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let messages = blocking(move || db.list_tree(claims.sub)).await?;
    Ok(Json(messages))
}

/// GET /chat/subtree/{msg_id}: a message and all of its descendants.
pub async fn get_subtree(
    State(state): State<AppState>,
    Path(msg_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let messages = blocking(move || db.list_subtree(claims.sub, msg_id))
        .await
        .map_err(|e| match e {
            ApiError::NotFound(_) => ApiError::NotFound("Message not found".into()),
            other => other,
        })?;
    Ok(Json(messages))
}
