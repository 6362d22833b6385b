use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;

use branchchat_rag::RetrievalError;
use branchchat_types::api::{
    AskDocumentRequest, AskDocumentResponse, Claims, UploadDocumentResponse,
};

use crate::error::ApiError;
use crate::state::AppState;

/// 20 MB upload limit for documents
pub const MAX_DOCUMENT_SIZE: usize = 20 * 1024 * 1024;

/// POST /rag/upload-doc: accepts the raw document body, returns its handle.
pub async fn upload_document(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    bytes: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("Document is empty".into()));
    }

    let doc_id = state
        .retriever
        .ingest(claims.sub, bytes.to_vec())
        .await
        .map_err(|e| match e {
            RetrievalError::EmptyDocument => ApiError::BadRequest("Document contains no text".into()),
            other => {
                error!("Document ingest failed: {}", other);
                ApiError::Internal
            }
        })?;

    Ok((StatusCode::CREATED, Json(UploadDocumentResponse { doc_id })))
}

/// POST /rag/ask-doc: grounded answer over an uploaded document; nothing
/// is added to the conversation tree.
pub async fn ask_document(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Json(req): Json<AskDocumentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let answer = state
        .orchestrator
        .ask_document(&req.doc_id, &req.question)
        .await?;

    Ok(Json(AskDocumentResponse { answer }))
}
