use axum::{Extension, Json, extract::State, response::IntoResponse};

use branchchat_types::api::{ChatTurnRequest, ChatTurnResponse, Claims};

use crate::error::ApiError;
use crate::orchestrator::TurnInput;
use crate::state::AppState;

/// POST /rag/chat: one conversational turn.
pub async fn create_turn(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ChatTurnRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.question.trim().is_empty() {
        return Err(ApiError::BadRequest("Question must not be empty".into()));
    }

    let turn = state
        .orchestrator
        .create_turn(
            claims.sub,
            TurnInput {
                question: req.question,
                parent_id: req.parent_id,
                doc_id: req.doc_id,
            },
        )
        .await?;

    Ok(Json(ChatTurnResponse {
        user_message: turn.user_message,
        ai_message: turn.ai_message,
    }))
}
