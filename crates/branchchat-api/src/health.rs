use axum::{Json, extract::State, response::IntoResponse};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /db-check: reports whether the database answers a trivial query.
pub async fn db_check(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let body = match tokio::task::spawn_blocking(move || db.ping()).await {
        Ok(Ok(result)) => serde_json::json!({ "status": "ok", "result": result }),
        Ok(Err(e)) => {
            warn!("Database check failed: {}", e);
            serde_json::json!({ "status": "error", "detail": e.to_string() })
        }
        Err(e) => {
            warn!("Database check task failed: {}", e);
            return Err(ApiError::Internal);
        }
    };

    Ok(Json(body))
}
