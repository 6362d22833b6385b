use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use tracing::debug;

use crate::auth::verify_token;
use crate::error::{ApiError, blocking};
use crate::state::AppState;

/// Resolves the caller from `Authorization: Bearer <token>`.
///
/// The token must verify against the configured secret and name a user that
/// still exists. On success the [`Claims`](branchchat_types::api::Claims) are
/// attached to the request for handlers to extract.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::Unauthorized)?;

    let claims = verify_token(&state.auth, bearer.token())?;

    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    if blocking(move || db.get_user_by_id(&user_id)).await?.is_none() {
        debug!("Token for unknown user {}", claims.sub);
        return Err(ApiError::Unauthorized);
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
