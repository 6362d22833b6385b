use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};

use crate::documents::MAX_DOCUMENT_SIZE;
use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{auth, chat, documents, health, tree};

/// Assembles every route. Cross-cutting layers (CORS, tracing) are added by
/// the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/token", post(auth::login))
        .route("/db-check", get(health::db_check));

    let protected_routes = Router::new()
        .route("/chat/message", post(tree::create_message))
        .route("/chat/tree", get(tree::get_tree))
        .route("/chat/subtree/{msg_id}", get(tree::get_subtree))
        .route("/rag/chat", post(chat::create_turn))
        .route(
            "/rag/upload-doc",
            post(documents::upload_document).layer(DefaultBodyLimit::max(MAX_DOCUMENT_SIZE)),
        )
        .route("/rag/ask-doc", post(documents::ask_document))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
