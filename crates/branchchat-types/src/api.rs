use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Message;

// -- Bearer token claims --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user_id: Uuid,
    pub username: String,
}

// -- Conversation tree --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMessageRequest {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub doc_id: Option<String>,
    #[serde(default = "default_is_user")]
    pub is_user: bool,
}

fn default_is_user() -> bool {
    true
}

/// One conversational turn: a question, optionally forked from an existing
/// message and optionally grounded in an uploaded document.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatTurnRequest {
    pub question: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub doc_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatTurnResponse {
    pub user_message: Message,
    pub ai_message: Message,
}

// -- Documents --

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadDocumentResponse {
    pub doc_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AskDocumentRequest {
    pub question: String,
    pub doc_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskDocumentResponse {
    pub answer: String,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
