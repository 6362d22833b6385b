use thiserror::Error;

/// A failed completion. The `Display` form is what ends up in the stored
/// reply when the failure is rendered instead of propagated.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Error: {0}")]
    Configuration(String),

    #[error("Error: {0}")]
    Network(String),

    #[error("Error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),
}
