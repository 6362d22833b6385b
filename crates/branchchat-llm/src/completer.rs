use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::api_types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use crate::config::CompletionConfig;
use crate::error::CompletionError;
use crate::prompt::build_prompt;

/// Generates reply text for a question, optionally grounded in context.
///
/// This trait is object-safe and is shared as `Arc<dyn Completer>`.
#[async_trait]
pub trait Completer: Send + Sync {
    /// `context` may be empty when the question is not grounded in a document.
    async fn complete(&self, context: &str, question: &str) -> Result<String, CompletionError>;

    fn name(&self) -> &str;
}

/// Runs a completion and renders any failure as the reply text itself, so
/// the caller always has something to store.
pub async fn complete_or_degrade(completer: &dyn Completer, context: &str, question: &str) -> String {
    match completer.complete(context, question).await {
        Ok(text) => text,
        Err(e) => {
            warn!("{} completion degraded: {}", completer.name(), e);
            e.to_string()
        }
    }
}

/// Completer for OpenAI-compatible chat completion endpoints.
pub struct HttpCompleter {
    client: Client,
    config: CompletionConfig,
}

impl HttpCompleter {
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                CompletionError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        if config.api_key.is_none() {
            warn!("No completion API key configured; replies will carry the error text");
        }

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Completer for HttpCompleter {
    async fn complete(&self, context: &str, question: &str) -> Result<String, CompletionError> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            CompletionError::Configuration("completion API key is not configured".to_string())
        })?;

        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage::user(build_prompt(context, question))],
        };

        debug!(
            "Sending completion request to {} (model {})",
            self.config.api_url, request.model
        );

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::Network(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Network(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|_| CompletionError::UnexpectedResponse(body.clone()))?;

        match completion.first_content() {
            Some(text) => Ok(text.to_string()),
            None => Err(CompletionError::UnexpectedResponse(body)),
        }
    }

    fn name(&self) -> &str {
        "HttpCompleter"
    }
}
