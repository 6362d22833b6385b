/// Configuration for [`HttpCompleter`](crate::HttpCompleter).
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Full URL of an OpenAI-compatible chat completions endpoint.
    pub api_url: String,

    /// Bearer token. Without one every completion degrades.
    pub api_key: Option<String>,

    pub model: String,

    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_url: "https://router.huggingface.co/novita/v3/openai/chat/completions".to_string(),
            api_key: None,
            model: "deepseek/deepseek-v3-0324".to_string(),
            timeout_secs: 120,
        }
    }
}
