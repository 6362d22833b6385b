//! Completion collaborator.
//!
//! - [`Completer`] - turns (context, question) into reply text
//! - [`HttpCompleter`] - OpenAI-compatible chat completions over HTTP
//! - [`complete_or_degrade`] - renders completion failures into the reply
//! - [`normalize_reply`] - strips LaTeX and markdown artifacts from replies

mod api_types;
mod completer;
mod config;
mod error;
mod normalize;
mod prompt;

pub use completer::{Completer, HttpCompleter, complete_or_degrade};
pub use config::CompletionConfig;
pub use error::CompletionError;
pub use normalize::normalize_reply;
pub use prompt::build_prompt;
