pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("summarizer request failed: {0}")]
    Request(String),

    #[error("summarizer returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("summarizer response could not be decoded: {0}")]
    Decode(String),

    #[error("failed to generate summary")]
    Empty,

    #[error("failed to generate summary: blocked ({0})")]
    Blocked(String),
}

/// A language model that turns a prompt into newsletter markdown.
#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &str;

    fn model_hint(&self) -> Option<&str> {
        None
    }

    async fn summarize(&self, prompt: &str) -> Result<String, SummarizeError>;
}
