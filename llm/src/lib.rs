pub mod embedder;
pub mod summarizer;

use thiserror::Error;

pub use embedder::{embedding_input, DeterministicEmbedder, Embedder};
pub use summarizer::{KeywordSummarizer, PostExcerpt, Summarizer};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("model backend is not configured")]
    NotConfigured,
    #[error("model request failed: {0}")]
    Request(String),
    #[error("model returned an empty response")]
    EmptyResponse,
}
