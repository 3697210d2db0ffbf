use crate::LlmError;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::trace;

const DEFAULT_MODEL_ID: &str = "text-embedding-3-small";
const DEFAULT_DIMS: usize = 1536;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

/// Text embedded for a post: title, blank line, body.
pub fn embedding_input(title: &str, content: &str) -> String {
    format!("{title}\n\n{content}")
}

/// Offline embedder. The same text always maps to the same vector.
pub struct DeterministicEmbedder {
    model_id: String,
    dims: usize,
}

impl DeterministicEmbedder {
    pub fn new(model_id: impl Into<String>, dims: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dims: dims.max(1),
        }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut hasher = Sha256::new();
        hasher.update(self.model_id.as_bytes());
        hasher.update(text.as_bytes());
        let digest = hasher.finalize();

        (0..self.dims)
            .map(|i| (digest[i % digest.len()] as f32 / 127.5) - 1.0)
            .collect()
    }
}

impl Default for DeterministicEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_ID, DEFAULT_DIMS)
    }
}

#[async_trait]
impl Embedder for DeterministicEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        trace!(model = %self.model_id, chars = text.len(), "Embedding text");
        Ok(self.vector_for(text))
    }
}
