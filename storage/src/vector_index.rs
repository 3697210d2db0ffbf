use async_trait::async_trait;
use postmap_core::error::{ErrorCode, PostmapError};
use postmap_core::model::{Embedding, PostId, SimilarityMatch};
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("no embedding stored for post {0}")]
    NotFound(PostId),
    #[error("embedding for post {0} is empty")]
    EmptyVector(PostId),
    #[error("vector index unavailable: {0}")]
    Unavailable(String),
}

impl PostmapError for IndexError {
    fn error_code(&self) -> ErrorCode {
        match self {
            IndexError::NotFound(_) => ErrorCode::NotFound,
            IndexError::EmptyVector(_) => ErrorCode::InvalidArgument,
            IndexError::Unavailable(_) => ErrorCode::Unavailable,
        }
    }
}

/// Vector store holding at most one embedding per post.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, post_id: PostId, vector: Vec<f32>, content: &str)
        -> Result<(), IndexError>;

    /// Replaces an existing embedding. Fails with `NotFound` when the post has none.
    async fn update(&self, post_id: PostId, vector: Vec<f32>, content: &str)
        -> Result<(), IndexError>;

    async fn delete(&self, post_id: PostId) -> Result<(), IndexError>;

    /// Batched lookup. Ids without an embedding are omitted from the result.
    async fn fetch_by_ids(&self, ids: &[PostId]) -> Result<Vec<Embedding>, IndexError>;

    async fn fetch_all(&self) -> Result<Vec<Embedding>, IndexError>;

    /// Nearest neighbours of `vector` with similarity above `threshold`, best first, at most `k`.
    async fn query(
        &self,
        vector: &[f32],
        threshold: f32,
        k: usize,
    ) -> Result<Vec<SimilarityMatch>, IndexError>;
}

struct IndexedPost {
    vector: Vec<f32>,
    content: String,
}

/// Exhaustive cosine-similarity scan over every stored embedding.
pub struct LinearVectorIndex {
    entries: RwLock<HashMap<PostId, IndexedPost>>,
}

impl LinearVectorIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Text stored alongside the embedding of `post_id`.
    pub async fn content(&self, post_id: PostId) -> Option<String> {
        self.entries
            .read()
            .await
            .get(&post_id)
            .map(|entry| entry.content.clone())
    }
}

impl Default for LinearVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for LinearVectorIndex {
    async fn upsert(
        &self,
        post_id: PostId,
        vector: Vec<f32>,
        content: &str,
    ) -> Result<(), IndexError> {
        if vector.is_empty() {
            return Err(IndexError::EmptyVector(post_id));
        }
        self.entries.write().await.insert(
            post_id,
            IndexedPost {
                vector,
                content: content.to_string(),
            },
        );
        debug!(post_id, "Upserted embedding");
        Ok(())
    }

    async fn update(
        &self,
        post_id: PostId,
        vector: Vec<f32>,
        content: &str,
    ) -> Result<(), IndexError> {
        if vector.is_empty() {
            return Err(IndexError::EmptyVector(post_id));
        }
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&post_id)
            .ok_or(IndexError::NotFound(post_id))?;
        entry.vector = vector;
        entry.content = content.to_string();
        debug!(post_id, "Replaced embedding");
        Ok(())
    }

    async fn delete(&self, post_id: PostId) -> Result<(), IndexError> {
        if self.entries.write().await.remove(&post_id).is_some() {
            debug!(post_id, "Deleted embedding");
        }
        Ok(())
    }

    async fn fetch_by_ids(&self, ids: &[PostId]) -> Result<Vec<Embedding>, IndexError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let entries = self.entries.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| {
                entries
                    .get(id)
                    .map(|entry| Embedding::new(*id, entry.vector.clone()))
            })
            .collect())
    }

    async fn fetch_all(&self) -> Result<Vec<Embedding>, IndexError> {
        let entries = self.entries.read().await;
        let mut out: Vec<Embedding> = entries
            .iter()
            .map(|(id, entry)| Embedding::new(*id, entry.vector.clone()))
            .collect();
        out.sort_by_key(|embedding| embedding.post_id);
        Ok(out)
    }

    async fn query(
        &self,
        vector: &[f32],
        threshold: f32,
        k: usize,
    ) -> Result<Vec<SimilarityMatch>, IndexError> {
        let entries = self.entries.read().await;
        let mut scores: Vec<SimilarityMatch> = entries
            .iter()
            .filter_map(|(id, entry)| {
                cosine_similarity(vector, &entry.vector).map(|score| SimilarityMatch::new(*id, score))
            })
            .filter(|m| m.similarity > threshold)
            .collect();

        scores.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then(a.post_id.cmp(&b.post_id))
        });
        scores.truncate(k);
        Ok(scores)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }

    Some(dot / (norm_a * norm_b))
}
