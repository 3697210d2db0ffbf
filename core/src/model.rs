use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type PostId = u64;
pub type UserId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Account record. The password hash never leaves the process in serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub ai_introduction: Option<String>,
    pub last_introduction_generated: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored embedding for a single post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub post_id: PostId,
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn new(post_id: PostId, vector: Vec<f32>) -> Self {
        Self { post_id, vector }
    }
}

/// One hit of a nearest-neighbour query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub post_id: PostId,
    pub similarity: f32,
}

impl SimilarityMatch {
    pub fn new(post_id: PostId, similarity: f32) -> Self {
        Self {
            post_id,
            similarity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostNode {
    pub id: PostId,
    pub title: String,
}

impl From<&Post> for PostNode {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
        }
    }
}

/// Undirected similarity relation. `source` is always the smaller post id.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostEdge {
    pub source: PostId,
    pub target: PostId,
    pub similarity: f32,
}

impl PostEdge {
    /// Orients the pair so that `source < target`. Returns `None` for a self pair.
    pub fn canonical(a: PostId, b: PostId, similarity: f32) -> Option<Self> {
        if a == b {
            return None;
        }
        Some(Self {
            source: a.min(b),
            target: a.max(b),
            similarity,
        })
    }

    pub fn pair_key(&self) -> (PostId, PostId) {
        (self.source, self.target)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PostMap {
    pub nodes: Vec<PostNode>,
    pub edges: Vec<PostEdge>,
}

impl PostMap {
    pub fn without_edges(nodes: Vec<PostNode>) -> Self {
        Self {
            nodes,
            edges: Vec::new(),
        }
    }
}
