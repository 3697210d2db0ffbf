use async_trait::async_trait;
use chrono::Utc;
use postmap_core::error::{ErrorCode, PostmapError};
use postmap_core::model::{Post, PostId, UserId};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("post {0} not found")]
    NotFound(PostId),
    #[error("user {0} not found")]
    UserNotFound(UserId),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("post store unavailable: {0}")]
    Unavailable(String),
}

impl PostmapError for StoreError {
    fn error_code(&self) -> ErrorCode {
        match self {
            StoreError::NotFound(_) | StoreError::UserNotFound(_) => ErrorCode::NotFound,
            StoreError::Conflict(_) => ErrorCode::AlreadyExists,
            StoreError::Unavailable(_) => ErrorCode::Unavailable,
        }
    }
}

/// Persistence for posts. Every listing is newest first.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn insert(
        &self,
        author_id: UserId,
        title: String,
        content: String,
    ) -> Result<Post, StoreError>;

    async fn update(&self, post: Post) -> Result<Post, StoreError>;

    async fn remove(&self, id: PostId) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, StoreError>;

    async fn list_all(&self) -> Result<Vec<Post>, StoreError>;

    async fn list_by_author(&self, author_id: UserId) -> Result<Vec<Post>, StoreError>;

    /// One page of all posts plus the total count. `page` starts at 1.
    async fn list_page(&self, page: usize, limit: usize) -> Result<(Vec<Post>, usize), StoreError>;

    async fn list_page_by_author(
        &self,
        author_id: UserId,
        page: usize,
        limit: usize,
    ) -> Result<(Vec<Post>, usize), StoreError>;
}

pub struct InMemoryPostStore {
    posts: RwLock<HashMap<PostId, Post>>,
    next_id: AtomicU64,
}

impl InMemoryPostStore {
    pub fn new() -> Self {
        Self {
            posts: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    async fn newest_first<F>(&self, filter: F) -> Vec<Post>
    where
        F: Fn(&Post) -> bool,
    {
        let posts = self.posts.read().await;
        let mut out: Vec<Post> = posts.values().filter(|post| filter(post)).cloned().collect();
        out.sort_by_key(|post| Reverse((post.created_at, post.id)));
        out
    }
}

impl Default for InMemoryPostStore {
    fn default() -> Self {
        Self::new()
    }
}

fn paginate(posts: Vec<Post>, page: usize, limit: usize) -> (Vec<Post>, usize) {
    let total = posts.len();
    let skip = page.saturating_sub(1).saturating_mul(limit);
    let data = posts.into_iter().skip(skip).take(limit).collect();
    (data, total)
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn insert(
        &self,
        author_id: UserId,
        title: String,
        content: String,
    ) -> Result<Post, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let post = Post {
            id,
            title,
            content,
            author_id,
            created_at: now,
            updated_at: now,
        };
        self.posts.write().await.insert(id, post.clone());
        Ok(post)
    }

    async fn update(&self, mut post: Post) -> Result<Post, StoreError> {
        let mut posts = self.posts.write().await;
        let existing = posts.get_mut(&post.id).ok_or(StoreError::NotFound(post.id))?;
        // Creation time and ownership are fixed at insert.
        post.created_at = existing.created_at;
        post.author_id = existing.author_id;
        post.updated_at = Utc::now();
        *existing = post.clone();
        Ok(post)
    }

    async fn remove(&self, id: PostId) -> Result<(), StoreError> {
        self.posts
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        Ok(self.posts.read().await.get(&id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Post>, StoreError> {
        Ok(self.newest_first(|_| true).await)
    }

    async fn list_by_author(&self, author_id: UserId) -> Result<Vec<Post>, StoreError> {
        Ok(self.newest_first(|post| post.author_id == author_id).await)
    }

    async fn list_page(&self, page: usize, limit: usize) -> Result<(Vec<Post>, usize), StoreError> {
        Ok(paginate(self.newest_first(|_| true).await, page, limit))
    }

    async fn list_page_by_author(
        &self,
        author_id: UserId,
        page: usize,
        limit: usize,
    ) -> Result<(Vec<Post>, usize), StoreError> {
        let posts = self
            .newest_first(|post| post.author_id == author_id)
            .await;
        Ok(paginate(posts, page, limit))
    }
}
