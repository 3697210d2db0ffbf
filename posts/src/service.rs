use jobs::{Job, JobQueue};
use postmap_core::error::{ErrorCode, PostmapError};
use postmap_core::model::{Post, PostId, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::{PostStore, StoreError};
use thiserror::Error;
use tracing::{info, warn};

pub const MAX_TITLE_CHARS: usize = 255;

#[derive(Error, Debug)]
pub enum PostError {
    #[error("Invalid post: {0}")]
    Validation(String),
    #[error("Post {0} not found")]
    NotFound(PostId),
    #[error("User {user_id} is not the author of post {post_id}")]
    PermissionDenied { post_id: PostId, user_id: UserId },
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl PostmapError for PostError {
    fn error_code(&self) -> ErrorCode {
        match self {
            PostError::Validation(_) => ErrorCode::InvalidArgument,
            PostError::NotFound(_) => ErrorCode::NotFound,
            PostError::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            PostError::Store(err) => err.error_code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
}

impl NewPost {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    pub fn validate(&self) -> Result<(), PostError> {
        validate_title(&self.title)?;
        validate_content(&self.content)
    }
}

/// Partial update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl PostPatch {
    pub fn validate(&self) -> Result<(), PostError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(content) = &self.content {
            validate_content(content)?;
        }
        Ok(())
    }

    fn touches_text(&self) -> bool {
        self.title.is_some() || self.content.is_some()
    }
}

fn validate_title(title: &str) -> Result<(), PostError> {
    if title.trim().is_empty() {
        return Err(PostError::Validation("title must not be empty".to_string()));
    }
    let chars = title.chars().count();
    if chars > MAX_TITLE_CHARS {
        return Err(PostError::Validation(format!(
            "title must be at most {MAX_TITLE_CHARS} characters, got {chars}"
        )));
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<(), PostError> {
    if content.trim().is_empty() {
        return Err(PostError::Validation("content must not be empty".to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

impl Pagination {
    pub fn new(page: usize, limit: usize, total: usize) -> Self {
        Self {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit.max(1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostPage {
    pub data: Vec<Post>,
    pub pagination: Pagination,
}

/// Post CRUD. Writes schedule vector-index maintenance on the job queue and never wait for it.
pub struct PostService {
    store: Arc<dyn PostStore>,
    job_queue: Option<Arc<dyn JobQueue>>,
}

impl PostService {
    pub fn new(store: Arc<dyn PostStore>) -> Self {
        Self {
            store,
            job_queue: None,
        }
    }

    pub fn set_job_queue(&mut self, queue: Arc<dyn JobQueue>) {
        self.job_queue = Some(queue);
    }

    pub async fn create(&self, author_id: UserId, new_post: NewPost) -> Result<Post, PostError> {
        new_post.validate()?;

        let post = self
            .store
            .insert(author_id, new_post.title, new_post.content)
            .await?;
        info!(post_id = post.id, author_id, "Created post");

        self.schedule(Job::IndexPost {
            post_id: post.id,
            title: post.title.clone(),
            content: post.content.clone(),
        })
        .await;
        Ok(post)
    }

    pub async fn update(
        &self,
        post_id: PostId,
        user_id: UserId,
        patch: PostPatch,
    ) -> Result<Post, PostError> {
        patch.validate()?;
        let mut post = self.owned_post(post_id, user_id).await?;

        let reindex = patch.touches_text();
        if let Some(title) = patch.title {
            post.title = title;
        }
        if let Some(content) = patch.content {
            post.content = content;
        }

        let post = self.store.update(post).await?;
        info!(post_id, "Updated post");

        if reindex {
            self.schedule(Job::ReindexPost {
                post_id,
                title: post.title.clone(),
                content: post.content.clone(),
            })
            .await;
        }
        Ok(post)
    }

    pub async fn remove(&self, post_id: PostId, user_id: UserId) -> Result<(), PostError> {
        self.owned_post(post_id, user_id).await?;
        self.store.remove(post_id).await?;
        info!(post_id, "Removed post");

        self.schedule(Job::RemovePost { post_id }).await;
        Ok(())
    }

    pub async fn find_by_id(&self, post_id: PostId) -> Result<Post, PostError> {
        self.store
            .find_by_id(post_id)
            .await?
            .ok_or(PostError::NotFound(post_id))
    }

    pub async fn list_all(&self) -> Result<Vec<Post>, PostError> {
        Ok(self.store.list_all().await?)
    }

    pub async fn list_page(&self, page: usize, limit: usize) -> Result<PostPage, PostError> {
        validate_page(page, limit)?;
        let (data, total) = self.store.list_page(page, limit).await?;
        Ok(PostPage {
            data,
            pagination: Pagination::new(page, limit, total),
        })
    }

    pub async fn list_page_by_author(
        &self,
        author_id: UserId,
        page: usize,
        limit: usize,
    ) -> Result<PostPage, PostError> {
        validate_page(page, limit)?;
        let (data, total) = self
            .store
            .list_page_by_author(author_id, page, limit)
            .await?;
        Ok(PostPage {
            data,
            pagination: Pagination::new(page, limit, total),
        })
    }

    async fn owned_post(&self, post_id: PostId, user_id: UserId) -> Result<Post, PostError> {
        let post = self.find_by_id(post_id).await?;
        if post.author_id != user_id {
            return Err(PostError::PermissionDenied { post_id, user_id });
        }
        Ok(post)
    }

    async fn schedule(&self, job: Job) {
        let Some(queue) = &self.job_queue else {
            return;
        };
        let post_id = job.post_id();
        let kind = job.kind();
        if let Err(err) = queue.enqueue(job).await {
            warn!(post_id, kind, error = %err, "Failed to enqueue index job");
        }
    }
}

fn validate_page(page: usize, limit: usize) -> Result<(), PostError> {
    if page == 0 {
        return Err(PostError::Validation("page starts at 1".to_string()));
    }
    if limit == 0 {
        return Err(PostError::Validation("limit must be at least 1".to_string()));
    }
    Ok(())
}
