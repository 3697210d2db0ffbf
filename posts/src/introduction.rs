use chrono::{DateTime, Duration, Utc};
use llm::{LlmError, PostExcerpt, Summarizer};
use postmap_core::config::IntroductionConfig;
use postmap_core::error::{ErrorCode, PostmapError};
use postmap_core::model::UserId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::{PostStore, StoreError, UserStore};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum IntroductionError {
    #[error("User {0} not found")]
    UserNotFound(UserId),
    #[error("Introduction was generated recently, retry after {retry_after}")]
    CooldownActive { retry_after: DateTime<Utc> },
    #[error("At least {required} posts are needed, found {found}")]
    NotEnoughPosts { required: usize, found: usize },
    #[error("Introduction cooldown of {0} hours is out of range")]
    InvalidCooldown(i64),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
    #[error("Summarizer error: {0}")]
    Llm(#[from] LlmError),
}

impl PostmapError for IntroductionError {
    fn error_code(&self) -> ErrorCode {
        match self {
            IntroductionError::UserNotFound(_) => ErrorCode::NotFound,
            IntroductionError::CooldownActive { .. } | IntroductionError::NotEnoughPosts { .. } => {
                ErrorCode::FailedPrecondition
            }
            IntroductionError::InvalidCooldown(_) => ErrorCode::Internal,
            IntroductionError::Store(err) => err.error_code(),
            IntroductionError::Llm(LlmError::NotConfigured) => ErrorCode::FailedPrecondition,
            IntroductionError::Llm(_) => ErrorCode::Unavailable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Introduction {
    pub ai_introduction: String,
    pub generated_at: DateTime<Utc>,
}

/// Generates the one-line author introduction shown on a profile and stores it on the user.
pub struct IntroductionService {
    posts: Arc<dyn PostStore>,
    users: Arc<dyn UserStore>,
    summarizer: Arc<dyn Summarizer>,
    config: IntroductionConfig,
}

impl IntroductionService {
    pub fn new(
        posts: Arc<dyn PostStore>,
        users: Arc<dyn UserStore>,
        summarizer: Arc<dyn Summarizer>,
        config: IntroductionConfig,
    ) -> Self {
        Self {
            posts,
            users,
            summarizer,
            config,
        }
    }

    pub async fn generate(&self, author_id: UserId) -> Result<Introduction, IntroductionError> {
        self.generate_at(author_id, Utc::now()).await
    }

    pub async fn generate_at(
        &self,
        author_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Introduction, IntroductionError> {
        let user = self
            .users
            .find_by_id(author_id)
            .await?
            .ok_or(IntroductionError::UserNotFound(author_id))?;

        if let Some(last) = user.last_introduction_generated {
            let hours = self.config.cooldown_hours;
            let retry_after = Duration::try_hours(hours)
                .and_then(|cooldown| last.checked_add_signed(cooldown))
                .ok_or(IntroductionError::InvalidCooldown(hours))?;
            if now < retry_after {
                return Err(IntroductionError::CooldownActive { retry_after });
            }
        }

        let (recent, total) = self
            .posts
            .list_page_by_author(author_id, 1, self.config.sample_size)
            .await?;
        if total < self.config.min_posts {
            return Err(IntroductionError::NotEnoughPosts {
                required: self.config.min_posts,
                found: total,
            });
        }

        let excerpts: Vec<PostExcerpt> = recent
            .into_iter()
            .map(|post| PostExcerpt {
                title: post.title,
                content: post.content,
            })
            .collect();

        let ai_introduction = match self.summarizer.summarize(&excerpts).await {
            Ok(introduction) => introduction,
            Err(err) => {
                warn!(author_id, error = %err, "Introduction generation failed");
                return Err(err.into());
            }
        };

        self.users
            .set_introduction(author_id, ai_introduction.clone(), now)
            .await?;
        info!(author_id, sampled = excerpts.len(), "Generated author introduction");

        Ok(Introduction {
            ai_introduction,
            generated_at: now,
        })
    }
}
