use crate::queue::Job;
use llm::{embedding_input, Embedder, LlmError};
use postmap_core::config::JobsConfig;
use postmap_core::model::PostId;
use std::sync::Arc;
use std::time::Duration;
use storage::{IndexError, VectorIndex};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] LlmError),
    #[error("vector index error: {0}")]
    Index(#[from] IndexError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before retry `n` is `backoff * n`.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &JobsConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&JobsConfig::default())
    }
}

pub struct Worker {
    receiver: mpsc::Receiver<Job>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    retry: RetryPolicy,
}

impl Worker {
    pub fn new(
        receiver: mpsc::Receiver<Job>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            receiver,
            index,
            embedder,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Drains the queue until every sender is dropped. Failures are logged, never returned.
    pub async fn run(mut self) {
        info!("Worker started");
        while let Some(job) = self.receiver.recv().await {
            self.process_with_retry(&job).await;
        }
        info!("Worker stopped");
    }

    async fn process_with_retry(&self, job: &Job) {
        let post_id = job.post_id();
        let kind = job.kind();

        for attempt in 1..=self.retry.max_attempts {
            match self.process(job).await {
                Ok(()) => {
                    info!(post_id, job = kind, attempt, "job completed");
                    return;
                }
                Err(e) if attempt < self.retry.max_attempts => {
                    warn!(post_id, job = kind, attempt, error = %e, "job failed, retrying");
                    tokio::time::sleep(self.retry.backoff * attempt).await;
                }
                Err(e) => {
                    error!(post_id, job = kind, attempt, error = %e, "job failed, giving up");
                }
            }
        }
    }

    async fn process(&self, job: &Job) -> Result<(), JobError> {
        match job {
            Job::IndexPost {
                post_id,
                title,
                content,
            } => self.index_post(*post_id, title, content, false).await,
            Job::ReindexPost {
                post_id,
                title,
                content,
            } => self.index_post(*post_id, title, content, true).await,
            Job::RemovePost { post_id } => Ok(self.index.delete(*post_id).await?),
        }
    }

    async fn index_post(
        &self,
        post_id: PostId,
        title: &str,
        content: &str,
        replace: bool,
    ) -> Result<(), JobError> {
        let vector = self.embedder.embed(&embedding_input(title, content)).await?;

        if !replace {
            return Ok(self.index.upsert(post_id, vector, content).await?);
        }

        // A post edited before its first embedding landed has nothing to replace yet.
        match self.index.update(post_id, vector.clone(), content).await {
            Err(IndexError::NotFound(_)) => Ok(self.index.upsert(post_id, vector, content).await?),
            other => Ok(other?),
        }
    }
}
