use postmap_core::model::PostId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Vector-index maintenance that runs after a post write has already been answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Job {
    IndexPost {
        post_id: PostId,
        title: String,
        content: String,
    },
    ReindexPost {
        post_id: PostId,
        title: String,
        content: String,
    },
    RemovePost {
        post_id: PostId,
    },
}

impl Job {
    pub fn post_id(&self) -> PostId {
        match self {
            Job::IndexPost { post_id, .. }
            | Job::ReindexPost { post_id, .. }
            | Job::RemovePost { post_id } => *post_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Job::IndexPost { .. } => "index_post",
            Job::ReindexPost { .. } => "reindex_post",
            Job::RemovePost { .. } => "remove_post",
        }
    }
}

#[async_trait::async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: Job) -> anyhow::Result<()>;
}

/// Simple in-memory queue using Tokio channels
pub struct ChannelJobQueue {
    sender: mpsc::Sender<Job>,
}

impl ChannelJobQueue {
    pub fn new(sender: mpsc::Sender<Job>) -> Self {
        Self { sender }
    }

    /// Creates a bounded queue and the receiver a `Worker` drains.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<Job>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self::new(sender), receiver)
    }
}

#[async_trait::async_trait]
impl JobQueue for ChannelJobQueue {
    async fn enqueue(&self, job: Job) -> anyhow::Result<()> {
        self.sender
            .send(job)
            .await
            .map_err(|e| anyhow::anyhow!("Queue send error: {}", e))
    }
}
