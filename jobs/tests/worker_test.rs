use async_trait::async_trait;
use jobs::{ChannelJobQueue, Job, JobQueue, RetryPolicy, Worker};
use llm::{DeterministicEmbedder, Embedder, LlmError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storage::{LinearVectorIndex, VectorIndex};

/// Fails the first `failures` calls, then delegates.
struct FlakyEmbedder {
    failures: usize,
    calls: AtomicUsize,
    inner: DeterministicEmbedder,
}

impl FlakyEmbedder {
    fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
            inner: DeterministicEmbedder::new("test-model", 4),
        }
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(LlmError::Request("rate limited".to_string()));
        }
        self.inner.embed(text).await
    }
}

async fn run_jobs(
    index: Arc<LinearVectorIndex>,
    embedder: Arc<dyn Embedder>,
    retry: RetryPolicy,
    jobs: Vec<Job>,
) {
    let (queue, receiver) = ChannelJobQueue::bounded(8);
    let worker = Worker::new(receiver, index, embedder).with_retry_policy(retry);
    let handle = tokio::spawn(worker.run());

    for job in jobs {
        queue.enqueue(job).await.expect("enqueue");
    }
    drop(queue);
    handle.await.expect("worker join");
}

fn index_job(post_id: u64, title: &str) -> Job {
    Job::IndexPost {
        post_id,
        title: title.to_string(),
        content: format!("{title} body"),
    }
}

#[tokio::test]
async fn worker_indexes_reindexes_and_removes() {
    let index = Arc::new(LinearVectorIndex::new());
    let embedder: Arc<dyn Embedder> = Arc::new(DeterministicEmbedder::new("test-model", 4));

    run_jobs(
        index.clone(),
        embedder,
        RetryPolicy::default(),
        vec![
            index_job(1, "first"),
            index_job(2, "second"),
            Job::ReindexPost {
                post_id: 1,
                title: "first".to_string(),
                content: "edited".to_string(),
            },
            Job::ReindexPost {
                post_id: 3,
                title: "late".to_string(),
                content: "never indexed before".to_string(),
            },
            Job::RemovePost { post_id: 2 },
        ],
    )
    .await;

    let ids: Vec<u64> = index
        .fetch_all()
        .await
        .unwrap()
        .iter()
        .map(|e| e.post_id)
        .collect();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(index.content(1).await.as_deref(), Some("edited"));
}

#[tokio::test(start_paused = true)]
async fn worker_retries_transient_failures() {
    let index = Arc::new(LinearVectorIndex::new());
    let embedder = Arc::new(FlakyEmbedder::new(2));

    run_jobs(
        index.clone(),
        embedder.clone(),
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(50),
        },
        vec![index_job(1, "flaky")],
    )
    .await;

    assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    assert_eq!(index.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn worker_gives_up_and_keeps_processing() {
    let index = Arc::new(LinearVectorIndex::new());
    let embedder = Arc::new(FlakyEmbedder::new(2));

    run_jobs(
        index.clone(),
        embedder.clone(),
        RetryPolicy {
            max_attempts: 2,
            backoff: Duration::from_millis(50),
        },
        vec![index_job(1, "doomed"), index_job(2, "fine")],
    )
    .await;

    let ids: Vec<u64> = index
        .fetch_all()
        .await
        .unwrap()
        .iter()
        .map(|e| e.post_id)
        .collect();
    assert_eq!(ids, vec![2]);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
}
