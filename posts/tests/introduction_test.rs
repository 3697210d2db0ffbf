use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use llm::{KeywordSummarizer, LlmError, PostExcerpt, Summarizer};
use postmap_core::config::IntroductionConfig;
use postmap_core::error::{ErrorCode, PostmapError};
use posts::{IntroductionError, IntroductionService};
use std::sync::{Arc, Mutex};
use storage::{InMemoryPostStore, InMemoryUserStore, PostStore, UserStore};

/// Remembers what it was asked to summarize.
#[derive(Default)]
struct RecordingSummarizer {
    seen: Mutex<Vec<PostExcerpt>>,
    fail: bool,
}

#[async_trait]
impl Summarizer for RecordingSummarizer {
    async fn summarize(&self, posts: &[PostExcerpt]) -> Result<String, LlmError> {
        if self.fail {
            return Err(LlmError::Request("upstream 503".to_string()));
        }
        *self.seen.lock().unwrap() = posts.to_vec();
        Ok("Tinkerer".to_string())
    }
}

struct Fixture {
    posts: Arc<InMemoryPostStore>,
    users: Arc<InMemoryUserStore>,
    author_id: u64,
}

impl Fixture {
    async fn with_posts(count: usize) -> Self {
        let posts = Arc::new(InMemoryPostStore::new());
        let users = Arc::new(InMemoryUserStore::new());
        let author = users
            .insert("writer@example.com".to_string(), "hash".to_string())
            .await
            .unwrap();
        for i in 0..count {
            posts
                .insert(author.id, format!("Rust note {i}"), format!("body {i}"))
                .await
                .unwrap();
        }
        Self {
            posts,
            users,
            author_id: author.id,
        }
    }

    fn service(
        &self,
        summarizer: Arc<dyn Summarizer>,
        config: IntroductionConfig,
    ) -> IntroductionService {
        IntroductionService::new(self.posts.clone(), self.users.clone(), summarizer, config)
    }

    async fn stored_introduction(&self) -> Option<String> {
        self.users
            .find_by_id(self.author_id)
            .await
            .unwrap()
            .unwrap()
            .ai_introduction
    }
}

fn config() -> IntroductionConfig {
    IntroductionConfig {
        min_posts: 10,
        sample_size: 5,
        cooldown_hours: 24,
    }
}

#[tokio::test]
async fn requires_minimum_post_count() {
    let fixture = Fixture::with_posts(9).await;
    let service = fixture.service(Arc::new(RecordingSummarizer::default()), config());

    let err = service.generate(fixture.author_id).await.unwrap_err();
    assert!(matches!(
        err,
        IntroductionError::NotEnoughPosts {
            required: 10,
            found: 9
        }
    ));
    assert_eq!(err.error_code(), ErrorCode::FailedPrecondition);
    assert_eq!(fixture.stored_introduction().await, None);
}

#[tokio::test]
async fn unknown_author_is_not_found() {
    let fixture = Fixture::with_posts(10).await;
    let service = fixture.service(Arc::new(RecordingSummarizer::default()), config());

    let err = service.generate(fixture.author_id + 100).await.unwrap_err();
    assert!(matches!(err, IntroductionError::UserNotFound(_)));
    assert_eq!(err.error_code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn summarizes_newest_sample_and_enforces_cooldown() {
    let fixture = Fixture::with_posts(12).await;
    let summarizer = Arc::new(RecordingSummarizer::default());
    let service = fixture.service(summarizer.clone(), config());
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();

    let intro = service.generate_at(fixture.author_id, now).await.unwrap();
    assert_eq!(intro.ai_introduction, "Tinkerer");
    assert_eq!(intro.generated_at, now);

    let user = fixture
        .users
        .find_by_id(fixture.author_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.ai_introduction.as_deref(), Some("Tinkerer"));
    assert_eq!(user.last_introduction_generated, Some(now));

    let titles: Vec<String> = summarizer
        .seen
        .lock()
        .unwrap()
        .iter()
        .map(|p| p.title.clone())
        .collect();
    assert_eq!(titles.len(), 5);
    assert_eq!(titles[0], "Rust note 11");

    let err = service
        .generate_at(fixture.author_id, now + Duration::hours(23))
        .await
        .unwrap_err();
    match err {
        IntroductionError::CooldownActive { retry_after } => {
            assert_eq!(retry_after, now + Duration::hours(24));
        }
        other => panic!("expected cooldown, got {other:?}"),
    }

    assert!(service
        .generate_at(fixture.author_id, now + Duration::hours(25))
        .await
        .is_ok());
}

#[tokio::test]
async fn cooldown_survives_a_new_service_instance() {
    let fixture = Fixture::with_posts(10).await;
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();

    fixture
        .service(Arc::new(RecordingSummarizer::default()), config())
        .generate_at(fixture.author_id, now)
        .await
        .unwrap();

    let restarted = fixture.service(Arc::new(RecordingSummarizer::default()), config());
    let err = restarted
        .generate_at(fixture.author_id, now + Duration::hours(1))
        .await
        .unwrap_err();
    assert!(matches!(err, IntroductionError::CooldownActive { .. }));
}

#[tokio::test]
async fn out_of_range_cooldown_is_an_error_not_a_panic() {
    let fixture = Fixture::with_posts(10).await;
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    fixture
        .users
        .set_introduction(fixture.author_id, "Earlier".to_string(), now)
        .await
        .unwrap();

    for hours in [i64::MAX, i64::MIN, 9_000_000_000_000] {
        let service = fixture.service(
            Arc::new(RecordingSummarizer::default()),
            IntroductionConfig {
                cooldown_hours: hours,
                ..config()
            },
        );
        let err = service
            .generate_at(fixture.author_id, now + Duration::hours(1))
            .await
            .unwrap_err();
        assert!(matches!(err, IntroductionError::InvalidCooldown(h) if h == hours));
        assert_eq!(err.error_code(), ErrorCode::Internal);
    }
    assert_eq!(fixture.stored_introduction().await.as_deref(), Some("Earlier"));
}

#[tokio::test]
async fn failed_summary_does_not_start_cooldown() {
    let fixture = Fixture::with_posts(10).await;
    let failing = Arc::new(RecordingSummarizer {
        fail: true,
        ..RecordingSummarizer::default()
    });
    let service = fixture.service(failing, config());

    let err = service.generate(fixture.author_id).await.unwrap_err();
    assert!(matches!(err, IntroductionError::Llm(_)));
    assert_eq!(err.error_code(), ErrorCode::Unavailable);

    let user = fixture
        .users
        .find_by_id(fixture.author_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.last_introduction_generated, None);
}

#[tokio::test]
async fn keyword_summarizer_produces_short_line() {
    let fixture = Fixture::with_posts(10).await;
    let service = fixture.service(
        Arc::new(KeywordSummarizer::new()),
        IntroductionConfig::default(),
    );

    let intro = service.generate(fixture.author_id).await.unwrap();
    assert!(intro.ai_introduction.contains("rust"));
    assert!(intro.ai_introduction.chars().count() <= 60);
    assert_eq!(
        fixture.stored_introduction().await,
        Some(intro.ai_introduction)
    );
}
