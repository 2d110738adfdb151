//! Publishing stays fast and successful whatever the recommender does.

use std::sync::Arc;
use std::time::Duration;

use reelfeed_core::ids::SnowflakeGenerator;
use reelfeed_core::test_support::ScriptedRecommender;
use reelfeed_core::{
    FeedServices, FeedbackKind, MemoryVideoStore, PublishRequest, ReelfeedConfig, RequestContext,
    UserId,
};
use tokio::time::Instant;

struct PublishFixture {
    services: FeedServices,
    recommender: Arc<ScriptedRecommender>,
}

impl PublishFixture {
    fn new(recommender: ScriptedRecommender) -> Self {
        Self::with_config(recommender, ReelfeedConfig::for_testing())
    }

    fn with_config(recommender: ScriptedRecommender, config: ReelfeedConfig) -> Self {
        let recommender = Arc::new(recommender);
        let services = FeedServices::assemble(
            &config,
            recommender.clone(),
            Arc::new(MemoryVideoStore::new()),
            Arc::new(SnowflakeGenerator::new(4).unwrap()),
        );
        Self {
            services,
            recommender,
        }
    }
}

fn draft(title: &str, description: &str) -> PublishRequest {
    PublishRequest {
        owner_id: UserId(8),
        title: title.to_string(),
        description: description.to_string(),
        video_url: "https://cdn.example.com/v/upload.mp4".to_string(),
        cover_url: String::new(),
    }
}

#[tokio::test]
async fn test_published_video_is_visible_and_tagged() {
    let fixture = PublishFixture::new(ScriptedRecommender::new());
    let ctx = RequestContext::background();

    let video_id = fixture
        .services
        .publisher
        .publish(&ctx, draft("猫咪的日常", "#Caturday"))
        .await
        .unwrap();
    fixture.services.propagation.drain().await.unwrap();

    let item = fixture
        .services
        .catalog
        .video_by_id(&ctx, video_id)
        .await
        .unwrap();
    assert_eq!(item.video.title, "猫咪的日常");

    let items = fixture.recommender.items();
    assert_eq!(items.len(), 1);
    let tags: Vec<&str> = items[0].tags.iter().map(String::as_str).collect();
    assert_eq!(tags, vec!["Caturday", "animal", "cat", "daily", "lifestyle", "pet"]);
    assert_eq!(items[0].categories, vec!["video".to_string()]);

    let feedback = fixture.recommender.feedback();
    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback[0].kind, FeedbackKind::Publish);
    assert_eq!(feedback[0].user_id, UserId(8));
}

#[tokio::test]
async fn test_untagged_content_gets_general_tag() {
    let fixture = PublishFixture::new(ScriptedRecommender::new());

    fixture
        .services
        .publisher
        .publish(&RequestContext::background(), draft("untitled", ""))
        .await
        .unwrap();
    fixture.services.propagation.drain().await.unwrap();

    let items = fixture.recommender.items();
    assert_eq!(items[0].tags.iter().collect::<Vec<_>>(), vec!["general"]);
}

#[tokio::test]
async fn test_unreachable_recommender_does_not_fail_publish() {
    let fixture = PublishFixture::new(ScriptedRecommender::unreachable());
    let ctx = RequestContext::background();

    let video_id = fixture
        .services
        .publisher
        .publish(&ctx, draft("编程入门", ""))
        .await
        .unwrap();
    fixture.services.propagation.drain().await.unwrap();

    assert!(fixture.services.catalog.video_by_id(&ctx, video_id).await.is_ok());
    let stats = fixture.services.propagation.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 0);
}

#[tokio::test]
async fn test_hanging_recommender_does_not_delay_publish() {
    let fixture = PublishFixture::new(ScriptedRecommender::hanging());
    let started = Instant::now();

    for n in 0..5 {
        fixture
            .services
            .publisher
            .publish(&RequestContext::background(), draft(&format!("clip {n}"), ""))
            .await
            .unwrap();
    }

    assert!(started.elapsed() < Duration::from_millis(200));

    fixture.services.propagation.drain().await.unwrap();
    assert_eq!(fixture.services.propagation.stats().timed_out, 5);
}

#[tokio::test]
async fn test_full_queue_drops_jobs_but_publishes() {
    let mut config = ReelfeedConfig::for_testing();
    config.propagation.queue_capacity = 1;
    config.propagation.job_timeout = Duration::from_millis(200);
    let fixture = PublishFixture::with_config(ScriptedRecommender::hanging(), config);

    for n in 0..10 {
        fixture
            .services
            .publisher
            .publish(&RequestContext::background(), draft(&format!("burst {n}"), ""))
            .await
            .unwrap();
    }

    let stats = fixture.services.propagation.stats();
    assert_eq!(stats.submitted + stats.dropped, 10);
    assert!(stats.dropped > 0);
}

#[tokio::test]
async fn test_ids_are_unique_across_publishes() {
    let fixture = PublishFixture::new(ScriptedRecommender::new());
    let ctx = RequestContext::background();

    let mut ids = Vec::new();
    for n in 0..50 {
        ids.push(
            fixture
                .services
                .publisher
                .publish(&ctx, draft(&format!("clip {n}"), ""))
                .await
                .unwrap(),
        );
    }

    let mut sorted = ids.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), ids.len());
    assert_eq!(sorted, ids);
}
