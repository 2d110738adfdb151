//! Request deadlines bounding collaborator calls.

use std::sync::Arc;
use std::time::Duration;

use reelfeed_core::ids::SnowflakeGenerator;
use reelfeed_core::test_support::{RecordingStore, ScriptedRecommender, seeded_store};
use reelfeed_core::{
    FeedRequest, FeedServices, FeedSource, ReelfeedConfig, ReelfeedError, RequestContext,
    StoreError, UserId,
};
use tokio::time::Instant;

fn services(recommender: ScriptedRecommender, store: RecordingStore) -> FeedServices {
    let mut config = ReelfeedConfig::for_testing();
    config.feed.recommender_timeout = Duration::from_secs(5);
    config.feed.store_timeout = Duration::from_secs(5);

    FeedServices::assemble(
        &config,
        Arc::new(recommender),
        Arc::new(store),
        Arc::new(SnowflakeGenerator::new(2).unwrap()),
    )
}

fn store() -> RecordingStore {
    RecordingStore::new(seeded_store(&[(1, 10), (2, 10), (3, 20)], &[10, 20]))
}

#[tokio::test]
async fn test_hanging_recommender_falls_back_within_request_deadline() {
    let services = services(ScriptedRecommender::hanging(), store());
    let ctx = RequestContext::with_timeout(Duration::from_millis(150));
    let started = Instant::now();

    let batch = services
        .composer
        .compose_feed(&ctx, FeedRequest::new(UserId(1), 3))
        .await
        .unwrap();

    assert_eq!(batch.source, FeedSource::Chronological);
    assert_eq!(batch.len(), 3);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_slow_store_surfaces_timeout() {
    let services = services(
        ScriptedRecommender::unreachable(),
        store().delayed(Duration::from_millis(500)),
    );
    let ctx = RequestContext::with_timeout(Duration::from_millis(100));

    let result = services
        .composer
        .compose_feed(&ctx, FeedRequest::new(UserId(1), 3))
        .await;

    assert!(matches!(
        result,
        Err(ReelfeedError::Store(StoreError::Timeout { .. }))
    ));
}

#[tokio::test]
async fn test_expired_context_surfaces_store_timeout() {
    let services = services(ScriptedRecommender::new().with_personalized(&[1]), store());
    let ctx = RequestContext::with_timeout(Duration::ZERO);

    let result = services
        .composer
        .compose_feed(&ctx, FeedRequest::new(UserId(1), 3))
        .await;

    assert!(matches!(
        result,
        Err(ReelfeedError::Store(StoreError::Timeout { .. }))
    ));
}

#[tokio::test]
async fn test_per_call_budget_applies_without_deadline() {
    let mut config = ReelfeedConfig::for_testing();
    config.feed.recommender_timeout = Duration::from_millis(50);
    let services = FeedServices::assemble(
        &config,
        Arc::new(ScriptedRecommender::hanging()),
        Arc::new(store()),
        Arc::new(SnowflakeGenerator::new(2).unwrap()),
    );

    let batch = services
        .composer
        .compose_feed(&RequestContext::background(), FeedRequest::new(UserId(1), 2))
        .await
        .unwrap();

    assert_eq!(batch.source, FeedSource::Chronological);
}
