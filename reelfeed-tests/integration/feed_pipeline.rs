//! Feed composition across the assembled services.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use reelfeed_core::ids::SnowflakeGenerator;
use reelfeed_core::test_support::{
    RecordingStore, Script, ScriptedRecommender, fixture_author, fixture_time, fixture_video,
    seeded_store,
};
use reelfeed_core::{
    FeedRequest, FeedServices, FeedSource, FeedbackKind, MemoryVideoStore, RecommendError,
    ReelfeedConfig, RequestContext, SeedData, UserId, Video, VideoId,
};

/// Ten videos: ids 1..=10 owned round-robin by users 100, 200 and 300.
fn catalog_store() -> RecordingStore {
    let videos: Vec<(i64, i64)> = (1..=10).map(|id| (id, 100 * (1 + (id % 3)))).collect();
    RecordingStore::new(seeded_store(&videos, &[100, 200, 300]))
}

struct FeedFixture {
    services: FeedServices,
    recommender: Arc<ScriptedRecommender>,
    store: Arc<RecordingStore>,
}

impl FeedFixture {
    fn new(recommender: ScriptedRecommender) -> Self {
        Self::with_store(recommender, catalog_store())
    }

    fn with_store(recommender: ScriptedRecommender, store: RecordingStore) -> Self {
        let recommender = Arc::new(recommender);
        let store = Arc::new(store);
        let services = FeedServices::assemble(
            &ReelfeedConfig::for_testing(),
            recommender.clone(),
            store.clone(),
            Arc::new(SnowflakeGenerator::new(1).unwrap()),
        );

        Self {
            services,
            recommender,
            store,
        }
    }

    async fn feed(&self, viewer: i64, count: usize) -> reelfeed_core::FeedBatch {
        self.services
            .composer
            .compose_feed(
                &RequestContext::background(),
                FeedRequest::new(UserId(viewer), count),
            )
            .await
            .unwrap()
    }
}

fn ids(raw: &[i64]) -> Vec<VideoId> {
    raw.iter().copied().map(VideoId).collect()
}

#[tokio::test]
async fn test_backfill_order_is_personalized_then_popular() {
    let fixture = FeedFixture::new(
        ScriptedRecommender::new()
            .with_personalized(&[7, 2])
            .with_popular(&[9, 4]),
    );

    let batch = fixture.feed(5, 4).await;

    assert_eq!(batch.source, FeedSource::Personalized);
    assert_eq!(batch.video_ids(), ids(&[7, 2, 9, 4]));
}

#[tokio::test]
async fn test_personalized_error_falls_back_to_chronological() {
    let fixture = FeedFixture::new(ScriptedRecommender::new().personalized_script(
        Script::Fail(RecommendError::Unavailable {
            reason: "HTTP 500".to_string(),
        }),
    ));

    let batch = fixture.feed(5, 4).await;

    assert_eq!(batch.source, FeedSource::Chronological);
    assert_eq!(batch.video_ids(), ids(&[10, 9, 8, 7]));
    assert_eq!(fixture.store.chronological_calls(), 1);
}

#[tokio::test]
async fn test_recommender_error_and_empty_result_serve_the_same_feed() {
    let failing = FeedFixture::new(ScriptedRecommender::unreachable());
    let empty = FeedFixture::new(ScriptedRecommender::new());

    let after_error = failing.feed(5, 4).await;
    let after_empty = empty.feed(5, 4).await;

    assert_eq!(after_error.source, FeedSource::Chronological);
    assert_eq!(after_empty.source, FeedSource::Chronological);
    assert_eq!(after_error.video_ids(), after_empty.video_ids());
    assert_eq!(after_error.next_cursor, after_empty.next_cursor);
    assert!(after_error.next_cursor.is_some());
}

#[tokio::test]
async fn test_personalized_and_popular_empty_falls_back() {
    let fixture = FeedFixture::new(ScriptedRecommender::new());

    let batch = fixture.feed(5, 3).await;

    assert_eq!(batch.source, FeedSource::Chronological);
    assert_eq!(batch.len(), 3);
}

#[tokio::test]
async fn test_author_lookup_uses_distinct_owners() {
    // Videos 3, 6 and 9 belong to user 100; 4 and 7 to user 200.
    let fixture = FeedFixture::new(ScriptedRecommender::new().with_personalized(&[3, 4, 6, 7, 9]));

    let batch = fixture.feed(5, 5).await;

    assert_eq!(batch.len(), 5);
    let lookups = fixture.store.author_lookups();
    assert_eq!(lookups.len(), 1);
    assert_eq!(lookups[0], vec![UserId(100), UserId(200)]);
    assert!(batch.items.iter().all(|item| item.author.is_some()));
}

#[tokio::test]
async fn test_missing_author_keeps_video_in_batch() {
    let store = RecordingStore::new(seeded_store(&[(1, 100), (2, 999), (3, 100)], &[100]));
    let fixture =
        FeedFixture::with_store(ScriptedRecommender::new().with_personalized(&[2, 1, 3]), store);

    let batch = fixture.feed(5, 3).await;

    assert_eq!(batch.video_ids(), ids(&[2, 1, 3]));
    assert!(batch.items[0].author.is_none());
    assert!(batch.items[1].author.is_some());
}

#[tokio::test]
async fn test_cursor_walks_chronological_pages_without_overlap() {
    let fixture = FeedFixture::new(ScriptedRecommender::unreachable());
    let ctx = RequestContext::background();

    let first = fixture.feed(0, 4).await;
    let cursor = first.next_cursor.unwrap();
    let second = fixture
        .services
        .composer
        .compose_feed(&ctx, FeedRequest::new(UserId::ANONYMOUS, 4).with_cursor(cursor))
        .await
        .unwrap();

    assert_eq!(first.video_ids(), ids(&[10, 9, 8, 7]));
    assert_eq!(second.video_ids(), ids(&[6, 5, 4, 3]));
}

#[tokio::test]
async fn test_cursor_pages_through_shared_publish_time() {
    let same_instant = fixture_time(50);
    let videos = (1..=6)
        .map(|id| Video {
            created_at: same_instant,
            ..fixture_video(id, 100)
        })
        .collect();
    let store = RecordingStore::new(MemoryVideoStore::with_seed(SeedData {
        authors: vec![fixture_author(100)],
        videos,
    }));
    let fixture = FeedFixture::with_store(ScriptedRecommender::unreachable(), store);
    let ctx = RequestContext::background();

    let mut served = Vec::new();
    let mut cursor = None;
    loop {
        let mut request = FeedRequest::new(UserId::ANONYMOUS, 4);
        if let Some(cursor) = cursor {
            request = request.with_cursor(cursor);
        }
        let batch = fixture
            .services
            .composer
            .compose_feed(&ctx, request)
            .await
            .unwrap();
        if batch.is_empty() {
            break;
        }
        served.extend(batch.video_ids());
        cursor = batch.next_cursor;
    }

    assert_eq!(served, ids(&[6, 5, 4, 3, 2, 1]));
}

#[tokio::test]
async fn test_served_items_are_reported_as_reads() {
    let fixture = FeedFixture::new(ScriptedRecommender::new().with_personalized(&[1, 2, 3]));

    let batch = fixture.feed(42, 3).await;
    fixture.services.propagation.drain().await.unwrap();

    let feedback = fixture.recommender.feedback();
    assert_eq!(feedback.len(), batch.len());
    assert!(feedback
        .iter()
        .all(|event| event.kind == FeedbackKind::Read && event.user_id == UserId(42)));
}

#[tokio::test]
async fn test_anonymous_viewer_gets_a_feed() {
    let fixture = FeedFixture::new(ScriptedRecommender::new().with_personalized(&[5]));

    let batch = fixture.feed(0, 1).await;

    assert_eq!(batch.video_ids(), ids(&[5]));
    assert_eq!(fixture.recommender.personalized_limits(), vec![1]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_batches_have_no_duplicates_and_respect_count(
        personalized in prop::collection::vec(1i64..=14, 0..12),
        popular in prop::collection::vec(1i64..=14, 0..12),
        count in 1usize..12,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let batch = runtime.block_on(async {
            let fixture = FeedFixture::new(
                ScriptedRecommender::new()
                    .with_personalized(&personalized)
                    .with_popular(&popular),
            );
            fixture.feed(9, count).await
        });

        let ids = batch.video_ids();
        let distinct: HashSet<VideoId> = ids.iter().copied().collect();
        prop_assert_eq!(distinct.len(), ids.len());
        prop_assert!(ids.len() <= count);
        prop_assert!(ids.iter().all(|id| (1..=10).contains(&id.as_i64())));
    }
}
