//! Search and lookups through the assembled catalog.

use std::sync::Arc;

use reelfeed_core::ids::SnowflakeGenerator;
use reelfeed_core::test_support::{RecordingStore, ScriptedRecommender, fixture_author};
use reelfeed_core::{
    FeedServices, MemoryVideoStore, ReelfeedConfig, ReelfeedError, RequestContext, SeedData,
    StoreError, UserId, VideoId,
};

const SEED: &str = r#"{
    "authors": [
        {"id": 1, "name": "chef"},
        {"id": 2, "name": "runner", "follower_count": 12}
    ],
    "videos": [
        {"id": 11, "owner_id": 1, "title": "Hotpot night", "video_url": "https://cdn.example.com/11.mp4", "created_at": "2024-05-01T10:00:00Z"},
        {"id": 12, "owner_id": 2, "title": "Trail run", "description": "hotpot after", "video_url": "https://cdn.example.com/12.mp4", "created_at": "2024-05-02T10:00:00Z"},
        {"id": 13, "owner_id": 1, "title": "Dumplings", "video_url": "https://cdn.example.com/13.mp4", "created_at": "2024-05-03T10:00:00Z"},
        {"id": 14, "owner_id": 1, "title": "HOTPOT again", "video_url": "https://cdn.example.com/14.mp4", "created_at": "2024-05-04T10:00:00Z"}
    ]
}"#;

fn services(store: RecordingStore) -> (FeedServices, Arc<RecordingStore>) {
    let store = Arc::new(store);
    let services = FeedServices::assemble(
        &ReelfeedConfig::for_testing(),
        Arc::new(ScriptedRecommender::new()),
        store.clone(),
        Arc::new(SnowflakeGenerator::new(5).unwrap()),
    );
    (services, store)
}

fn seeded() -> RecordingStore {
    RecordingStore::new(MemoryVideoStore::with_seed(SeedData::from_json(SEED).unwrap()))
}

#[tokio::test]
async fn test_search_matches_title_and_description() {
    let (services, store) = services(seeded());

    let items = services
        .catalog
        .search_videos(&RequestContext::background(), "hotpot", UserId(3), 0, 10)
        .await
        .unwrap();

    let ids: Vec<VideoId> = items.iter().map(|item| item.video.id).collect();
    assert_eq!(ids, vec![VideoId(14), VideoId(12), VideoId(11)]);
    assert_eq!(store.author_lookups(), vec![vec![UserId(1), UserId(2)]]);
    assert_eq!(items[1].author.as_ref().map(|a| a.follower_count), Some(12));
}

#[tokio::test]
async fn test_search_without_matches_is_empty() {
    let (services, _) = services(seeded());

    let items = services
        .catalog
        .search_videos(&RequestContext::background(), "karaoke", UserId(3), 0, 10)
        .await
        .unwrap();

    assert!(items.is_empty());
}

#[tokio::test]
async fn test_search_store_failure_is_surfaced() {
    let (services, _) = services(seeded().failing(StoreError::Backend {
        reason: "replica lag".to_string(),
    }));

    let error = services
        .catalog
        .search_videos(&RequestContext::background(), "hotpot", UserId(3), 0, 10)
        .await
        .unwrap_err();

    assert!(matches!(error, ReelfeedError::Store(StoreError::Backend { .. })));
    assert_eq!(error.user_message(), "Video service unavailable");
}

#[tokio::test]
async fn test_show_unknown_video_is_not_found() {
    let (services, _) = services(seeded());

    let error = services
        .catalog
        .video_by_id(&RequestContext::background(), VideoId(99))
        .await
        .unwrap_err();

    assert!(error.is_not_found());
}

#[tokio::test]
async fn test_author_added_later_is_joined() {
    let (services, store) = services(seeded());
    store.inner().insert_author(fixture_author(7));

    let published = services
        .publisher
        .publish(
            &RequestContext::background(),
            reelfeed_core::PublishRequest {
                owner_id: UserId(7),
                title: "first upload".to_string(),
                description: String::new(),
                video_url: "https://cdn.example.com/new.mp4".to_string(),
                cover_url: String::new(),
            },
        )
        .await
        .unwrap();

    let item = services
        .catalog
        .video_by_id(&RequestContext::background(), published)
        .await
        .unwrap();
    assert_eq!(item.author.map(|a| a.name), Some("creator7".to_string()));
}
