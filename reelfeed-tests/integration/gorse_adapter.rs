//! Gorse adapter against a local fake Gorse server.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use reelfeed_core::ids::SnowflakeGenerator;
use reelfeed_core::test_support::seeded_store;
use reelfeed_core::{
    FeedRequest, FeedServices, FeedSource, FeedbackEvent, FeedbackKind, RecommendError,
    RecommendationSource, ReelfeedConfig, RequestContext, UserId, Video, VideoId,
};
use reelfeed_gorse::GorseProvider;
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Requests captured by the fake server.
#[derive(Debug, Default)]
struct Recorded {
    recommend_calls: Vec<(String, Option<String>)>,
    session_calls: Vec<(Value, Option<String>)>,
    feedback: Vec<Value>,
    items: Vec<Value>,
    users: Vec<Value>,
    api_keys: Vec<Option<String>>,
}

#[derive(Clone)]
struct FakeGorse {
    recommended: Arc<Vec<String>>,
    popular: Arc<Vec<String>>,
    recorded: Arc<Mutex<Recorded>>,
}

impl FakeGorse {
    fn new(recommended: &[&str], popular: &[&str]) -> Self {
        Self {
            recommended: Arc::new(recommended.iter().map(|id| id.to_string()).collect()),
            popular: Arc::new(popular.iter().map(|id| id.to_string()).collect()),
            recorded: Arc::new(Mutex::new(Recorded::default())),
        }
    }

    fn record_key(&self, headers: &HeaderMap) {
        let key = headers
            .get("x-api-key")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        self.recorded.lock().api_keys.push(key);
    }
}

async fn recommend(
    State(fake): State<FakeGorse>,
    Path(user): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Json<Vec<String>> {
    fake.record_key(&headers);
    fake.recorded
        .lock()
        .recommend_calls
        .push((user, query.get("n").cloned()));
    Json(fake.recommended.as_ref().clone())
}

async fn session_recommend(
    State(fake): State<FakeGorse>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    fake.record_key(&headers);
    fake.recorded
        .lock()
        .session_calls
        .push((body, query.get("n").cloned()));
    let scores: Vec<Value> = fake
        .popular
        .iter()
        .map(|id| json!({"Id": id, "Score": 1.5}))
        .collect();
    Json(Value::Array(scores))
}

async fn insert_feedback(State(fake): State<FakeGorse>, Json(body): Json<Value>) -> Json<Value> {
    let rows = body.as_array().map_or(0, Vec::len);
    fake.recorded.lock().feedback.push(body);
    Json(json!({"RowAffected": rows}))
}

async fn insert_item(State(fake): State<FakeGorse>, Json(body): Json<Value>) -> Json<Value> {
    fake.recorded.lock().items.push(body);
    Json(json!({"RowAffected": 1}))
}

async fn insert_user(State(fake): State<FakeGorse>, Json(body): Json<Value>) -> Json<Value> {
    fake.recorded.lock().users.push(body);
    Json(json!({"RowAffected": 1}))
}

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn spawn_fake(fake: FakeGorse) -> String {
    let router = Router::new()
        .route("/api/recommend/{user}", get(recommend))
        .route("/api/session/recommend", post(session_recommend))
        .route("/api/feedback", post(insert_feedback))
        .route("/api/item", post(insert_item))
        .route("/api/user", post(insert_user))
        .with_state(fake);
    serve(router).await
}

fn provider(endpoint: &str, api_key: Option<&str>) -> GorseProvider {
    GorseProvider::with_config(
        endpoint,
        api_key.map(str::to_string),
        Duration::from_millis(300),
    )
    .unwrap()
}

fn sample_video() -> Video {
    Video {
        id: VideoId(501),
        owner_id: UserId(9),
        title: "Guitar cover".to_string(),
        description: String::new(),
        video_url: "https://cdn.example.com/501.mp4".to_string(),
        cover_url: String::new(),
        created_at: Utc.with_ymd_and_hms(2024, 7, 1, 8, 30, 0).unwrap(),
    }
}

#[tokio::test]
async fn test_personalized_requests_user_and_count() {
    let fake = FakeGorse::new(&["3", "not-a-video", "1"], &[]);
    let endpoint = spawn_fake(fake.clone()).await;

    let ids = provider(&endpoint, Some("secret"))
        .personalized(UserId(42), 5)
        .await
        .unwrap();

    assert_eq!(ids, vec![VideoId(3), VideoId(1)]);
    let recorded = fake.recorded.lock();
    assert_eq!(
        recorded.recommend_calls,
        vec![("42".to_string(), Some("5".to_string()))]
    );
    assert_eq!(recorded.api_keys, vec![Some("secret".to_string())]);
}

#[tokio::test]
async fn test_popular_uses_empty_session() {
    let fake = FakeGorse::new(&[], &["8", "6"]);
    let endpoint = spawn_fake(fake.clone()).await;

    let ids = provider(&endpoint, None).popular(2).await.unwrap();

    assert_eq!(ids, vec![VideoId(8), VideoId(6)]);
    let recorded = fake.recorded.lock();
    assert_eq!(recorded.session_calls, vec![(json!([]), Some("2".to_string()))]);
    assert_eq!(recorded.api_keys, vec![None]);
}

#[tokio::test]
async fn test_zero_limit_skips_request() {
    let fake = FakeGorse::new(&["1"], &["2"]);
    let endpoint = spawn_fake(fake.clone()).await;
    let gorse = provider(&endpoint, None);

    assert!(gorse.personalized(UserId(1), 0).await.unwrap().is_empty());
    assert!(gorse.popular(0).await.unwrap().is_empty());
    assert!(fake.recorded.lock().api_keys.is_empty());
}

#[tokio::test]
async fn test_writes_use_gorse_field_names() {
    let fake = FakeGorse::new(&[], &[]);
    let endpoint = spawn_fake(fake.clone()).await;
    let gorse = provider(&endpoint, None);
    let video = sample_video();

    let event = FeedbackEvent {
        user_id: UserId(9),
        video_id: video.id,
        kind: FeedbackKind::Publish,
        occurred_at: video.created_at,
    };
    gorse.submit_feedback(&event).await.unwrap();

    let tags: BTreeSet<String> = ["guitar", "music"].iter().map(|t| t.to_string()).collect();
    gorse
        .register_item(&video, &["video".to_string()], &tags)
        .await
        .unwrap();
    gorse
        .register_user(UserId(9), &["music".to_string()])
        .await
        .unwrap();

    let recorded = fake.recorded.lock();
    assert_eq!(
        recorded.feedback,
        vec![json!([{
            "FeedbackType": "publish",
            "UserId": "9",
            "ItemId": "501",
            "Timestamp": "2024-07-01T08:30:00+00:00",
        }])]
    );
    assert_eq!(
        recorded.items,
        vec![json!({
            "ItemId": "501",
            "IsHidden": false,
            "Labels": ["guitar", "music"],
            "Categories": ["video"],
            "Timestamp": "2024-07-01T08:30:00+00:00",
            "Comment": "Guitar cover",
        })]
    );
    assert_eq!(recorded.users[0]["UserId"], "9");
    assert_eq!(recorded.users[0]["Labels"], json!(["music"]));
}

#[tokio::test]
async fn test_error_status_maps_to_unavailable() {
    let endpoint =
        serve(Router::new().fallback(|| async { StatusCode::SERVICE_UNAVAILABLE })).await;

    let result = provider(&endpoint, None).personalized(UserId(1), 3).await;

    assert!(matches!(result, Err(RecommendError::Unavailable { .. })));
}

#[tokio::test]
async fn test_malformed_body_maps_to_invalid_response() {
    let endpoint = serve(Router::new().route(
        "/api/recommend/{user}",
        get(|| async { "definitely not json" }),
    ))
    .await;

    let result = provider(&endpoint, None).personalized(UserId(1), 3).await;

    assert!(matches!(result, Err(RecommendError::InvalidResponse { .. })));
}

#[tokio::test]
async fn test_slow_server_maps_to_timeout() {
    let endpoint = serve(Router::new().route(
        "/api/recommend/{user}",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(Vec::<String>::new())
        }),
    ))
    .await;

    let result = provider(&endpoint, None).personalized(UserId(1), 3).await;

    assert!(matches!(result, Err(RecommendError::Timeout { .. })));
}

#[tokio::test]
async fn test_refused_connection_maps_to_network() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = provider(&format!("http://{addr}"), None).popular(3).await;

    assert!(matches!(result, Err(RecommendError::Network { .. })));
}

#[tokio::test]
async fn test_feed_through_gorse_reports_reads() {
    let fake = FakeGorse::new(&["2", "1"], &["3"]);
    let endpoint = spawn_fake(fake.clone()).await;
    let mut config = ReelfeedConfig::for_testing();
    config.recommender.endpoint = Some(endpoint);

    let gorse = GorseProvider::from_config(&config.recommender)
        .unwrap()
        .unwrap();
    let services = FeedServices::assemble(
        &config,
        Arc::new(gorse),
        Arc::new(seeded_store(&[(1, 10), (2, 10), (3, 20)], &[10, 20])),
        Arc::new(SnowflakeGenerator::new(6).unwrap()),
    );

    let batch = services
        .composer
        .compose_feed(&RequestContext::background(), FeedRequest::new(UserId(5), 3))
        .await
        .unwrap();
    services.propagation.drain().await.unwrap();

    assert_eq!(batch.source, FeedSource::Personalized);
    assert_eq!(batch.video_ids(), vec![VideoId(2), VideoId(1), VideoId(3)]);

    let recorded = fake.recorded.lock();
    let reads: Vec<&str> = recorded
        .feedback
        .iter()
        .filter_map(|body| body[0]["ItemId"].as_str())
        .collect();
    assert_eq!(reads, vec!["2", "1", "3"]);
    assert_eq!(recorded.session_calls[0].1, Some("1".to_string()));
}
