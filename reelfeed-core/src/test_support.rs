//! Scripted collaborators and fixtures for exercising the feed services.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use crate::recommend::{RecommendError, RecommendationSource};
use crate::store::{MemoryVideoStore, SeedData, StoreError, VideoStore};
use crate::video::{Author, FeedCursor, FeedbackEvent, UserId, Video, VideoId};

/// Fixed base instant so fixture timestamps are reproducible.
pub const FIXTURE_EPOCH_SECS: i64 = 1_717_200_000;

/// Publish time `offset_secs` after the fixture epoch.
pub fn fixture_time(offset_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(FIXTURE_EPOCH_SECS + offset_secs, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Video with id `id`, owned by `owner`, published `id` seconds after the
/// fixture epoch so higher ids are newer.
pub fn fixture_video(id: i64, owner: i64) -> Video {
    Video {
        id: VideoId(id),
        owner_id: UserId(owner),
        title: format!("clip {id}"),
        description: String::new(),
        video_url: format!("https://cdn.example.com/v/{id}.mp4"),
        cover_url: format!("https://cdn.example.com/c/{id}.jpg"),
        created_at: fixture_time(id),
    }
}

pub fn fixture_author(id: i64) -> Author {
    Author {
        id: UserId(id),
        name: format!("creator{id}"),
        avatar_url: Some(format!("https://cdn.example.com/a/{id}.jpg")),
        signature: None,
        follower_count: 0,
        following_count: 0,
        published_count: 0,
    }
}

/// Store holding `videos` as `(id, owner)` pairs plus an author for every
/// id in `authors`.
pub fn seeded_store(videos: &[(i64, i64)], authors: &[i64]) -> MemoryVideoStore {
    MemoryVideoStore::with_seed(SeedData {
        authors: authors.iter().map(|id| fixture_author(*id)).collect(),
        videos: videos
            .iter()
            .map(|(id, owner)| fixture_video(*id, *owner))
            .collect(),
    })
}

/// Raw ids to [`VideoId`]s.
pub fn video_ids(raw: &[i64]) -> Vec<VideoId> {
    raw.iter().copied().map(VideoId).collect()
}

/// Scripted answer for one recommender retrieval.
#[derive(Debug, Clone)]
pub enum Script {
    Ids(Vec<VideoId>),
    Fail(RecommendError),
    /// Never resolves; only a deadline ends the call
    Hang,
}

impl Script {
    async fn play(&self, limit: usize) -> Result<Vec<VideoId>, RecommendError> {
        match self {
            Script::Ids(ids) => Ok(ids.iter().copied().take(limit).collect()),
            Script::Fail(error) => Err(error.clone()),
            Script::Hang => std::future::pending().await,
        }
    }
}

/// Item registration captured by [`ScriptedRecommender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredItem {
    pub video_id: VideoId,
    pub categories: Vec<String>,
    pub tags: BTreeSet<String>,
}

/// Recommender double with scripted retrieval and recorded writes.
#[derive(Debug)]
pub struct ScriptedRecommender {
    personalized: Script,
    popular: Script,
    propagation: Option<Script>,
    personalized_limits: Mutex<Vec<usize>>,
    popular_limits: Mutex<Vec<usize>>,
    feedback: Mutex<Vec<FeedbackEvent>>,
    items: Mutex<Vec<RegisteredItem>>,
    users: Mutex<Vec<(UserId, Vec<String>)>>,
}

impl Default for ScriptedRecommender {
    fn default() -> Self {
        Self {
            personalized: Script::Ids(Vec::new()),
            popular: Script::Ids(Vec::new()),
            propagation: None,
            personalized_limits: Mutex::new(Vec::new()),
            popular_limits: Mutex::new(Vec::new()),
            feedback: Mutex::new(Vec::new()),
            items: Mutex::new(Vec::new()),
            users: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedRecommender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_personalized(mut self, ids: &[i64]) -> Self {
        self.personalized = Script::Ids(video_ids(ids));
        self
    }

    pub fn with_popular(mut self, ids: &[i64]) -> Self {
        self.popular = Script::Ids(video_ids(ids));
        self
    }

    pub fn personalized_script(mut self, script: Script) -> Self {
        self.personalized = script;
        self
    }

    pub fn popular_script(mut self, script: Script) -> Self {
        self.popular = script;
        self
    }

    /// Makes feedback and registration calls fail or hang per `script`.
    pub fn propagation_script(mut self, script: Script) -> Self {
        self.propagation = Some(script);
        self
    }

    /// Every retrieval and write fails as unreachable.
    pub fn unreachable() -> Self {
        let error = RecommendError::Network {
            reason: "connection refused".to_string(),
        };
        Self::new()
            .personalized_script(Script::Fail(error.clone()))
            .popular_script(Script::Fail(error.clone()))
            .propagation_script(Script::Fail(error))
    }

    /// Every retrieval and write hangs.
    pub fn hanging() -> Self {
        Self::new()
            .personalized_script(Script::Hang)
            .popular_script(Script::Hang)
            .propagation_script(Script::Hang)
    }

    pub fn personalized_limits(&self) -> Vec<usize> {
        self.personalized_limits.lock().clone()
    }

    pub fn popular_limits(&self) -> Vec<usize> {
        self.popular_limits.lock().clone()
    }

    pub fn feedback(&self) -> Vec<FeedbackEvent> {
        self.feedback.lock().clone()
    }

    pub fn items(&self) -> Vec<RegisteredItem> {
        self.items.lock().clone()
    }

    pub fn users(&self) -> Vec<(UserId, Vec<String>)> {
        self.users.lock().clone()
    }

    async fn propagation_outcome(&self) -> Result<(), RecommendError> {
        match &self.propagation {
            Some(script) => script.play(0).await.map(|_| ()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecommendationSource for ScriptedRecommender {
    async fn personalized(
        &self,
        _viewer: UserId,
        limit: usize,
    ) -> Result<Vec<VideoId>, RecommendError> {
        self.personalized_limits.lock().push(limit);
        self.personalized.play(limit).await
    }

    async fn popular(&self, limit: usize) -> Result<Vec<VideoId>, RecommendError> {
        self.popular_limits.lock().push(limit);
        self.popular.play(limit).await
    }

    async fn submit_feedback(&self, event: &FeedbackEvent) -> Result<(), RecommendError> {
        self.propagation_outcome().await?;
        self.feedback.lock().push(event.clone());
        Ok(())
    }

    async fn register_item(
        &self,
        video: &Video,
        categories: &[String],
        tags: &BTreeSet<String>,
    ) -> Result<(), RecommendError> {
        self.propagation_outcome().await?;
        self.items.lock().push(RegisteredItem {
            video_id: video.id,
            categories: categories.to_vec(),
            tags: tags.clone(),
        });
        Ok(())
    }

    async fn register_user(&self, user: UserId, labels: &[String]) -> Result<(), RecommendError> {
        self.propagation_outcome().await?;
        self.users.lock().push((user, labels.to_vec()));
        Ok(())
    }
}

/// Store wrapper that records lookups and can inject failures.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: MemoryVideoStore,
    author_lookups: Mutex<Vec<Vec<UserId>>>,
    video_lookups: Mutex<Vec<Vec<VideoId>>>,
    chronological_calls: Mutex<usize>,
    fail_with: Option<StoreError>,
    delay: Option<Duration>,
}

impl RecordingStore {
    pub fn new(inner: MemoryVideoStore) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    /// Every operation fails with `error` after being recorded.
    pub fn failing(mut self, error: StoreError) -> Self {
        self.fail_with = Some(error);
        self
    }

    /// Every operation sleeps for `delay` before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn inner(&self) -> &MemoryVideoStore {
        &self.inner
    }

    /// Id lists passed to each `find_authors` call, in call order.
    pub fn author_lookups(&self) -> Vec<Vec<UserId>> {
        self.author_lookups.lock().clone()
    }

    pub fn video_lookups(&self) -> Vec<Vec<VideoId>> {
        self.video_lookups.lock().clone()
    }

    pub fn chronological_calls(&self) -> usize {
        *self.chronological_calls.lock()
    }

    async fn gate(&self) -> Result<(), StoreError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.fail_with {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl VideoStore for RecordingStore {
    async fn find_video(&self, id: VideoId) -> Result<Option<Video>, StoreError> {
        self.gate().await?;
        self.inner.find_video(id).await
    }

    async fn find_videos(&self, ids: &[VideoId]) -> Result<Vec<Video>, StoreError> {
        self.video_lookups.lock().push(ids.to_vec());
        self.gate().await?;
        self.inner.find_videos(ids).await
    }

    async fn find_authors(&self, ids: &[UserId]) -> Result<Vec<Author>, StoreError> {
        self.author_lookups.lock().push(ids.to_vec());
        self.gate().await?;
        self.inner.find_authors(ids).await
    }

    async fn chronological_feed(
        &self,
        viewer: UserId,
        before: FeedCursor,
        limit: usize,
    ) -> Result<Vec<Video>, StoreError> {
        *self.chronological_calls.lock() += 1;
        self.gate().await?;
        self.inner.chronological_feed(viewer, before, limit).await
    }

    async fn search_videos(
        &self,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Video>, StoreError> {
        self.gate().await?;
        self.inner.search_videos(query, offset, limit).await
    }

    async fn published_by(
        &self,
        owner: UserId,
        before: FeedCursor,
        limit: usize,
    ) -> Result<Vec<Video>, StoreError> {
        self.gate().await?;
        self.inner.published_by(owner, before, limit).await
    }

    async fn save_video(&self, video: &Video) -> Result<(), StoreError> {
        self.gate().await?;
        self.inner.save_video(video).await
    }
}
