//! Video publishing.
//!
//! Persisting the record is the only step the caller waits for. Tagging and
//! recommender registration are handed to the propagation queue.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::ReelfeedError;
use crate::context::RequestContext;
use crate::ids::IdGenerator;
use crate::propagation::{PropagationHandle, PropagationJob};
use crate::store::{StoreError, VideoStore};
use crate::video::{UserId, Video, VideoId};

/// Draft of a video about to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub owner_id: UserId,
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub cover_url: String,
}

/// Persists new videos and schedules their propagation.
#[derive(Debug, Clone)]
pub struct PublishPipeline {
    store: Arc<dyn VideoStore>,
    ids: Arc<dyn IdGenerator>,
    propagation: PropagationHandle,
    store_timeout: Duration,
}

impl PublishPipeline {
    pub fn new(
        store: Arc<dyn VideoStore>,
        ids: Arc<dyn IdGenerator>,
        propagation: PropagationHandle,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            ids,
            propagation,
            store_timeout,
        }
    }

    /// Publishes a video and returns its new id.
    ///
    /// Returns as soon as the record is stored; tag extraction, item
    /// registration and the publish feedback event happen in the background
    /// and can neither delay nor fail this call.
    ///
    /// # Errors
    ///
    /// - `ReelfeedError::Store` - Record could not be persisted
    pub async fn publish(
        &self,
        ctx: &RequestContext,
        request: PublishRequest,
    ) -> Result<VideoId, ReelfeedError> {
        let video = Video {
            id: self.ids.next_id(),
            owner_id: request.owner_id,
            title: request.title,
            description: request.description,
            video_url: request.video_url,
            cover_url: request.cover_url,
            created_at: Utc::now(),
        };

        ctx.run(self.store_timeout, self.store.save_video(&video), || {
            StoreError::Timeout {
                operation: "save_video",
            }
        })
        .await
        .inspect_err(|e| tracing::error!("Failed to save video {}: {}", video.id, e))?;

        let video_id = video.id;
        tracing::info!("Published video {} for user {}", video_id, video.owner_id);

        if let Err(e) = self.propagation.submit(PropagationJob::PublishVideo { video }) {
            tracing::warn!("Skipped propagation for video {}: {}", video_id, e);
        }

        Ok(video_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReelfeedConfig;
    use crate::ids::SnowflakeGenerator;
    use crate::propagation::spawn_propagation_queue;
    use crate::store::MemoryVideoStore;
    use crate::test_support::{RecordingStore, ScriptedRecommender};
    use crate::video::FeedbackKind;

    fn request() -> PublishRequest {
        PublishRequest {
            owner_id: UserId(42),
            title: "跑步遛狗的早晨".to_string(),
            description: "#sunrise by the river".to_string(),
            video_url: "https://cdn.example.com/v/new.mp4".to_string(),
            cover_url: "https://cdn.example.com/c/new.jpg".to_string(),
        }
    }

    fn pipeline(
        store: Arc<dyn VideoStore>,
        recommender: Arc<ScriptedRecommender>,
    ) -> (PublishPipeline, PropagationHandle) {
        let config = ReelfeedConfig::for_testing();
        let propagation = spawn_propagation_queue(&config, recommender);
        let ids = Arc::new(SnowflakeGenerator::new(3).unwrap());
        let pipeline = PublishPipeline::new(
            store,
            ids,
            propagation.clone(),
            config.feed.store_timeout,
        );
        (pipeline, propagation)
    }

    #[tokio::test]
    async fn test_publish_saves_and_propagates() {
        let store = Arc::new(MemoryVideoStore::new());
        let recommender = Arc::new(ScriptedRecommender::new());
        let (pipeline, propagation) = pipeline(store.clone(), recommender.clone());

        let id = pipeline
            .publish(&RequestContext::background(), request())
            .await
            .unwrap();
        propagation.drain().await.unwrap();

        let saved = store.find_video(id).await.unwrap().unwrap();
        assert_eq!(saved.owner_id, UserId(42));
        assert_eq!(saved.title, "跑步遛狗的早晨");

        let items = recommender.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].video_id, id);
        assert!(items[0].tags.contains("sports"));
        assert!(items[0].tags.contains("dog"));
        assert!(items[0].tags.contains("sunrise"));

        let feedback = recommender.feedback();
        assert_eq!(feedback.len(), 1);
        assert_eq!(feedback[0].kind, FeedbackKind::Publish);
        assert_eq!(feedback[0].video_id, id);
    }

    #[tokio::test]
    async fn test_publish_succeeds_when_recommender_is_down() {
        let store = Arc::new(MemoryVideoStore::new());
        let recommender = Arc::new(ScriptedRecommender::unreachable());
        let (pipeline, propagation) = pipeline(store.clone(), recommender.clone());

        let id = pipeline
            .publish(&RequestContext::background(), request())
            .await
            .unwrap();
        propagation.drain().await.unwrap();

        assert!(store.find_video(id).await.unwrap().is_some());
        assert!(recommender.items().is_empty());
        assert_eq!(propagation.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_publish_returns_before_hanging_propagation() {
        let store = Arc::new(MemoryVideoStore::new());
        let recommender = Arc::new(ScriptedRecommender::hanging());
        let (pipeline, _propagation) = pipeline(store.clone(), recommender);

        let result = tokio::time::timeout(
            Duration::from_millis(100),
            pipeline.publish(&RequestContext::background(), request()),
        )
        .await;

        assert!(matches!(result, Ok(Ok(_))));
    }

    #[tokio::test]
    async fn test_store_failure_is_surfaced_and_nothing_propagates() {
        let store = Arc::new(RecordingStore::new(MemoryVideoStore::new()).failing(
            StoreError::Backend {
                reason: "read-only replica".to_string(),
            },
        ));
        let recommender = Arc::new(ScriptedRecommender::new());
        let (pipeline, propagation) = pipeline(store, recommender.clone());

        let result = pipeline
            .publish(&RequestContext::background(), request())
            .await;
        propagation.drain().await.unwrap();

        assert!(matches!(result, Err(ReelfeedError::Store(_))));
        assert_eq!(propagation.stats().submitted, 0);
        assert!(recommender.items().is_empty());
    }

    #[tokio::test]
    async fn test_expired_deadline_fails_save() {
        let store = Arc::new(MemoryVideoStore::new());
        let recommender = Arc::new(ScriptedRecommender::new());
        let (pipeline, _propagation) = pipeline(store.clone(), recommender);
        let ctx = RequestContext::with_timeout(Duration::ZERO);

        let result = pipeline.publish(&ctx, request()).await;

        assert!(matches!(
            result,
            Err(ReelfeedError::Store(StoreError::Timeout { .. }))
        ));
        assert_eq!(store.video_count(), 0);
    }
}
