//! Viewer feed composition.
//!
//! A feed is built from the first source that yields candidates:
//!
//! 1. personalized ids from the recommender, backfilled with popular ids
//!    when short;
//! 2. the store's chronological feed below the request cursor, when the
//!    recommender fails, times out, or yields nothing.
//!
//! Recommender failures never reach the caller. Store failures do, since
//! there is nothing left to fall back to once ids are chosen.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use crate::ReelfeedError;
use crate::config::FeedConfig;
use crate::context::RequestContext;
use crate::hydration::Hydrator;
use crate::propagation::{PropagationHandle, PropagationJob};
use crate::recommend::{RecommendError, RecommendationSource};
use crate::store::{StoreError, VideoStore};
use crate::video::{
    FeedBatch, FeedCursor, FeedItem, FeedSource, FeedbackEvent, FeedbackKind, UserId, Video,
    VideoId,
};

/// One feed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedRequest {
    /// Viewer, possibly [`UserId::ANONYMOUS`]
    pub viewer: UserId,
    /// Requested batch size; zero means the configured default
    pub count: usize,
    /// Only videos positioned strictly below this cursor; defaults to now
    pub cursor: Option<FeedCursor>,
}

impl FeedRequest {
    pub fn new(viewer: UserId, count: usize) -> Self {
        Self {
            viewer,
            count,
            cursor: None,
        }
    }

    /// Continues from a previous batch's watermark.
    pub fn with_cursor(mut self, cursor: FeedCursor) -> Self {
        self.cursor = Some(cursor);
        self
    }
}

/// Builds viewer feeds with recommender fallback and author hydration.
#[derive(Debug, Clone)]
pub struct FeedComposer {
    recommender: Arc<dyn RecommendationSource>,
    store: Arc<dyn VideoStore>,
    hydrator: Hydrator,
    propagation: PropagationHandle,
    config: FeedConfig,
}

impl FeedComposer {
    pub fn new(
        config: FeedConfig,
        recommender: Arc<dyn RecommendationSource>,
        store: Arc<dyn VideoStore>,
        propagation: PropagationHandle,
    ) -> Self {
        let hydrator = Hydrator::new(Arc::clone(&store), config.store_timeout);
        Self {
            recommender,
            store,
            hydrator,
            propagation,
            config,
        }
    }

    /// Composes one ordered, duplicate-free feed batch for a viewer.
    ///
    /// Exhausting every source without an error yields an empty batch.
    ///
    /// # Errors
    ///
    /// - `ReelfeedError::Store` - Chronological query or hydration failed
    pub async fn compose_feed(
        &self,
        ctx: &RequestContext,
        request: FeedRequest,
    ) -> Result<FeedBatch, ReelfeedError> {
        let count = self.config.normalize_count(request.count);

        let Some(ids) = self.recommended_ids(ctx, request.viewer, count).await else {
            return self.chronological_feed(ctx, &request, count).await;
        };

        let mut videos = self
            .hydrator
            .load_videos(ctx, &ids)
            .await
            .inspect_err(|e| tracing::error!("Failed to load recommended videos: {}", e))?;

        if videos.len() < count {
            let shortfall = count - videos.len();
            if self.config.chronological_top_up {
                let chosen: HashSet<VideoId> = videos.iter().map(|video| video.id).collect();
                let extra = self
                    .fetch_chronological(ctx, &request, count)
                    .await?
                    .into_iter()
                    .filter(|video| !chosen.contains(&video.id))
                    .take(shortfall);
                videos.extend(extra);
            } else {
                tracing::debug!(
                    "Personalized feed for viewer {} is {} short of {}",
                    request.viewer,
                    shortfall,
                    count
                );
            }
        }

        let items = self.hydrator.attach_authors(ctx, videos).await?;
        self.record_reads(request.viewer, &items);

        Ok(FeedBatch::new(items, FeedSource::Personalized))
    }

    /// Personalized ids backfilled with popular ids, or `None` to fall back.
    async fn recommended_ids(
        &self,
        ctx: &RequestContext,
        viewer: UserId,
        count: usize,
    ) -> Option<Vec<VideoId>> {
        let budget = self.config.recommender_timeout;
        // Half of the deadline stays with the store for the fallback feed.
        let ctx = &ctx.portion(2);

        let mut ids = match ctx
            .run(budget, self.recommender.personalized(viewer, count), || {
                RecommendError::Timeout {
                    operation: "personalized",
                }
            })
            .await
        {
            Ok(ids) if ids.is_empty() => {
                tracing::debug!("No personalized ids for viewer {}, using fallback feed", viewer);
                return None;
            }
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(
                    "Failed to get recommendations for viewer {}, falling back: {}",
                    viewer,
                    e
                );
                return None;
            }
        };

        if ids.len() < count {
            let wanted = count - ids.len();
            match ctx
                .run(budget, self.recommender.popular(wanted), || {
                    RecommendError::Timeout {
                        operation: "popular",
                    }
                })
                .await
            {
                Ok(popular) => ids.extend(popular),
                Err(e) => tracing::warn!("Failed to backfill popular ids: {}", e),
            }
        }

        let mut seen = HashSet::with_capacity(ids.len());
        ids.retain(|id| seen.insert(*id));
        ids.truncate(count);

        if ids.is_empty() {
            tracing::warn!("No recommendations for viewer {}, using fallback feed", viewer);
            return None;
        }

        Some(ids)
    }

    async fn chronological_feed(
        &self,
        ctx: &RequestContext,
        request: &FeedRequest,
        count: usize,
    ) -> Result<FeedBatch, ReelfeedError> {
        let videos = self.fetch_chronological(ctx, request, count).await?;
        let items = self.hydrator.attach_authors(ctx, videos).await?;
        Ok(FeedBatch::new(items, FeedSource::Chronological))
    }

    async fn fetch_chronological(
        &self,
        ctx: &RequestContext,
        request: &FeedRequest,
        count: usize,
    ) -> Result<Vec<Video>, StoreError> {
        let before = request
            .cursor
            .unwrap_or_else(|| FeedCursor::before(Utc::now()));

        ctx.run(
            self.config.store_timeout,
            self.store.chronological_feed(request.viewer, before, count),
            || StoreError::Timeout {
                operation: "chronological_feed",
            },
        )
        .await
        .inspect_err(|e| tracing::error!("Failed to query chronological feed: {}", e))
    }

    /// Queues one read event per served item.
    fn record_reads(&self, viewer: UserId, items: &[FeedItem]) {
        if items.is_empty() {
            return;
        }

        let events = items
            .iter()
            .map(|item| FeedbackEvent::now(viewer, item.video_id(), FeedbackKind::Read))
            .collect();

        if let Err(e) = self
            .propagation
            .submit(PropagationJob::RecordFeedback { events })
        {
            tracing::warn!("Skipped read feedback for viewer {}: {}", viewer, e);
        }
    }
}
