//! Search and direct video lookups.
//!
//! Unlike the feed there is no fallback chain here: any store failure is
//! surfaced to the caller.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::ReelfeedError;
use crate::context::RequestContext;
use crate::hydration::Hydrator;
use crate::store::{StoreError, VideoStore};
use crate::video::{FeedBatch, FeedCursor, FeedItem, FeedSource, UserId, VideoId};

/// Read-side queries that return hydrated feed items.
#[derive(Debug, Clone)]
pub struct VideoCatalog {
    store: Arc<dyn VideoStore>,
    hydrator: Hydrator,
    store_timeout: Duration,
}

impl VideoCatalog {
    pub fn new(store: Arc<dyn VideoStore>, store_timeout: Duration) -> Self {
        let hydrator = Hydrator::new(Arc::clone(&store), store_timeout);
        Self {
            store,
            hydrator,
            store_timeout,
        }
    }

    /// Free-text search over published videos, newest first.
    ///
    /// A blank query matches nothing and makes no store call.
    ///
    /// # Errors
    ///
    /// - `ReelfeedError::Store` - Search or author lookup failed
    pub async fn search_videos(
        &self,
        ctx: &RequestContext,
        query: &str,
        viewer: UserId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<FeedItem>, ReelfeedError> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        tracing::debug!("Viewer {} searching for '{}'", viewer, query);

        let videos = ctx
            .run(
                self.store_timeout,
                self.store.search_videos(query, offset, limit),
                || StoreError::Timeout {
                    operation: "search_videos",
                },
            )
            .await
            .inspect_err(|e| tracing::error!("Failed to search videos for '{}': {}", query, e))?;

        Ok(self.hydrator.attach_authors(ctx, videos).await?)
    }

    /// Loads one video with its author.
    ///
    /// # Errors
    ///
    /// - `ReelfeedError::VideoNotFound` - No video has this id
    /// - `ReelfeedError::Store` - Lookup failed
    pub async fn video_by_id(
        &self,
        ctx: &RequestContext,
        video_id: VideoId,
    ) -> Result<FeedItem, ReelfeedError> {
        let video = ctx
            .run(self.store_timeout, self.store.find_video(video_id), || {
                StoreError::Timeout {
                    operation: "find_video",
                }
            })
            .await?
            .ok_or(ReelfeedError::VideoNotFound { video_id })?;

        let mut items = self.hydrator.attach_authors(ctx, vec![video]).await?;
        items.pop().ok_or(ReelfeedError::VideoNotFound { video_id })
    }

    /// An author's own videos, newest first, older than `cursor`.
    ///
    /// # Errors
    ///
    /// - `ReelfeedError::Store` - Listing or author lookup failed
    pub async fn list_published(
        &self,
        ctx: &RequestContext,
        owner: UserId,
        cursor: Option<FeedCursor>,
        limit: usize,
    ) -> Result<FeedBatch, ReelfeedError> {
        let before = cursor.unwrap_or_else(|| FeedCursor::before(Utc::now()));

        let videos = ctx
            .run(
                self.store_timeout,
                self.store.published_by(owner, before, limit),
                || StoreError::Timeout {
                    operation: "published_by",
                },
            )
            .await?;

        let items = self.hydrator.attach_authors(ctx, videos).await?;
        Ok(FeedBatch::new(items, FeedSource::Chronological))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingStore, fixture_time, seeded_store};

    fn catalog_with(store: RecordingStore) -> (VideoCatalog, Arc<RecordingStore>) {
        let store = Arc::new(store);
        (
            VideoCatalog::new(store.clone(), Duration::from_millis(500)),
            store,
        )
    }

    fn catalog() -> (VideoCatalog, Arc<RecordingStore>) {
        catalog_with(RecordingStore::new(seeded_store(
            &[(1, 10), (2, 20), (3, 10), (4, 99)],
            &[10, 20],
        )))
    }

    #[tokio::test]
    async fn test_search_hydrates_newest_first() {
        let (catalog, store) = catalog();

        let items = catalog
            .search_videos(&RequestContext::background(), "  CLIP ", UserId(1), 0, 10)
            .await
            .unwrap();

        let ids: Vec<VideoId> = items.iter().map(FeedItem::video_id).collect();
        assert_eq!(ids, vec![VideoId(4), VideoId(3), VideoId(2), VideoId(1)]);
        assert!(items[0].author.is_none());
        assert_eq!(
            store.author_lookups(),
            vec![vec![UserId(99), UserId(10), UserId(20)]]
        );
    }

    #[tokio::test]
    async fn test_search_pages_with_offset() {
        let (catalog, _) = catalog();

        let items = catalog
            .search_videos(&RequestContext::background(), "clip", UserId(1), 1, 2)
            .await
            .unwrap();

        let ids: Vec<VideoId> = items.iter().map(FeedItem::video_id).collect();
        assert_eq!(ids, vec![VideoId(3), VideoId(2)]);
    }

    #[tokio::test]
    async fn test_blank_query_makes_no_store_calls() {
        let (catalog, store) = catalog();

        let items = catalog
            .search_videos(&RequestContext::background(), "   ", UserId(1), 0, 10)
            .await
            .unwrap();

        assert!(items.is_empty());
        assert!(store.author_lookups().is_empty());
    }

    #[tokio::test]
    async fn test_search_failure_is_surfaced() {
        let (catalog, _) = catalog_with(RecordingStore::new(seeded_store(&[(1, 10)], &[10])).failing(
            StoreError::Backend {
                reason: "index offline".to_string(),
            },
        ));

        let result = catalog
            .search_videos(&RequestContext::background(), "clip", UserId(1), 0, 10)
            .await;

        assert!(matches!(result, Err(ReelfeedError::Store(_))));
    }

    #[tokio::test]
    async fn test_video_by_id() {
        let (catalog, _) = catalog();
        let ctx = RequestContext::background();

        let item = catalog.video_by_id(&ctx, VideoId(2)).await.unwrap();
        assert_eq!(item.author.map(|author| author.id), Some(UserId(20)));

        let missing = catalog.video_by_id(&ctx, VideoId(404)).await.unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn test_list_published_pages_by_cursor() {
        let (catalog, _) = catalog();
        let ctx = RequestContext::background();

        let first = catalog
            .list_published(&ctx, UserId(10), None, 1)
            .await
            .unwrap();
        assert_eq!(first.video_ids(), vec![VideoId(3)]);
        assert_eq!(
            first.next_cursor,
            Some(FeedCursor {
                created_at: fixture_time(3),
                video_id: VideoId(3),
            })
        );

        let second = catalog
            .list_published(&ctx, UserId(10), first.next_cursor, 5)
            .await
            .unwrap();
        assert_eq!(second.video_ids(), vec![VideoId(1)]);
        assert_eq!(second.source, FeedSource::Chronological);
    }
}
