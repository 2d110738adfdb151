//! Joining videos with their authors.
//!
//! Shared by the feed, search and catalog paths: one batched video lookup,
//! one batched author lookup over distinct owners, then an order-preserving
//! join.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::context::RequestContext;
use crate::store::{StoreError, VideoStore};
use crate::video::{Author, FeedItem, UserId, Video, VideoId};

/// Resolves ids and owners against a [`VideoStore`] within a request budget.
#[derive(Debug, Clone)]
pub struct Hydrator {
    store: Arc<dyn VideoStore>,
    call_timeout: Duration,
}

impl Hydrator {
    pub fn new(store: Arc<dyn VideoStore>, call_timeout: Duration) -> Self {
        Self {
            store,
            call_timeout,
        }
    }

    /// Loads the videos for `ids` in id order.
    ///
    /// Duplicate ids collapse to their first position; ids without a record
    /// are skipped.
    ///
    /// # Errors
    ///
    /// - `StoreError::Backend` - Video lookup failed
    /// - `StoreError::Timeout` - Video lookup exceeded its budget
    pub async fn load_videos(
        &self,
        ctx: &RequestContext,
        ids: &[VideoId],
    ) -> Result<Vec<Video>, StoreError> {
        let ids = distinct(ids.iter().copied());
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let found = ctx
            .run(self.call_timeout, self.store.find_videos(&ids), || {
                StoreError::Timeout {
                    operation: "find_videos",
                }
            })
            .await?;

        let mut by_id: HashMap<VideoId, Video> =
            found.into_iter().map(|video| (video.id, video)).collect();

        let ordered: Vec<Video> = ids.iter().filter_map(|id| by_id.remove(id)).collect();
        if ordered.len() < ids.len() {
            tracing::debug!(
                "{} of {} requested videos have no record",
                ids.len() - ordered.len(),
                ids.len()
            );
        }

        Ok(ordered)
    }

    /// Joins each video with its author, keeping video order.
    ///
    /// Videos sharing an id collapse to the first occurrence. Authors are
    /// fetched once per distinct owner; a video whose owner is missing keeps
    /// its place with no author.
    ///
    /// # Errors
    ///
    /// - `StoreError::Backend` - Author lookup failed
    /// - `StoreError::Timeout` - Author lookup exceeded its budget
    pub async fn attach_authors(
        &self,
        ctx: &RequestContext,
        videos: Vec<Video>,
    ) -> Result<Vec<FeedItem>, StoreError> {
        let mut seen = HashSet::with_capacity(videos.len());
        let videos: Vec<Video> = videos
            .into_iter()
            .filter(|video| seen.insert(video.id))
            .collect();

        if videos.is_empty() {
            return Ok(Vec::new());
        }

        let owner_ids = distinct(videos.iter().map(|video| video.owner_id));
        let authors = ctx
            .run(self.call_timeout, self.store.find_authors(&owner_ids), || {
                StoreError::Timeout {
                    operation: "find_authors",
                }
            })
            .await?;

        let by_owner: HashMap<UserId, Author> = authors
            .into_iter()
            .map(|author| (author.id, author))
            .collect();

        Ok(videos
            .into_iter()
            .map(|video| {
                let author = by_owner.get(&video.owner_id).cloned();
                if author.is_none() {
                    tracing::warn!(
                        "Author {} not found for video {}",
                        video.owner_id,
                        video.id
                    );
                }
                FeedItem { video, author }
            })
            .collect())
    }

    /// Loads `ids` and joins authors in one pass.
    ///
    /// # Errors
    ///
    /// Any error from [`Hydrator::load_videos`] or [`Hydrator::attach_authors`].
    pub async fn hydrate_ids(
        &self,
        ctx: &RequestContext,
        ids: &[VideoId],
    ) -> Result<Vec<FeedItem>, StoreError> {
        let videos = self.load_videos(ctx, ids).await?;
        self.attach_authors(ctx, videos).await
    }
}

/// Order-preserving dedup.
fn distinct<T: Copy + Eq + std::hash::Hash>(values: impl Iterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    values.filter(|value| seen.insert(*value)).collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::store::{MemoryVideoStore, SeedData};

    fn video(id: i64, owner: i64) -> Video {
        Video {
            id: VideoId(id),
            owner_id: UserId(owner),
            title: format!("clip {id}"),
            description: String::new(),
            video_url: format!("https://cdn.example.com/{id}.mp4"),
            cover_url: String::new(),
            created_at: Utc.timestamp_opt(1_000 + id, 0).unwrap(),
        }
    }

    fn author(id: i64) -> Author {
        Author {
            id: UserId(id),
            name: format!("user{id}"),
            avatar_url: None,
            signature: None,
            follower_count: 0,
            following_count: 0,
            published_count: 0,
        }
    }

    fn hydrator() -> Hydrator {
        let store = MemoryVideoStore::with_seed(SeedData {
            authors: vec![author(1), author(2)],
            videos: vec![video(1, 1), video(2, 2), video(3, 1), video(4, 9)],
        });
        Hydrator::new(Arc::new(store), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_hydrate_keeps_id_order_and_skips_unknown() {
        let items = hydrator()
            .hydrate_ids(
                &RequestContext::background(),
                &[VideoId(3), VideoId(42), VideoId(1), VideoId(3)],
            )
            .await
            .unwrap();

        let ids: Vec<VideoId> = items.iter().map(FeedItem::video_id).collect();
        assert_eq!(ids, vec![VideoId(3), VideoId(1)]);
        assert!(items.iter().all(|item| {
            item.author
                .as_ref()
                .is_some_and(|author| author.id == item.video.owner_id)
        }));
    }

    #[tokio::test]
    async fn test_missing_author_keeps_video() {
        let items = hydrator()
            .hydrate_ids(&RequestContext::background(), &[VideoId(4), VideoId(2)])
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].video_id(), VideoId(4));
        assert!(items[0].author.is_none());
        assert_eq!(items[1].author.as_ref().map(|a| a.id), Some(UserId(2)));
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_lookups() {
        let items = hydrator()
            .attach_authors(&RequestContext::background(), Vec::new())
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_distinct_preserves_first_occurrence() {
        assert_eq!(distinct([3, 1, 3, 2, 1].into_iter()), vec![3, 1, 2]);
    }
}
