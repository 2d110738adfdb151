//! In-process video store.
//!
//! Backs the CLI and tests. Records live in `parking_lot` locked maps and can
//! be seeded from a JSON document.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{StoreError, VideoStore};
use crate::video::{Author, FeedCursor, UserId, Video, VideoId};

/// Authors and videos used to pre-populate a [`MemoryVideoStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub videos: Vec<Video>,
}

impl SeedData {
    /// Parses seed data from a JSON string.
    ///
    /// # Errors
    ///
    /// - `serde_json::Error` - Document is not valid seed JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reads seed data from a JSON file.
    ///
    /// # Errors
    ///
    /// - `std::io::Error` - File could not be read or parsed
    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw).map_err(std::io::Error::from)
    }
}

/// Thread-safe in-memory implementation of [`VideoStore`].
#[derive(Debug, Default)]
pub struct MemoryVideoStore {
    videos: RwLock<BTreeMap<VideoId, Video>>,
    authors: RwLock<HashMap<UserId, Author>>,
}

impl MemoryVideoStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `seed`.
    pub fn with_seed(seed: SeedData) -> Self {
        let store = Self::new();
        for author in seed.authors {
            store.insert_author(author);
        }
        for video in seed.videos {
            store.videos.write().insert(video.id, video);
        }
        store
    }

    /// Inserts or replaces an author.
    pub fn insert_author(&self, author: Author) {
        self.authors.write().insert(author.id, author);
    }

    /// Number of stored videos.
    pub fn video_count(&self) -> usize {
        self.videos.read().len()
    }

    /// All authors, ordered by id.
    pub fn authors(&self) -> Vec<Author> {
        let mut authors: Vec<Author> = self.authors.read().values().cloned().collect();
        authors.sort_by_key(|author| author.id);
        authors
    }

    fn newest_first<'a>(
        videos: impl Iterator<Item = &'a Video>,
        offset: usize,
        limit: usize,
    ) -> Vec<Video> {
        let mut matched: Vec<&Video> = videos.collect();
        matched.sort_by_key(|video| std::cmp::Reverse(video.feed_position()));
        matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn find_video(&self, id: VideoId) -> Result<Option<Video>, StoreError> {
        Ok(self.videos.read().get(&id).cloned())
    }

    async fn find_videos(&self, ids: &[VideoId]) -> Result<Vec<Video>, StoreError> {
        let videos = self.videos.read();
        Ok(ids.iter().filter_map(|id| videos.get(id).cloned()).collect())
    }

    async fn find_authors(&self, ids: &[UserId]) -> Result<Vec<Author>, StoreError> {
        let authors = self.authors.read();
        Ok(ids
            .iter()
            .filter_map(|id| authors.get(id).cloned())
            .collect())
    }

    async fn chronological_feed(
        &self,
        _viewer: UserId,
        before: FeedCursor,
        limit: usize,
    ) -> Result<Vec<Video>, StoreError> {
        let videos = self.videos.read();
        Ok(Self::newest_first(
            videos.values().filter(|video| before.admits(video)),
            0,
            limit,
        ))
    }

    async fn search_videos(
        &self,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Video>, StoreError> {
        let needle = query.to_lowercase();
        let videos = self.videos.read();
        Ok(Self::newest_first(
            videos.values().filter(|video| {
                video.title.to_lowercase().contains(&needle)
                    || video.description.to_lowercase().contains(&needle)
            }),
            offset,
            limit,
        ))
    }

    async fn published_by(
        &self,
        owner: UserId,
        before: FeedCursor,
        limit: usize,
    ) -> Result<Vec<Video>, StoreError> {
        let videos = self.videos.read();
        Ok(Self::newest_first(
            videos
                .values()
                .filter(|video| video.owner_id == owner && before.admits(video)),
            0,
            limit,
        ))
    }

    async fn save_video(&self, video: &Video) -> Result<(), StoreError> {
        let mut videos = self.videos.write();
        if videos.contains_key(&video.id) {
            return Err(StoreError::DuplicateVideo { id: video.id });
        }
        videos.insert(video.id, video.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn video(id: i64, owner: i64, secs: i64, title: &str) -> Video {
        Video {
            id: VideoId(id),
            owner_id: UserId(owner),
            title: title.to_string(),
            description: String::new(),
            video_url: format!("https://cdn.example.com/{id}.mp4"),
            cover_url: String::new(),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    fn seeded() -> MemoryVideoStore {
        MemoryVideoStore::with_seed(SeedData {
            authors: vec![Author {
                id: UserId(1),
                name: "ada".to_string(),
                avatar_url: None,
                signature: None,
                follower_count: 3,
                following_count: 1,
                published_count: 2,
            }],
            videos: vec![
                video(10, 1, 100, "Morning run"),
                video(11, 2, 200, "Hotpot night"),
                video(12, 1, 300, "Evening RUN"),
            ],
        })
    }

    #[tokio::test]
    async fn test_chronological_feed_is_newest_first_below_watermark() {
        let store = seeded();
        let before = FeedCursor::before(Utc.timestamp_opt(300, 0).unwrap());

        let videos = store
            .chronological_feed(UserId::ANONYMOUS, before, 10)
            .await
            .unwrap();

        let ids: Vec<VideoId> = videos.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![VideoId(11), VideoId(10)]);
    }

    #[tokio::test]
    async fn test_pages_split_inside_shared_timestamp() {
        let store = MemoryVideoStore::with_seed(SeedData {
            authors: Vec::new(),
            videos: vec![
                video(1, 1, 100, "a"),
                video(2, 1, 200, "b"),
                video(3, 1, 200, "c"),
                video(4, 1, 200, "d"),
            ],
        });
        let start = FeedCursor::before(Utc.timestamp_opt(1_000, 0).unwrap());

        let first = store
            .chronological_feed(UserId::ANONYMOUS, start, 2)
            .await
            .unwrap();
        let cursor = first.last().unwrap().feed_position();
        let second = store
            .chronological_feed(UserId::ANONYMOUS, cursor, 2)
            .await
            .unwrap();

        let ids: Vec<VideoId> = first.iter().chain(&second).map(|v| v.id).collect();
        assert_eq!(ids, vec![VideoId(4), VideoId(3), VideoId(2), VideoId(1)]);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_paginated() {
        let store = seeded();

        let first = store.search_videos("run", 0, 1).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, VideoId(12));

        let second = store.search_videos("run", 1, 1).await.unwrap();
        assert_eq!(second[0].id, VideoId(10));
    }

    #[tokio::test]
    async fn test_save_rejects_duplicate_id() {
        let store = seeded();
        let result = store.save_video(&video(10, 1, 500, "again")).await;
        assert_eq!(result, Err(StoreError::DuplicateVideo { id: VideoId(10) }));
    }

    #[tokio::test]
    async fn test_lookups_skip_unknown_ids() {
        let store = seeded();

        let videos = store
            .find_videos(&[VideoId(99), VideoId(11)])
            .await
            .unwrap();
        assert_eq!(videos.len(), 1);

        let authors = store.find_authors(&[UserId(1), UserId(2)]).await.unwrap();
        assert_eq!(authors.len(), 1);
        assert!(store.find_video(VideoId(99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_published_by_filters_owner() {
        let store = seeded();
        let now = FeedCursor::before(Utc.timestamp_opt(1_000, 0).unwrap());

        let videos = store.published_by(UserId(1), now, 10).await.unwrap();
        let ids: Vec<VideoId> = videos.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![VideoId(12), VideoId(10)]);
    }

    #[test]
    fn test_seed_from_json() {
        let json = r#"{
            "authors": [{"id": 5, "name": "bo"}],
            "videos": [{
                "id": 1, "owner_id": 5, "title": "hi",
                "video_url": "https://cdn.example.com/1.mp4",
                "created_at": "2025-01-01T00:00:00Z"
            }]
        }"#;

        let seed = SeedData::from_json(json).unwrap();
        let store = MemoryVideoStore::with_seed(seed);

        assert_eq!(store.video_count(), 1);
        assert_eq!(store.authors()[0].name, "bo");
    }
}
