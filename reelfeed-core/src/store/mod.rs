//! Video and author record store contract.
//!
//! Defines the lookups the feed pipeline needs from persistent storage. All
//! list lookups are single round-trips so hydration cost scales with the
//! number of calls, not the number of items.

pub mod memory;

use async_trait::async_trait;

pub use memory::{MemoryVideoStore, SeedData};

use crate::video::{Author, FeedCursor, UserId, Video, VideoId};

/// Read and write access to video and user records.
#[async_trait]
pub trait VideoStore: Send + Sync + std::fmt::Debug {
    /// Loads a single video.
    ///
    /// Returns `Ok(None)` when no video has this id.
    ///
    /// # Errors
    ///
    /// - `StoreError::Backend` - Storage backend failed
    async fn find_video(&self, id: VideoId) -> Result<Option<Video>, StoreError>;

    /// Loads every video whose id is in `ids`, in any order.
    ///
    /// Unknown ids are silently absent from the result.
    ///
    /// # Errors
    ///
    /// - `StoreError::Backend` - Storage backend failed
    async fn find_videos(&self, ids: &[VideoId]) -> Result<Vec<Video>, StoreError>;

    /// Loads every user whose id is in `ids`, in any order.
    ///
    /// # Errors
    ///
    /// - `StoreError::Backend` - Storage backend failed
    async fn find_authors(&self, ids: &[UserId]) -> Result<Vec<Author>, StoreError>;

    /// Newest-first videos positioned strictly below `before`.
    ///
    /// # Errors
    ///
    /// - `StoreError::Backend` - Storage backend failed
    async fn chronological_feed(
        &self,
        viewer: UserId,
        before: FeedCursor,
        limit: usize,
    ) -> Result<Vec<Video>, StoreError>;

    /// Free-text search over titles and descriptions, newest first.
    ///
    /// # Errors
    ///
    /// - `StoreError::Backend` - Storage backend failed
    async fn search_videos(
        &self,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Video>, StoreError>;

    /// Newest-first videos owned by `owner` positioned strictly below `before`.
    ///
    /// # Errors
    ///
    /// - `StoreError::Backend` - Storage backend failed
    async fn published_by(
        &self,
        owner: UserId,
        before: FeedCursor,
        limit: usize,
    ) -> Result<Vec<Video>, StoreError>;

    /// Persists a newly published video.
    ///
    /// # Errors
    ///
    /// - `StoreError::DuplicateVideo` - A video with this id already exists
    /// - `StoreError::Backend` - Storage backend failed
    async fn save_video(&self, video: &Video) -> Result<(), StoreError>;
}

/// Errors that occur during store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Backend rejected or failed the operation
    #[error("Store backend error: {reason}")]
    Backend {
        /// Description of the backend failure
        reason: String,
    },

    /// Operation exceeded its deadline
    #[error("Store operation '{operation}' timed out")]
    Timeout {
        /// Name of the store operation that timed out
        operation: &'static str,
    },

    /// Video id was already taken
    #[error("Video {id} already exists")]
    DuplicateVideo {
        /// Id that collided
        id: VideoId,
    },
}
