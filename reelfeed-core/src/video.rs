//! Video, author and feed types shared across the feed pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Globally unique video identifier allocated by an [`IdGenerator`](crate::ids::IdGenerator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(pub i64);

impl VideoId {
    /// Creates a video id from its raw value.
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw 64-bit value.
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for VideoId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self)
    }
}

/// User identifier. Zero is reserved for anonymous viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    /// Viewer without an authenticated session.
    pub const ANONYMOUS: UserId = UserId(0);

    /// Creates a user id from its raw value.
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw 64-bit value.
    pub fn as_i64(self) -> i64 {
        self.0
    }

    /// Checks whether this id is the anonymous sentinel.
    pub fn is_anonymous(self) -> bool {
        self == Self::ANONYMOUS
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Published video record.
///
/// Immutable once published; the feed pipeline only ever reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: VideoId,
    pub owner_id: UserId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub video_url: String,
    #[serde(default)]
    pub cover_url: String,
    pub created_at: DateTime<Utc>,
}

impl Video {
    /// Position of this video in newest-first feed order.
    pub fn feed_position(&self) -> FeedCursor {
        FeedCursor {
            created_at: self.created_at,
            video_id: self.id,
        }
    }
}

/// Position in newest-first feed order.
///
/// Ordered by publish time, then by id, so videos sharing a timestamp still
/// have a total order. A page continues with videos strictly below the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeedCursor {
    pub created_at: DateTime<Utc>,
    pub video_id: VideoId,
}

impl FeedCursor {
    /// Cursor that admits every video published strictly before `time`.
    pub fn before(time: DateTime<Utc>) -> Self {
        Self {
            created_at: time,
            video_id: VideoId(i64::MIN),
        }
    }

    /// Checks whether `video` comes after this cursor in newest-first order.
    pub fn admits(&self, video: &Video) -> bool {
        video.feed_position() < *self
    }
}

/// Denormalized view of a user for rendering next to a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub published_count: u64,
}

/// A video joined with its author.
///
/// `author` is `None` when the owner could not be resolved; the video is
/// still shown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedItem {
    pub video: Video,
    pub author: Option<Author>,
}

impl FeedItem {
    /// Video id of this item.
    pub fn video_id(&self) -> VideoId {
        self.video.id
    }
}

/// Which source ultimately produced a feed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedSource {
    /// Recommender ids, possibly backfilled with popular ids.
    Personalized,
    /// Newest-first store feed below the cursor watermark.
    Chronological,
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedSource::Personalized => write!(f, "personalized"),
            FeedSource::Chronological => write!(f, "chronological"),
        }
    }
}

/// Ordered page of feed items plus the watermark for the next page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedBatch {
    pub items: Vec<FeedItem>,
    /// Oldest feed position in this batch, `None` when the batch is empty.
    pub next_cursor: Option<FeedCursor>,
    pub source: FeedSource,
}

impl FeedBatch {
    /// Builds a batch and derives its continuation cursor.
    pub fn new(items: Vec<FeedItem>, source: FeedSource) -> Self {
        let next_cursor = items.iter().map(|item| item.video.feed_position()).min();
        Self {
            items,
            next_cursor,
            source,
        }
    }

    /// Video ids in batch order.
    pub fn video_ids(&self) -> Vec<VideoId> {
        self.items.iter().map(FeedItem::video_id).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Kind of viewer/video interaction reported to the recommender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Read,
    Publish,
    Like,
    Favorite,
    Share,
}

impl FeedbackKind {
    /// Feedback type name understood by the recommender.
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackKind::Read => "read",
            FeedbackKind::Publish => "publish",
            FeedbackKind::Like => "like",
            FeedbackKind::Favorite => "favorite",
            FeedbackKind::Share => "share",
        }
    }
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only interaction signal. Duplicates are tolerated downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub user_id: UserId,
    pub video_id: VideoId,
    pub kind: FeedbackKind,
    pub occurred_at: DateTime<Utc>,
}

impl FeedbackEvent {
    /// Creates an event stamped with the current time.
    pub fn now(user_id: UserId, video_id: VideoId, kind: FeedbackKind) -> Self {
        Self {
            user_id,
            video_id,
            kind,
            occurred_at: Utc::now(),
        }
    }
}
