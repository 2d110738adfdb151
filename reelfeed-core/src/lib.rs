//! Reelfeed Core - Feed composition and publishing for a short-video service
//!
//! This crate holds the video domain model, the recommender and store
//! collaborator traits, feed composition with fallback, the publish pipeline
//! and the background propagation queue that keeps the recommender in sync.

pub mod catalog;
pub mod config;
pub mod context;
pub mod feed;
pub mod hydration;
pub mod ids;
pub mod propagation;
pub mod publish;
pub mod recommend;
pub mod services;
pub mod store;
pub mod tagging;
pub mod tracing_setup;
pub mod video;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

// Re-export main types for convenient access
pub use catalog::VideoCatalog;
pub use config::{ConfigError, ReelfeedConfig};
pub use context::RequestContext;
pub use feed::{FeedComposer, FeedRequest};
pub use propagation::{PropagationError, PropagationHandle, PropagationJob, PropagationStats};
pub use publish::{PublishPipeline, PublishRequest};
pub use recommend::{DisabledRecommender, RecommendError, RecommendationSource};
pub use services::FeedServices;
pub use store::{MemoryVideoStore, SeedData, StoreError, VideoStore};
pub use tagging::TagExtractor;
pub use video::{
    Author, FeedBatch, FeedCursor, FeedItem, FeedSource, FeedbackEvent, FeedbackKind, UserId,
    Video, VideoId,
};

/// Errors returned to callers of the feed services.
///
/// Recommender and propagation failures are absorbed inside the services and
/// never appear here.
#[derive(Debug, thiserror::Error)]
pub enum ReelfeedError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Video {video_id} not found")]
    VideoNotFound { video_id: VideoId },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReelfeedError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            ReelfeedError::Store(e) => match e {
                StoreError::Timeout { .. } => "Video service timed out, try again".to_string(),
                StoreError::DuplicateVideo { id } => format!("Video {id} already exists"),
                StoreError::Backend { .. } => "Video service unavailable".to_string(),
            },
            ReelfeedError::VideoNotFound { video_id } => format!("Video {video_id} not found"),
            ReelfeedError::Configuration { reason } => format!("Invalid configuration: {reason}"),
            ReelfeedError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to the requested video not existing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReelfeedError::VideoNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, ReelfeedError>;
