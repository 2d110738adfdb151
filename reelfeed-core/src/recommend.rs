//! Recommendation source contract.
//!
//! The recommender ranks videos per viewer and collects feedback events.
//! Its model is opaque to this crate; every failure it reports is treated as
//! a degraded source and recovered by the caller.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::video::{FeedbackEvent, UserId, Video, VideoId};

/// Personalized retrieval, popularity fallback and feedback ingestion.
///
/// Implementations handle the transport to the external recommender
/// (HTTP adapters, scripted test doubles).
#[async_trait]
pub trait RecommendationSource: Send + Sync + std::fmt::Debug {
    /// Returns up to `limit` video ids ranked for `viewer`, best first.
    ///
    /// # Errors
    /// - `RecommendError::Unavailable` - Recommender rejected the request
    /// - `RecommendError::Network` - Transport failure
    /// - `RecommendError::InvalidResponse` - Response could not be decoded
    async fn personalized(
        &self,
        viewer: UserId,
        limit: usize,
    ) -> Result<Vec<VideoId>, RecommendError>;

    /// Returns up to `limit` popular video ids, independent of any viewer.
    ///
    /// # Errors
    /// Same conditions as [`RecommendationSource::personalized`].
    async fn popular(&self, limit: usize) -> Result<Vec<VideoId>, RecommendError>;

    /// Records a single feedback event.
    ///
    /// # Errors
    /// Same conditions as [`RecommendationSource::personalized`].
    async fn submit_feedback(&self, event: &FeedbackEvent) -> Result<(), RecommendError>;

    /// Registers a video as a recommendable item.
    ///
    /// # Errors
    /// Same conditions as [`RecommendationSource::personalized`].
    async fn register_item(
        &self,
        video: &Video,
        categories: &[String],
        tags: &BTreeSet<String>,
    ) -> Result<(), RecommendError>;

    /// Registers a user with optional preference labels.
    ///
    /// # Errors
    /// Same conditions as [`RecommendationSource::personalized`].
    async fn register_user(&self, user: UserId, labels: &[String]) -> Result<(), RecommendError>;
}

/// Failures reported by a recommendation source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecommendError {
    /// Recommender is not configured or answered with a failure status
    #[error("Recommender unavailable: {reason}")]
    Unavailable { reason: String },

    /// Request never reached the recommender or the connection dropped
    #[error("Recommender network error: {reason}")]
    Network { reason: String },

    /// Response body did not match the expected shape
    #[error("Invalid recommender response: {reason}")]
    InvalidResponse { reason: String },

    /// Call exceeded its deadline
    #[error("Recommender call '{operation}' timed out")]
    Timeout { operation: &'static str },
}

/// Recommendation source used when no recommender is configured.
///
/// Every retrieval reports `Unavailable`, so feeds take the chronological
/// path; propagation calls fail the same way and are logged by the worker.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledRecommender;

impl DisabledRecommender {
    fn unavailable<T>() -> Result<T, RecommendError> {
        Err(RecommendError::Unavailable {
            reason: "no recommender configured".to_string(),
        })
    }
}

#[async_trait]
impl RecommendationSource for DisabledRecommender {
    async fn personalized(
        &self,
        _viewer: UserId,
        _limit: usize,
    ) -> Result<Vec<VideoId>, RecommendError> {
        Self::unavailable()
    }

    async fn popular(&self, _limit: usize) -> Result<Vec<VideoId>, RecommendError> {
        Self::unavailable()
    }

    async fn submit_feedback(&self, _event: &FeedbackEvent) -> Result<(), RecommendError> {
        Self::unavailable()
    }

    async fn register_item(
        &self,
        _video: &Video,
        _categories: &[String],
        _tags: &BTreeSet<String>,
    ) -> Result<(), RecommendError> {
        Self::unavailable()
    }

    async fn register_user(
        &self,
        _user: UserId,
        _labels: &[String],
    ) -> Result<(), RecommendError> {
        Self::unavailable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_recommender_is_unavailable() {
        let recommender = DisabledRecommender;

        let personalized = recommender.personalized(UserId(1), 10).await;
        assert!(matches!(
            personalized,
            Err(RecommendError::Unavailable { .. })
        ));

        let popular = recommender.popular(5).await;
        assert!(matches!(popular, Err(RecommendError::Unavailable { .. })));
    }

    #[test]
    fn test_timeout_message_names_operation() {
        let error = RecommendError::Timeout {
            operation: "personalized",
        };
        assert_eq!(
            error.to_string(),
            "Recommender call 'personalized' timed out"
        );
    }
}
