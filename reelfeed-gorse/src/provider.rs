//! Gorse recommendation source for production use.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use reelfeed_core::config::RecommenderConfig;
use reelfeed_core::{FeedbackEvent, RecommendError, RecommendationSource, UserId, Video, VideoId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::errors::GorseError;
use crate::wire::{Affected, Feedback, Item, Score, User};

const API_KEY_HEADER: &str = "X-API-Key";

/// Recommendation source backed by a Gorse server.
///
/// Video and user ids travel as decimal strings. Personalized retrieval maps
/// to `/api/recommend/{user}`; popularity uses session recommendation with
/// an empty session, which Gorse answers from its popular items.
#[derive(Debug, Clone)]
pub struct GorseProvider {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl GorseProvider {
    /// Create a provider for `endpoint`.
    ///
    /// # Errors
    ///
    /// - `GorseError::InvalidEndpoint` - Endpoint is not an absolute http(s) URL
    /// - `GorseError::Client` - HTTP client could not be built
    pub fn with_config(
        endpoint: &str,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> crate::Result<Self> {
        let base_url = Self::parse_endpoint(endpoint)?;
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| GorseError::Client {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Create a provider from recommender settings, `None` when no endpoint
    /// is configured.
    ///
    /// # Errors
    ///
    /// Same conditions as [`GorseProvider::with_config`].
    pub fn from_config(config: &RecommenderConfig) -> crate::Result<Option<Self>> {
        config
            .endpoint
            .as_deref()
            .map(|endpoint| {
                Self::with_config(endpoint, config.api_key.clone(), config.request_timeout)
            })
            .transpose()
    }

    /// Base URL every API path is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Parse and normalize the endpoint so relative joins keep its path.
    fn parse_endpoint(endpoint: &str) -> crate::Result<Url> {
        let invalid = |reason: String| GorseError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason,
        };

        let mut url = Url::parse(endpoint.trim()).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(url)
    }

    fn url(&self, path: &str) -> Result<Url, RecommendError> {
        self.base_url
            .join(path)
            .map_err(|e| RecommendError::Unavailable {
                reason: format!("Cannot build Gorse URL for '{path}': {e}"),
            })
    }

    /// Parse Gorse item ids, dropping any that are not video ids.
    fn parse_item_ids(raw: impl IntoIterator<Item = String>) -> Vec<VideoId> {
        raw.into_iter()
            .filter_map(|id| match id.parse::<VideoId>() {
                Ok(video_id) => Some(video_id),
                Err(_) => {
                    tracing::warn!("Skipping non-numeric Gorse item id '{}'", id);
                    None
                }
            })
            .collect()
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        limit: usize,
        operation: &'static str,
    ) -> Result<T, RecommendError> {
        let request = self.client.get(url).query(&[("n", limit)]);
        self.send(request, operation).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
        operation: &'static str,
    ) -> Result<T, RecommendError> {
        let request = self.client.post(url).json(body);
        self.send(request, operation).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        mut request: reqwest::RequestBuilder,
        operation: &'static str,
    ) -> Result<T, RecommendError> {
        if let Some(ref api_key) = self.api_key {
            request = request.header(API_KEY_HEADER, api_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RecommendError::Timeout { operation }
            } else {
                RecommendError::Network {
                    reason: format!("Gorse {operation} request failed: {e}"),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RecommendError::Unavailable {
                reason: format!("Gorse {operation} returned HTTP {status}"),
            });
        }

        response
            .json()
            .await
            .map_err(|e| RecommendError::InvalidResponse {
                reason: format!("Gorse {operation} JSON parsing failed: {e}"),
            })
    }
}

#[async_trait]
impl RecommendationSource for GorseProvider {
    async fn personalized(
        &self,
        viewer: UserId,
        limit: usize,
    ) -> Result<Vec<VideoId>, RecommendError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let url = self.url(&format!("api/recommend/{viewer}"))?;
        let raw: Vec<String> = self.get_json(url, limit, "recommend").await?;
        let ids = Self::parse_item_ids(raw);

        tracing::debug!("Gorse returned {} recommendations for user {}", ids.len(), viewer);
        Ok(ids)
    }

    async fn popular(&self, limit: usize) -> Result<Vec<VideoId>, RecommendError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut url = self.url("api/session/recommend")?;
        url.query_pairs_mut().append_pair("n", &limit.to_string());

        let empty_session: [Feedback; 0] = [];
        let scores: Vec<Score> = self
            .post_json(url, &empty_session, "session recommend")
            .await?;
        let ids = Self::parse_item_ids(scores.into_iter().map(|score| score.id));

        tracing::debug!("Gorse returned {} popular items", ids.len());
        Ok(ids)
    }

    async fn submit_feedback(&self, event: &FeedbackEvent) -> Result<(), RecommendError> {
        let body = [Feedback {
            feedback_type: event.kind.as_str().to_string(),
            user_id: event.user_id.to_string(),
            item_id: event.video_id.to_string(),
            timestamp: event.occurred_at.to_rfc3339(),
        }];

        let affected: Affected = self
            .post_json(self.url("api/feedback")?, &body, "insert feedback")
            .await?;

        tracing::debug!(
            "Inserted {} feedback: user={}, item={}, rows={}",
            event.kind,
            event.user_id,
            event.video_id,
            affected.row_affected
        );
        Ok(())
    }

    async fn register_item(
        &self,
        video: &Video,
        categories: &[String],
        tags: &BTreeSet<String>,
    ) -> Result<(), RecommendError> {
        let body = Item {
            item_id: video.id.to_string(),
            is_hidden: false,
            labels: tags.iter().cloned().collect(),
            categories: categories.to_vec(),
            timestamp: video.created_at.to_rfc3339(),
            comment: video.title.clone(),
        };

        let _: Affected = self
            .post_json(self.url("api/item")?, &body, "insert item")
            .await?;

        tracing::debug!(
            "Inserted item {} with categories {:?} and labels {:?}",
            video.id,
            categories,
            tags
        );
        Ok(())
    }

    async fn register_user(&self, user: UserId, labels: &[String]) -> Result<(), RecommendError> {
        let body = User {
            user_id: user.to_string(),
            labels: labels.to_vec(),
            subscribe: Vec::new(),
            comment: String::new(),
        };

        let _: Affected = self
            .post_json(self.url("api/user")?, &body, "insert user")
            .await?;

        tracing::debug!("Inserted user {} with labels {:?}", user, labels);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use reelfeed_core::FeedbackKind;

    use super::*;

    #[test]
    fn test_parse_endpoint_normalizes_trailing_slash() {
        let url = GorseProvider::parse_endpoint("http://gorse:8087/gateway").unwrap();
        assert_eq!(url.as_str(), "http://gorse:8087/gateway/");
        assert_eq!(
            url.join("api/feedback").unwrap().as_str(),
            "http://gorse:8087/gateway/api/feedback"
        );
    }

    #[test]
    fn test_parse_endpoint_rejects_bad_urls() {
        assert!(matches!(
            GorseProvider::parse_endpoint("gorse:8087"),
            Err(GorseError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            GorseProvider::parse_endpoint("ftp://gorse/"),
            Err(GorseError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_parse_item_ids_skips_foreign_ids() {
        let ids = GorseProvider::parse_item_ids(vec![
            "42".to_string(),
            "movie-7".to_string(),
            " 9 ".to_string(),
        ]);
        assert_eq!(ids, vec![VideoId(42), VideoId(9)]);
    }

    #[test]
    fn test_from_config_without_endpoint() {
        let provider = GorseProvider::from_config(&RecommenderConfig::default()).unwrap();
        assert!(provider.is_none());
    }

    #[test]
    fn test_feedback_wire_field_names() {
        let occurred_at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let event = FeedbackEvent {
            user_id: UserId(3),
            video_id: VideoId(88),
            kind: FeedbackKind::Read,
            occurred_at,
        };
        let body = Feedback {
            feedback_type: event.kind.as_str().to_string(),
            user_id: event.user_id.to_string(),
            item_id: event.video_id.to_string(),
            timestamp: event.occurred_at.to_rfc3339(),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["FeedbackType"], "read");
        assert_eq!(json["UserId"], "3");
        assert_eq!(json["ItemId"], "88");
        assert_eq!(json["Timestamp"], "2024-06-01T12:00:00+00:00");
    }
}
