//! Centralized configuration for Reelfeed.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::time::Duration;

/// Central configuration for all Reelfeed components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct ReelfeedConfig {
    pub feed: FeedConfig,
    pub propagation: PropagationConfig,
    pub recommender: RecommenderConfig,
    pub ids: IdConfig,
}

/// Feed composition limits and collaborator call budgets.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Batch size used when a request asks for zero items
    pub default_count: usize,
    /// Upper bound on a single batch
    pub max_count: usize,
    /// Top up a short personalized batch from the chronological feed
    pub chronological_top_up: bool,
    /// Per-call budget for recommender lookups
    pub recommender_timeout: Duration,
    /// Per-call budget for store lookups
    pub store_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_count: 10,
            max_count: 50,
            chronological_top_up: false,
            recommender_timeout: Duration::from_millis(800),
            store_timeout: Duration::from_secs(3),
        }
    }
}

impl FeedConfig {
    /// Maps a requested batch size onto the configured bounds.
    pub fn normalize_count(&self, requested: usize) -> usize {
        if requested == 0 {
            self.default_count.min(self.max_count)
        } else {
            requested.min(self.max_count)
        }
    }
}

/// Background propagation queue sizing.
#[derive(Debug, Clone)]
pub struct PropagationConfig {
    /// Jobs allowed to run concurrently
    pub max_workers: usize,
    /// Pending jobs before new submissions are dropped
    pub queue_capacity: usize,
    /// Upper bound on a single job, including every recommender call in it
    pub job_timeout: Duration,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get().clamp(1, 8),
            queue_capacity: 1024,
            job_timeout: Duration::from_secs(10),
        }
    }
}

/// External recommender connection settings.
#[derive(Debug, Clone)]
pub struct RecommenderConfig {
    /// Base URL of the recommender REST API, `None` disables it
    pub endpoint: Option<String>,
    /// API key sent with every request
    pub api_key: Option<String>,
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// Category every published video is registered under
    pub item_category: String,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            request_timeout: Duration::from_secs(5),
            item_category: "video".to_string(),
        }
    }
}

/// Configuration values that cannot produce a working service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Feed {field} must be at least 1")]
    ZeroFeedCount { field: &'static str },

    #[error("Default feed count {default_count} exceeds maximum {max_count}")]
    DefaultAboveMax {
        default_count: usize,
        max_count: usize,
    },

    #[error("Propagation {field} must be at least 1")]
    ZeroPropagationSetting { field: &'static str },
}

/// Id generation settings.
#[derive(Debug, Clone, Default)]
pub struct IdConfig {
    /// Snowflake node id, unique per running instance (0..=1023)
    pub node_id: u16,
}

impl ReelfeedConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(count) = env_parse::<usize>("REELFEED_FEED_DEFAULT_COUNT") {
            config.feed.default_count = count;
        }

        if let Some(count) = env_parse::<usize>("REELFEED_FEED_MAX_COUNT") {
            config.feed.max_count = count;
        }

        if let Some(enabled) = env_parse::<bool>("REELFEED_CHRONOLOGICAL_TOP_UP") {
            config.feed.chronological_top_up = enabled;
        }

        if let Some(ms) = env_parse::<u64>("REELFEED_RECOMMENDER_TIMEOUT_MS") {
            config.feed.recommender_timeout = Duration::from_millis(ms);
        }

        if let Some(ms) = env_parse::<u64>("REELFEED_STORE_TIMEOUT_MS") {
            config.feed.store_timeout = Duration::from_millis(ms);
        }

        if let Some(workers) = env_parse::<usize>("REELFEED_PROPAGATION_WORKERS") {
            config.propagation.max_workers = workers.max(1);
        }

        if let Some(capacity) = env_parse::<usize>("REELFEED_PROPAGATION_QUEUE") {
            config.propagation.queue_capacity = capacity.max(1);
        }

        if let Ok(endpoint) = std::env::var("REELFEED_GORSE_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                config.recommender.endpoint = Some(endpoint.trim().to_string());
            }
        }

        if let Ok(api_key) = std::env::var("REELFEED_GORSE_API_KEY") {
            if !api_key.is_empty() {
                config.recommender.api_key = Some(api_key);
            }
        }

        if let Some(node_id) = env_parse::<u16>("REELFEED_NODE_ID") {
            config.ids.node_id = node_id;
        }

        config
    }

    /// Checks that the settings can serve feeds and run propagation.
    ///
    /// # Errors
    ///
    /// - `ConfigError::ZeroFeedCount` - Default or maximum batch size is zero
    /// - `ConfigError::DefaultAboveMax` - Default batch size exceeds the maximum
    /// - `ConfigError::ZeroPropagationSetting` - No workers or no queue capacity
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.max_count == 0 {
            return Err(ConfigError::ZeroFeedCount { field: "max_count" });
        }

        if self.feed.default_count == 0 {
            return Err(ConfigError::ZeroFeedCount {
                field: "default_count",
            });
        }

        if self.feed.default_count > self.feed.max_count {
            return Err(ConfigError::DefaultAboveMax {
                default_count: self.feed.default_count,
                max_count: self.feed.max_count,
            });
        }

        if self.propagation.max_workers == 0 {
            return Err(ConfigError::ZeroPropagationSetting {
                field: "max_workers",
            });
        }

        if self.propagation.queue_capacity == 0 {
            return Err(ConfigError::ZeroPropagationSetting {
                field: "queue_capacity",
            });
        }

        Ok(())
    }

    /// Creates a configuration optimized for testing.
    ///
    /// Small budgets keep timeout paths fast; one worker keeps propagation
    /// observable in order.
    pub fn for_testing() -> Self {
        Self {
            feed: FeedConfig {
                recommender_timeout: Duration::from_millis(200),
                store_timeout: Duration::from_millis(500),
                ..FeedConfig::default()
            },
            propagation: PropagationConfig {
                max_workers: 1,
                queue_capacity: 64,
                job_timeout: Duration::from_millis(300),
            },
            ..Default::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = ReelfeedConfig::default();

        assert_eq!(config.feed.default_count, 10);
        assert_eq!(config.feed.max_count, 50);
        assert!(!config.feed.chronological_top_up);
        assert!(config.propagation.max_workers >= 1);
        assert!(config.propagation.max_workers <= 8);
        assert_eq!(config.recommender.item_category, "video");
        assert!(config.recommender.endpoint.is_none());
        assert_eq!(config.ids.node_id, 0);
    }

    #[test]
    fn test_count_normalization() {
        let feed = FeedConfig::default();

        assert_eq!(feed.normalize_count(0), 10);
        assert_eq!(feed.normalize_count(4), 4);
        assert_eq!(feed.normalize_count(500), 50);
    }

    #[test]
    fn test_presets_validate() {
        assert_eq!(ReelfeedConfig::default().validate(), Ok(()));
        assert_eq!(ReelfeedConfig::for_testing().validate(), Ok(()));
    }

    #[test]
    fn test_zero_max_count_is_rejected() {
        let mut config = ReelfeedConfig::default();
        config.feed.max_count = 0;

        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroFeedCount { field: "max_count" })
        );
    }

    #[test]
    fn test_default_count_above_max_is_rejected() {
        let mut config = ReelfeedConfig::default();
        config.feed.max_count = 5;

        assert_eq!(
            config.validate(),
            Err(ConfigError::DefaultAboveMax {
                default_count: 10,
                max_count: 5,
            })
        );
    }

    #[test]
    fn test_testing_preset() {
        let config = ReelfeedConfig::for_testing();
        assert_eq!(config.propagation.max_workers, 1);
        assert!(config.feed.recommender_timeout < Duration::from_secs(1));
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("REELFEED_FEED_MAX_COUNT", "20");
            std::env::set_var("REELFEED_CHRONOLOGICAL_TOP_UP", "true");
            std::env::set_var("REELFEED_RECOMMENDER_TIMEOUT_MS", "150");
            std::env::set_var("REELFEED_GORSE_ENDPOINT", " http://gorse:8087 ");
            std::env::set_var("REELFEED_NODE_ID", "12");
            std::env::set_var("REELFEED_PROPAGATION_WORKERS", "not-a-number");
        }

        let config = ReelfeedConfig::from_env();

        assert_eq!(config.feed.max_count, 20);
        assert!(config.feed.chronological_top_up);
        assert_eq!(config.feed.recommender_timeout, Duration::from_millis(150));
        assert_eq!(
            config.recommender.endpoint.as_deref(),
            Some("http://gorse:8087")
        );
        assert_eq!(config.ids.node_id, 12);
        assert_eq!(
            config.propagation.max_workers,
            PropagationConfig::default().max_workers
        );

        // Cleanup
        unsafe {
            std::env::remove_var("REELFEED_FEED_MAX_COUNT");
            std::env::remove_var("REELFEED_CHRONOLOGICAL_TOP_UP");
            std::env::remove_var("REELFEED_RECOMMENDER_TIMEOUT_MS");
            std::env::remove_var("REELFEED_GORSE_ENDPOINT");
            std::env::remove_var("REELFEED_NODE_ID");
            std::env::remove_var("REELFEED_PROPAGATION_WORKERS");
        }
    }
}
