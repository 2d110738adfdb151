//! Composition root for the feed services.
//!
//! This is the one place where collaborators are injected into the
//! services. Callers choose concrete recommender, store and id generator
//! implementations (production adapters, in-memory stores, test doubles) and
//! every service built here shares them.

use std::sync::Arc;

use crate::catalog::VideoCatalog;
use crate::config::ReelfeedConfig;
use crate::feed::FeedComposer;
use crate::ids::{IdGenerator, SnowflakeGenerator};
use crate::propagation::{
    JobId, PropagationError, PropagationHandle, PropagationJob, spawn_propagation_queue,
};
use crate::publish::PublishPipeline;
use crate::recommend::RecommendationSource;
use crate::store::VideoStore;
use crate::video::UserId;
use crate::{ReelfeedError, Result};

/// Pre-wired services sharing one propagation queue.
#[derive(Debug, Clone)]
pub struct FeedServices {
    pub composer: FeedComposer,
    pub publisher: PublishPipeline,
    pub catalog: VideoCatalog,
    pub propagation: PropagationHandle,
}

impl FeedServices {
    /// Builds every service from explicit collaborators.
    ///
    /// Spawns the propagation dispatcher, so it must run inside a Tokio
    /// runtime.
    pub fn assemble(
        config: &ReelfeedConfig,
        recommender: Arc<dyn RecommendationSource>,
        store: Arc<dyn VideoStore>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        let propagation = spawn_propagation_queue(config, Arc::clone(&recommender));

        let composer = FeedComposer::new(
            config.feed.clone(),
            recommender,
            Arc::clone(&store),
            propagation.clone(),
        );
        let publisher = PublishPipeline::new(
            Arc::clone(&store),
            ids,
            propagation.clone(),
            config.feed.store_timeout,
        );
        let catalog = VideoCatalog::new(store, config.feed.store_timeout);

        Self {
            composer,
            publisher,
            catalog,
            propagation,
        }
    }

    /// Builds services with a snowflake generator for the configured node.
    ///
    /// # Errors
    ///
    /// - `ReelfeedError::Configuration` - Invalid settings or node id out of range
    pub fn with_snowflake_ids(
        config: &ReelfeedConfig,
        recommender: Arc<dyn RecommendationSource>,
        store: Arc<dyn VideoStore>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ReelfeedError::Configuration {
                reason: e.to_string(),
            })?;

        let ids = SnowflakeGenerator::new(config.ids.node_id).map_err(|e| {
            ReelfeedError::Configuration {
                reason: e.to_string(),
            }
        })?;

        Ok(Self::assemble(config, recommender, store, Arc::new(ids)))
    }

    /// Queues registration of a newly signed-up user with the recommender.
    ///
    /// Sign-up never waits on the recommender; the job runs in the background.
    ///
    /// # Errors
    ///
    /// - `PropagationError::QueueFull` - Queue at capacity, registration dropped
    /// - `PropagationError::ShutDown` - Queue no longer accepts work
    pub fn register_user(
        &self,
        user_id: UserId,
        labels: Vec<String>,
    ) -> std::result::Result<JobId, PropagationError> {
        self.propagation
            .submit(PropagationJob::RegisterUser { user_id, labels })
    }

    /// Waits for queued propagation work, then stops the queue.
    pub async fn shutdown(&self) {
        if let Err(e) = self.propagation.shutdown().await {
            tracing::debug!("Propagation queue already stopped: {}", e);
        }
    }
}
