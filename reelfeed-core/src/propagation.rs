//! Background propagation of tags and feedback to the recommender.
//!
//! Feed and publish calls hand work to this queue and return immediately.
//! A dispatcher task pulls jobs off a bounded channel and runs each one on its
//! own task, with concurrency capped by a semaphore and every job bounded by
//! a timeout. Jobs are at-most-once: a full queue drops the job, failures are
//! logged, nothing is retried and nothing is reported back to the caller.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Semaphore, mpsc, oneshot};
use uuid::Uuid;

use crate::config::ReelfeedConfig;
use crate::recommend::RecommendationSource;
use crate::tagging::TagExtractor;
use crate::video::{FeedbackEvent, FeedbackKind, UserId, Video};

/// Errors returned to code submitting propagation work.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PropagationError {
    #[error("Propagation queue is full, job {job_id} dropped")]
    QueueFull { job_id: JobId },

    #[error("Propagation queue is shut down")]
    ShutDown,
}

/// Unique identifier for propagation jobs, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl JobId {
    /// Create new job ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unit of fire-and-forget work for the recommender.
#[derive(Debug, Clone, PartialEq)]
pub enum PropagationJob {
    /// Submit each event independently
    RecordFeedback { events: Vec<FeedbackEvent> },
    /// Tag a freshly published video, register it, record the publish event
    PublishVideo { video: Video },
    /// Register a user with preference labels
    RegisterUser { user_id: UserId, labels: Vec<String> },
}

impl PropagationJob {
    /// Short job name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PropagationJob::RecordFeedback { .. } => "record_feedback",
            PropagationJob::PublishVideo { .. } => "publish_video",
            PropagationJob::RegisterUser { .. } => "register_user",
        }
    }
}

/// Snapshot of queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationStats {
    /// Jobs accepted into the queue
    pub submitted: u64,
    /// Jobs whose every recommender call succeeded
    pub completed: u64,
    /// Jobs with at least one failed recommender call
    pub failed: u64,
    /// Jobs cut off by the job timeout
    pub timed_out: u64,
    /// Jobs rejected because the queue was full
    pub dropped: u64,
}

impl PropagationStats {
    /// Jobs that finished one way or another.
    pub fn finished(&self) -> u64 {
        self.completed + self.failed + self.timed_out
    }
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PropagationStats {
        PropagationStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Command messages for the dispatcher
#[derive(Debug)]
enum PropagationCommand {
    Run {
        job_id: JobId,
        job: PropagationJob,
    },
    Drain {
        responder: oneshot::Sender<()>,
    },
    Shutdown {
        responder: oneshot::Sender<()>,
    },
}

/// Cloneable handle for submitting propagation work.
#[derive(Debug, Clone)]
pub struct PropagationHandle {
    sender: mpsc::Sender<PropagationCommand>,
    counters: Arc<Counters>,
}

impl PropagationHandle {
    /// Queues a job without waiting.
    ///
    /// # Errors
    /// - `PropagationError::QueueFull` - Queue at capacity, job dropped
    /// - `PropagationError::ShutDown` - Dispatcher no longer running
    pub fn submit(&self, job: PropagationJob) -> Result<JobId, PropagationError> {
        let job_id = JobId::new();
        let kind = job.kind();

        match self.sender.try_send(PropagationCommand::Run { job_id, job }) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("Queued {} job {}", kind, job_id);
                Ok(job_id)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                Err(PropagationError::QueueFull { job_id })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(PropagationError::ShutDown),
        }
    }

    /// Waits until every job submitted before this call has finished.
    ///
    /// # Errors
    /// - `PropagationError::ShutDown` - Dispatcher no longer running
    pub async fn drain(&self) -> Result<(), PropagationError> {
        let (responder, rx) = oneshot::channel();
        self.sender
            .send(PropagationCommand::Drain { responder })
            .await
            .map_err(|_| PropagationError::ShutDown)?;

        rx.await.map_err(|_| PropagationError::ShutDown)
    }

    /// Drains outstanding jobs, then stops the dispatcher.
    ///
    /// # Errors
    /// - `PropagationError::ShutDown` - Dispatcher already stopped
    pub async fn shutdown(&self) -> Result<(), PropagationError> {
        let (responder, rx) = oneshot::channel();
        self.sender
            .send(PropagationCommand::Shutdown { responder })
            .await
            .map_err(|_| PropagationError::ShutDown)?;

        rx.await.map_err(|_| PropagationError::ShutDown)
    }

    /// Current queue counters.
    pub fn stats(&self) -> PropagationStats {
        self.counters.snapshot()
    }
}

/// Spawns the dispatcher and returns a handle to it.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_propagation_queue(
    config: &ReelfeedConfig,
    recommender: Arc<dyn RecommendationSource>,
) -> PropagationHandle {
    let (sender, receiver) = mpsc::channel(config.propagation.queue_capacity.max(1));
    let counters = Arc::new(Counters::default());

    let worker = JobWorker {
        recommender,
        extractor: TagExtractor::new(),
        item_category: Arc::from(config.recommender.item_category.as_str()),
        job_timeout: config.propagation.job_timeout,
        counters: Arc::clone(&counters),
    };
    let dispatcher = Dispatcher {
        receiver,
        permits: Arc::new(Semaphore::new(config.propagation.max_workers.max(1))),
        max_workers: config.propagation.max_workers.max(1),
        worker,
    };

    tokio::spawn(dispatcher.run());

    PropagationHandle { sender, counters }
}

struct Dispatcher {
    receiver: mpsc::Receiver<PropagationCommand>,
    permits: Arc<Semaphore>,
    max_workers: usize,
    worker: JobWorker,
}

impl Dispatcher {
    async fn run(mut self) {
        while let Some(command) = self.receiver.recv().await {
            match command {
                PropagationCommand::Run { job_id, job } => {
                    let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                        break;
                    };
                    let worker = self.worker.clone();
                    tokio::spawn(async move {
                        worker.execute(job_id, job).await;
                        drop(permit);
                    });
                }
                PropagationCommand::Drain { responder } => {
                    self.wait_idle().await;
                    let _ = responder.send(());
                }
                PropagationCommand::Shutdown { responder } => {
                    self.wait_idle().await;
                    let _ = responder.send(());
                    break;
                }
            }
        }

        tracing::debug!("Propagation dispatcher stopped");
    }

    /// Holding every permit means no job is running.
    async fn wait_idle(&self) {
        let all = u32::try_from(self.max_workers).unwrap_or(u32::MAX);
        if let Ok(permits) = self.permits.acquire_many(all).await {
            drop(permits);
        }
    }
}

#[derive(Debug, Clone)]
struct JobWorker {
    recommender: Arc<dyn RecommendationSource>,
    extractor: TagExtractor,
    item_category: Arc<str>,
    job_timeout: std::time::Duration,
    counters: Arc<Counters>,
}

impl JobWorker {
    async fn execute(&self, job_id: JobId, job: PropagationJob) {
        let kind = job.kind();

        match tokio::time::timeout(self.job_timeout, self.perform(job_id, job)).await {
            Ok(true) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Propagation job {} ({}) completed", job_id, kind);
            }
            Ok(false) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Propagation job {} ({}) finished with failures", job_id, kind);
            }
            Err(_) => {
                self.counters.timed_out.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    "Propagation job {} ({}) timed out after {:?}",
                    job_id,
                    kind,
                    self.job_timeout
                );
            }
        }
    }

    /// Returns whether every recommender call succeeded.
    async fn perform(&self, job_id: JobId, job: PropagationJob) -> bool {
        match job {
            PropagationJob::RecordFeedback { events } => self.record_feedback(job_id, &events).await,
            PropagationJob::PublishVideo { video } => self.publish_video(job_id, &video).await,
            PropagationJob::RegisterUser { user_id, labels } => {
                match self.recommender.register_user(user_id, &labels).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!("Job {}: failed to register user {}: {}", job_id, user_id, e);
                        false
                    }
                }
            }
        }
    }

    async fn record_feedback(&self, job_id: JobId, events: &[FeedbackEvent]) -> bool {
        let mut all_ok = true;
        for event in events {
            if let Err(e) = self.recommender.submit_feedback(event).await {
                tracing::warn!(
                    "Job {}: failed to record {} feedback for user {} on video {}: {}",
                    job_id,
                    event.kind,
                    event.user_id,
                    event.video_id,
                    e
                );
                all_ok = false;
            }
        }
        all_ok
    }

    async fn publish_video(&self, job_id: JobId, video: &Video) -> bool {
        let tags = self.extractor.extract_tags(&video.title, &video.description);
        tracing::info!("Extracted tags for video {}: {:?}", video.id, tags);

        let categories = vec![self.item_category.to_string()];
        let mut all_ok = true;

        if let Err(e) = self
            .recommender
            .register_item(video, &categories, &tags)
            .await
        {
            tracing::warn!("Job {}: failed to register video {}: {}", job_id, video.id, e);
            all_ok = false;
        }

        let event = FeedbackEvent::now(video.owner_id, video.id, FeedbackKind::Publish);
        if let Err(e) = self.recommender.submit_feedback(&event).await {
            tracing::warn!(
                "Job {}: failed to record publish feedback for video {}: {}",
                job_id,
                video.id,
                e
            );
            all_ok = false;
        }

        all_ok
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;

    use super::*;
    use crate::recommend::RecommendError;
    use crate::video::VideoId;

    #[derive(Debug, Default)]
    struct RecordingRecommender {
        feedback: Mutex<Vec<FeedbackEvent>>,
        items: Mutex<Vec<(VideoId, Vec<String>, BTreeSet<String>)>>,
        fail_items: bool,
        hang_feedback: bool,
    }

    #[async_trait]
    impl RecommendationSource for RecordingRecommender {
        async fn personalized(
            &self,
            _viewer: UserId,
            _limit: usize,
        ) -> Result<Vec<VideoId>, RecommendError> {
            Ok(Vec::new())
        }

        async fn popular(&self, _limit: usize) -> Result<Vec<VideoId>, RecommendError> {
            Ok(Vec::new())
        }

        async fn submit_feedback(&self, event: &FeedbackEvent) -> Result<(), RecommendError> {
            if self.hang_feedback {
                std::future::pending::<()>().await;
            }
            self.feedback.lock().push(event.clone());
            Ok(())
        }

        async fn register_item(
            &self,
            video: &Video,
            categories: &[String],
            tags: &BTreeSet<String>,
        ) -> Result<(), RecommendError> {
            if self.fail_items {
                return Err(RecommendError::Unavailable {
                    reason: "item endpoint down".to_string(),
                });
            }
            self.items
                .lock()
                .push((video.id, categories.to_vec(), tags.clone()));
            Ok(())
        }

        async fn register_user(
            &self,
            _user: UserId,
            _labels: &[String],
        ) -> Result<(), RecommendError> {
            Ok(())
        }
    }

    fn published_video() -> Video {
        Video {
            id: VideoId(77),
            owner_id: UserId(5),
            title: "周末火锅".to_string(),
            description: "#friends".to_string(),
            video_url: "https://cdn.example.com/77.mp4".to_string(),
            cover_url: String::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_publish_job_registers_item_and_feedback() {
        let recommender = Arc::new(RecordingRecommender::default());
        let handle = spawn_propagation_queue(&ReelfeedConfig::for_testing(), recommender.clone());

        handle
            .submit(PropagationJob::PublishVideo {
                video: published_video(),
            })
            .unwrap();
        handle.drain().await.unwrap();

        let items = recommender.items.lock().clone();
        assert_eq!(items.len(), 1);
        let (video_id, categories, tags) = &items[0];
        assert_eq!(*video_id, VideoId(77));
        assert_eq!(categories, &vec!["video".to_string()]);
        assert!(tags.contains("hotpot"));
        assert!(tags.contains("friends"));

        let feedback = recommender.feedback.lock().clone();
        assert_eq!(feedback.len(), 1);
        assert_eq!(feedback[0].kind, FeedbackKind::Publish);
        assert_eq!(feedback[0].user_id, UserId(5));

        assert_eq!(handle.stats().completed, 1);
    }

    #[tokio::test]
    async fn test_item_failure_still_records_publish_feedback() {
        let recommender = Arc::new(RecordingRecommender {
            fail_items: true,
            ..Default::default()
        });
        let handle = spawn_propagation_queue(&ReelfeedConfig::for_testing(), recommender.clone());

        handle
            .submit(PropagationJob::PublishVideo {
                video: published_video(),
            })
            .unwrap();
        handle.drain().await.unwrap();

        assert_eq!(recommender.feedback.lock().len(), 1);
        let stats = handle.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 0);
    }

    #[tokio::test]
    async fn test_hanging_job_times_out() {
        let recommender = Arc::new(RecordingRecommender {
            hang_feedback: true,
            ..Default::default()
        });
        let mut config = ReelfeedConfig::for_testing();
        config.propagation.job_timeout = Duration::from_millis(30);
        let handle = spawn_propagation_queue(&config, recommender);

        let event = FeedbackEvent::now(UserId(1), VideoId(2), FeedbackKind::Read);
        handle
            .submit(PropagationJob::RecordFeedback {
                events: vec![event],
            })
            .unwrap();
        handle.drain().await.unwrap();

        assert_eq!(handle.stats().timed_out, 1);
    }

    #[tokio::test]
    async fn test_full_queue_drops_job() {
        let mut config = ReelfeedConfig::for_testing();
        config.propagation.queue_capacity = 1;
        let handle = spawn_propagation_queue(&config, Arc::new(RecordingRecommender::default()));

        // The dispatcher has not been polled yet, so the second submit finds
        // the single slot taken.
        let first = handle.submit(PropagationJob::RecordFeedback { events: Vec::new() });
        let second = handle.submit(PropagationJob::RecordFeedback { events: Vec::new() });

        assert!(first.is_ok());
        assert!(matches!(second, Err(PropagationError::QueueFull { .. })));

        handle.drain().await.unwrap();
        let stats = handle.stats();
        assert_eq!(stats.submitted, 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.finished(), 1);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_rejected() {
        let handle = spawn_propagation_queue(
            &ReelfeedConfig::for_testing(),
            Arc::new(RecordingRecommender::default()),
        );

        handle.shutdown().await.unwrap();
        // Let the dispatcher task drop its receiver.
        tokio::time::sleep(Duration::from_millis(10)).await;

        let result = handle.submit(PropagationJob::RegisterUser {
            user_id: UserId(3),
            labels: Vec::new(),
        });
        assert_eq!(result, Err(PropagationError::ShutDown));
    }

    #[test]
    fn test_job_kinds() {
        assert_eq!(
            PropagationJob::RecordFeedback { events: Vec::new() }.kind(),
            "record_feedback"
        );
        assert_eq!(
            PropagationJob::RegisterUser {
                user_id: UserId(1),
                labels: Vec::new()
            }
            .kind(),
            "register_user"
        );
    }
}
