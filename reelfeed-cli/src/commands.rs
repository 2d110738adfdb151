//! CLI command implementations

use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Subcommand;
use reelfeed_core::tagging::TagExtractor;
use reelfeed_core::{
    FeedCursor, FeedRequest, FeedServices, PublishRequest, ReelfeedError, RequestContext, UserId,
    VideoId,
};
use serde_json::json;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Print the tags derived from a title and description
    Tags {
        /// Video title
        title: String,
        /// Video description
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Compose a feed batch for a viewer
    Feed {
        /// Viewer id, 0 for anonymous
        #[arg(short, long, default_value_t = 0)]
        user: i64,
        /// Batch size, 0 for the configured default
        #[arg(short = 'n', long, default_value_t = 0)]
        count: usize,
        /// Only videos published before this RFC 3339 time
        #[arg(long)]
        before: Option<DateTime<Utc>>,
        /// Overall request deadline in milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,
    },
    /// Search videos by title and description
    Search {
        /// Free-text query
        query: String,
        /// Viewer id, 0 for anonymous
        #[arg(short, long, default_value_t = 0)]
        user: i64,
        /// Results to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Maximum results
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Show one video with its author
    Show {
        /// Video id
        video_id: i64,
    },
    /// Publish a video and wait for its propagation
    Publish {
        /// Owner user id
        #[arg(long)]
        owner: i64,
        /// Video title
        #[arg(long)]
        title: String,
        /// Video description
        #[arg(long, default_value = "")]
        description: String,
        /// Playback URL
        #[arg(long)]
        video_url: String,
        /// Cover image URL
        #[arg(long, default_value = "")]
        cover_url: String,
    },
    /// Register a user and their interest labels with the recommender
    RegisterUser {
        /// User id
        user_id: i64,
        /// Interest label, repeatable
        #[arg(short, long = "label")]
        labels: Vec<String>,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns the failure of the underlying service call or of JSON output.
pub async fn handle_command(command: Commands, services: &FeedServices) -> anyhow::Result<()> {
    match command {
        Commands::Tags { title, description } => show_tags(&title, &description),
        Commands::Feed {
            user,
            count,
            before,
            deadline_ms,
        } => show_feed(services, UserId(user), count, before, deadline_ms).await,
        Commands::Search {
            query,
            user,
            offset,
            limit,
        } => search(services, &query, UserId(user), offset, limit).await,
        Commands::Show { video_id } => show_video(services, VideoId(video_id)).await,
        Commands::Publish {
            owner,
            title,
            description,
            video_url,
            cover_url,
        } => {
            let request = PublishRequest {
                owner_id: UserId(owner),
                title,
                description,
                video_url,
                cover_url,
            };
            publish(services, request).await
        }
        Commands::RegisterUser { user_id, labels } => {
            register_user(services, UserId(user_id), labels).await
        }
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn show_tags(title: &str, description: &str) -> anyhow::Result<()> {
    let tags = TagExtractor::new().extract_tags(title, description);
    print_json(&tags)
}

async fn show_feed(
    services: &FeedServices,
    viewer: UserId,
    count: usize,
    before: Option<DateTime<Utc>>,
    deadline_ms: Option<u64>,
) -> anyhow::Result<()> {
    let ctx = match deadline_ms {
        Some(ms) => RequestContext::with_timeout(Duration::from_millis(ms)),
        None => RequestContext::background(),
    };

    let mut request = FeedRequest::new(viewer, count);
    if let Some(cursor) = before {
        request = request.with_cursor(FeedCursor::before(cursor));
    }

    let batch = services
        .composer
        .compose_feed(&ctx, request)
        .await
        .map_err(report)?;
    tracing::info!("Served {} items from the {} source", batch.len(), batch.source);

    print_json(&batch)
}

async fn search(
    services: &FeedServices,
    query: &str,
    viewer: UserId,
    offset: usize,
    limit: usize,
) -> anyhow::Result<()> {
    let items = services
        .catalog
        .search_videos(&RequestContext::background(), query, viewer, offset, limit)
        .await
        .map_err(report)?;

    print_json(&items)
}

async fn show_video(services: &FeedServices, video_id: VideoId) -> anyhow::Result<()> {
    let item = services
        .catalog
        .video_by_id(&RequestContext::background(), video_id)
        .await
        .map_err(report)?;

    print_json(&item)
}

async fn publish(services: &FeedServices, request: PublishRequest) -> anyhow::Result<()> {
    let tags = TagExtractor::new().extract_tags(&request.title, &request.description);
    let video_id = services
        .publisher
        .publish(&RequestContext::background(), request)
        .await
        .map_err(report)?;

    if let Err(e) = services.propagation.drain().await {
        tracing::warn!("Could not wait for propagation of video {}: {}", video_id, e);
    }

    print_json(&json!({
        "video_id": video_id,
        "tags": tags,
    }))
}

async fn register_user(
    services: &FeedServices,
    user_id: UserId,
    labels: Vec<String>,
) -> anyhow::Result<()> {
    let job_id = services.register_user(user_id, labels.clone())?;
    services.propagation.drain().await?;
    tracing::info!("Registration job {} for user {} finished", job_id, user_id);

    print_json(&json!({
        "user_id": user_id,
        "labels": labels,
    }))
}

/// Keep the detailed error in the log and show the user-facing message.
fn report(error: ReelfeedError) -> anyhow::Error {
    tracing::debug!("Command failed: {:?}", error);
    anyhow::anyhow!(error.user_message())
}
