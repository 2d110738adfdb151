//! Integration tests for Reelfeed
//!
//! These tests wire the feed services through `FeedServices` the way the CLI
//! does and check behavior that spans the composer, the hydrator, the store
//! and the propagation queue. The Gorse adapter is exercised against a local
//! fake server.

#[path = "integration/feed_pipeline.rs"]
mod feed_pipeline;

#[path = "integration/deadlines.rs"]
mod deadlines;

#[path = "integration/publish_isolation.rs"]
mod publish_isolation;

#[path = "integration/search.rs"]
mod search;

#[path = "integration/gorse_adapter.rs"]
mod gorse_adapter;
