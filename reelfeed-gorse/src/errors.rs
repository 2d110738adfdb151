//! Error types for building the Gorse adapter.
//!
//! Call failures are reported as [`reelfeed_core::RecommendError`]; these
//! errors only cover construction.

use thiserror::Error;

/// Errors that can occur while setting up a [`GorseProvider`](crate::GorseProvider).
#[derive(Debug, Error)]
pub enum GorseError {
    /// Endpoint is not an absolute http(s) URL.
    #[error("Invalid Gorse endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The endpoint as configured
        endpoint: String,
        /// Why it was rejected
        reason: String,
    },

    /// HTTP client could not be built.
    #[error("HTTP client error: {reason}")]
    Client {
        /// The reason reported by the client builder
        reason: String,
    },
}
