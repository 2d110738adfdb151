//! Reelfeed Gorse - Recommender adapter for the Gorse REST API

#![deny(missing_docs)]
#![deny(clippy::missing_errors_doc)]
//!
//! Implements [`reelfeed_core::RecommendationSource`] on top of a Gorse
//! server: personalized and popular retrieval, feedback ingestion and
//! item/user registration.

pub mod errors;
pub mod provider;
mod wire;

pub use errors::GorseError;
pub use provider::GorseProvider;

/// Convenience type alias for Results with GorseError.
pub type Result<T> = std::result::Result<T, GorseError>;
