//! Gorse request and response bodies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Feedback {
    pub feedback_type: String,
    pub user_id: String,
    pub item_id: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Item {
    pub item_id: String,
    pub is_hidden: bool,
    pub labels: Vec<String>,
    pub categories: Vec<String>,
    pub timestamp: String,
    pub comment: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct User {
    pub user_id: String,
    pub labels: Vec<String>,
    pub subscribe: Vec<String>,
    pub comment: String,
}

/// Scored item returned by session recommendation; the score is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Score {
    pub id: String,
}

/// Acknowledgement returned by insert endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Affected {
    #[serde(default)]
    pub row_affected: i64,
}
