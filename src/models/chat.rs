//! Persisted chat turns

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MediaKind;

/// Reference to a recommended catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedRef {
    pub kind: MediaKind,
    pub id: i64,
    pub title: String,
}

/// One user message and the bot's reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: String,
    pub user_id: i64,
    pub message: String,
    pub reply: String,
    pub items: Vec<RecommendedRef>,
    pub created_at: DateTime<Utc>,
}

/// A turn about to be stored
#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub session_id: String,
    pub user_id: i64,
    pub message: String,
    pub reply: String,
    pub items: Vec<RecommendedRef>,
}
