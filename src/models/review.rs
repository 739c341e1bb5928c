//! App reviews

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Allowed star ratings
pub const STARS_RANGE: std::ops::RangeInclusive<i64> = 1..=5;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: i64,
    pub user_id: i64,
    pub review: String,
    pub stars: i64,
    pub review_type: String,
    /// Picked by an admin for the landing page
    pub showcased: bool,
    pub created_at: DateTime<Utc>,
}

/// Review joined with its author's username
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReviewWithAuthor {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub review: String,
    pub stars: i64,
    pub review_type: String,
    pub showcased: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewInput {
    pub review: String,
    pub stars: i64,
}
