//! Landing page content blocks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest text a block may hold
pub const MAX_DISPLAY_TEXT_LEN: usize = 255;

/// One editable snippet of the public landing page.
///
/// `display_type` is one of `INTRODUCTION`, `FEATURE`, `HOW_IT_WORKS` or
/// `PRICING`; pricing lines carry a `grouping_key` naming their plan.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LandingBlock {
    pub id: i64,
    pub display_type: String,
    pub title: Option<String>,
    pub grouping_key: Option<String>,
    pub display_text: String,
    pub sort_order: i64,
    pub updated_at: DateTime<Utc>,
}
