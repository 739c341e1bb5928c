//! Admin dashboard endpoints (admin role only)
//!
//! Users:
//! - GET /admin/view-all-users (also /admin/viewAllUsers)
//! - GET /admin/view-all-librarians
//! - PATCH /admin/approve-librarian/{id}
//! - DELETE /admin/delete-librarian/{id}, /admin/delete-parent/{id}, /admin/delete-child/{id}
//! - GET /admin/librarian/{id}/books, /admin/librarian/{id}/videos
//!
//! Content:
//! - GET /admin/landing-page-content, PUT /admin/landing-page-content/{id}
//! - GET /admin/reviews, PATCH /admin/reviews/{id}/showcase
//!
//! - GET /admin/stats

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, patch, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::auth::MessageResponse;
use crate::api::middleware::{ApiError, AppState};
use crate::models::{LandingBlock, MediaItem, MediaKind, Paged, ReviewWithAuthor};
use crate::services::admin::{FamilyOverview, ManagedUser, UserCounts};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLandingRequest {
    pub display_text: String,
}

#[derive(Debug, Deserialize)]
pub struct ShowcaseRequest {
    pub showcased: bool,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub version: String,
    pub users: UserCounts,
    pub books: i64,
    pub videos: i64,
    pub active_chat_sessions: u64,
    pub uptime_seconds: u64,
    pub uptime_formatted: String,
    pub total_requests: u64,
    pub avg_response_time_ms: f64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/view-all-users", get(view_all_users))
        .route("/viewAllUsers", get(view_all_users))
        .route("/view-all-librarians", get(view_all_librarians))
        .route("/approve-librarian/{id}", patch(approve_librarian))
        .route("/delete-librarian/{id}", delete(delete_librarian))
        .route("/delete-parent/{id}", delete(delete_parent))
        .route("/delete-child/{id}", delete(delete_child))
        .route("/librarian/{id}/books", get(|s, p, q| librarian_media(MediaKind::Book, s, p, q)))
        .route("/librarian/{id}/videos", get(|s, p, q| librarian_media(MediaKind::Video, s, p, q)))
        .route("/landing-page-content", get(landing_content))
        .route("/landing-page-content/{id}", put(update_landing_content))
        .route("/reviews", get(all_reviews))
        .route("/reviews/{id}/showcase", patch(showcase_review))
        .route("/stats", get(stats))
}

async fn view_all_users(State(state): State<AppState>) -> Result<Json<FamilyOverview>, ApiError> {
    Ok(Json(state.admin_service.families().await?))
}

async fn view_all_librarians(State(state): State<AppState>) -> Result<Json<Vec<ManagedUser>>, ApiError> {
    Ok(Json(state.admin_service.librarians().await?))
}

async fn approve_librarian(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ManagedUser>, ApiError> {
    let librarian = state.admin_service.approve_librarian(id).await?;
    Ok(Json(librarian.into()))
}

async fn delete_librarian(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.admin_service.delete_librarian(id).await?;
    Ok(MessageResponse::new("Librarian deleted"))
}

async fn delete_parent(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let removed = state.admin_service.delete_parent(id).await?;
    let children = removed.saturating_sub(1);
    Ok(MessageResponse::new(format!(
        "Parent deleted along with {} child account{}",
        children,
        if children == 1 { "" } else { "s" }
    )))
}

async fn delete_child(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.admin_service.delete_child(id).await?;
    Ok(MessageResponse::new("Child deleted"))
}

async fn librarian_media(
    kind: MediaKind,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paged<MediaItem>>, ApiError> {
    let librarian = state.admin_service.librarian(id).await?;
    let page = state
        .catalog_service
        .list_by_librarian(kind, &librarian, query.page, query.size)
        .await?;
    Ok(Json(page))
}

async fn landing_content(State(state): State<AppState>) -> Result<Json<Vec<LandingBlock>>, ApiError> {
    Ok(Json(state.landing_service.content().await?))
}

async fn update_landing_content(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateLandingRequest>,
) -> Result<Json<LandingBlock>, ApiError> {
    Ok(Json(state.landing_service.update_text(id, &body.display_text).await?))
}

async fn all_reviews(State(state): State<AppState>) -> Result<Json<Vec<ReviewWithAuthor>>, ApiError> {
    Ok(Json(state.review_service.all().await?))
}

async fn showcase_review(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ShowcaseRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.review_service.set_showcased(id, body.showcased).await?;
    let message = if body.showcased {
        "Review added to the landing page"
    } else {
        "Review removed from the landing page"
    };
    Ok(MessageResponse::new(message))
}

async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let users = state.admin_service.user_counts().await?;
    let books = state.catalog_service.count(MediaKind::Book).await?;
    let videos = state.catalog_service.count(MediaKind::Video).await?;
    let uptime_seconds = state.request_stats.uptime_seconds();

    Ok(Json(StatsResponse {
        version: APP_VERSION.to_string(),
        users,
        books,
        videos,
        active_chat_sessions: state.chat_service.active_sessions().await,
        uptime_seconds,
        uptime_formatted: format_uptime(uptime_seconds),
        total_requests: state.request_stats.total_requests(),
        avg_response_time_ms: state.request_stats.avg_response_time_us() / 1000.0,
    }))
}

fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(42), "42s");
        assert_eq!(format_uptime(125), "2m");
        assert_eq!(format_uptime(3 * 3600 + 60), "3h 1m");
        assert_eq!(format_uptime(2 * 86400 + 3600 + 120), "2d 1h 2m");
    }
}
