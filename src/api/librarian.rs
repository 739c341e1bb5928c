//! Catalog endpoints
//!
//! Public:
//! - GET /librarian/view-all-books, /librarian/view-all-videos
//! - GET /librarian/media-sources
//!
//! Librarian only (approval checked by the catalog service):
//! - POST /librarian/add-book, /librarian/add-video
//! - PATCH /librarian/edit-book/{id}, /librarian/edit-video/{id}
//! - DELETE /librarian/delete-book/{id}, /librarian/delete-video/{id}
//! - PATCH /librarian/suspend-book/{id}, /librarian/suspend-video/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};

use crate::api::auth::MessageResponse;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{MediaItem, MediaKind, MediaPatch, MediaQuery, NewMedia, Paged};

use MediaKind::{Book, Video};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/view-all-books", get(|s, q| list_media(Book, s, q)))
        .route("/view-all-videos", get(|s, q| list_media(Video, s, q)))
        .route("/media-sources", get(media_sources))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/add-book", post(|s, u, b| add_media(Book, s, u, b)))
        .route("/add-video", post(|s, u, b| add_media(Video, s, u, b)))
        .route("/edit-book/{id}", patch(|s, u, p, b| edit_media(Book, s, u, p, b)))
        .route("/edit-video/{id}", patch(|s, u, p, b| edit_media(Video, s, u, p, b)))
        .route("/delete-book/{id}", delete(|s, u, p| delete_media(Book, s, u, p)))
        .route("/delete-video/{id}", delete(|s, u, p| delete_media(Video, s, u, p)))
        .route("/suspend-book/{id}", patch(|s, u, p| toggle_suspended(Book, s, u, p)))
        .route("/suspend-video/{id}", patch(|s, u, p| toggle_suspended(Video, s, u, p)))
}

async fn list_media(
    kind: MediaKind,
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
) -> Result<Json<Paged<MediaItem>>, ApiError> {
    Ok(Json(state.catalog_service.list(kind, &query).await?))
}

async fn media_sources(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.catalog_service.sources().await?))
}

async fn add_media(
    kind: MediaKind,
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<NewMedia>,
) -> Result<(StatusCode, Json<MediaItem>), ApiError> {
    let item = state.catalog_service.add(&user.0, kind, body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn edit_media(
    kind: MediaKind,
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<MediaPatch>,
) -> Result<Json<MediaItem>, ApiError> {
    Ok(Json(state.catalog_service.edit(&user.0, kind, id, body).await?))
}

async fn delete_media(
    kind: MediaKind,
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.catalog_service.delete(&user.0, kind, id).await?;
    Ok(MessageResponse::new(format!("{} deleted", kind.label())))
}

async fn toggle_suspended(
    kind: MediaKind,
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<MediaItem>, ApiError> {
    Ok(Json(state.catalog_service.toggle_suspended(&user.0, kind, id).await?))
}
