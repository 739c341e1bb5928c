//! App review endpoints
//!
//! - POST /reviews/app - Submit a review
//! - GET /reviews/my-reviews - Own reviews, newest first
//! - DELETE /reviews/{review_id} - Delete an own review

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};

use crate::api::auth::MessageResponse;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreateReviewInput, Review};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/app", post(create_review))
        .route("/my-reviews", get(my_reviews))
        .route("/{review_id}", delete(delete_review))
}

async fn create_review(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateReviewInput>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    let review = state.review_service.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn my_reviews(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Review>>, ApiError> {
    Ok(Json(state.review_service.mine(&user.0).await?))
}

async fn delete_review(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(review_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.review_service.delete(&user.0, review_id).await?;
    Ok(MessageResponse::new("Review deleted"))
}
