//! Parent dashboard endpoints (parent role only)
//!
//! - GET /parent/interests
//! - POST /parent/create-child
//! - GET /parent/my-children
//! - PATCH /parent/update-child/{child_id}
//! - DELETE /parent/delete-child/{child_id}
//! - PATCH /parent/subscription

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::auth::MessageResponse;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::users::UserResponse;
use crate::models::{Interest, SubscriptionTier};
use crate::services::family::{ChildProfile, CreateChildInput, UpdateChildInput};

#[derive(Debug, Deserialize)]
pub struct SubscriptionRequest {
    pub tier: SubscriptionTier,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/interests", get(list_interests))
        .route("/create-child", post(create_child))
        .route("/my-children", get(my_children))
        .route("/update-child/{child_id}", patch(update_child))
        .route("/delete-child/{child_id}", delete(delete_child))
        .route("/subscription", patch(set_subscription))
}

async fn list_interests(State(state): State<AppState>) -> Result<Json<Vec<Interest>>, ApiError> {
    Ok(Json(state.family_service.list_interests().await?))
}

async fn create_child(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateChildInput>,
) -> Result<(StatusCode, Json<ChildProfile>), ApiError> {
    let child = state.family_service.create_child(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(child)))
}

async fn my_children(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<ChildProfile>>, ApiError> {
    Ok(Json(state.family_service.my_children(&user.0).await?))
}

async fn update_child(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(child_id): Path<i64>,
    Json(body): Json<UpdateChildInput>,
) -> Result<Json<ChildProfile>, ApiError> {
    Ok(Json(state.family_service.update_child(&user.0, child_id, body).await?))
}

async fn delete_child(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(child_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.family_service.delete_child(&user.0, child_id).await?;
    Ok(MessageResponse::new("Child account deleted"))
}

async fn set_subscription(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<SubscriptionRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let parent = state.family_service.set_subscription(&user.0, body.tier).await?;
    Ok(Json(parent.into()))
}
