//! Profile endpoints for any signed-in user
//!
//! - GET /users/me/ - Current profile
//! - PATCH /users/me/ - Partial profile update
//! - PATCH /users/change-password/{user_id} - Change own password

use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::api::auth::MessageResponse;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{SubscriptionTier, UpdateProfileInput, User, UserRole};

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub country: Option<String>,
    pub gender: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub race: Option<String>,
    pub role: UserRole,
    pub tier: Option<SubscriptionTier>,
    pub is_verified: bool,
    pub is_approved: bool,
    pub primary_parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            country: user.country,
            gender: user.gender,
            birthday: user.birthday,
            race: user.race,
            role: user.role,
            tier: user.tier,
            is_verified: user.is_verified,
            is_approved: user.is_approved,
            primary_parent_id: user.primary_parent_id,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(current_user).patch(update_profile))
        .route("/me/", get(current_user).patch(update_profile))
        .route("/change-password/{user_id}", patch(change_password))
}

async fn current_user(user: AuthenticatedUser) -> Json<UserResponse> {
    Json(user.0.into())
}

async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdateProfileInput>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state.user_service.update_profile(&user.0, body).await?;
    Ok(Json(updated.into()))
}

async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(user_id): Path<i64>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .user_service
        .change_password(&user.0, user_id, &body.current_password, &body.new_password)
        .await?;
    Ok(MessageResponse::new("Password updated successfully"))
}
