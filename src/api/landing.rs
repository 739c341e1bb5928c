//! Public landing page endpoints
//!
//! - GET /landing-page-content
//! - GET /reviews/showcased

use axum::{extract::State, routing::get, Json, Router};

use crate::api::middleware::{ApiError, AppState};
use crate::models::LandingBlock;
use crate::services::review::ShowcasedReview;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/landing-page-content", get(landing_content))
        .route("/reviews/showcased", get(showcased_reviews))
}

async fn landing_content(State(state): State<AppState>) -> Result<Json<Vec<LandingBlock>>, ApiError> {
    Ok(Json(state.landing_service.content().await?))
}

async fn showcased_reviews(State(state): State<AppState>) -> Result<Json<Vec<ShowcasedReview>>, ApiError> {
    Ok(Json(state.review_service.showcased().await?))
}
