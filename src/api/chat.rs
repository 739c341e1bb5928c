//! Recommendation chat endpoints
//!
//! - POST /chatbot - `{message, session_id?}` to `{reply, items, session_id}`
//! - GET /chatbot/history?session_id= - Stored turns of one session

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::ChatMessage;
use crate::services::chat::{ChatReply, ChatRequest};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub session_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chatbot", post(send_message))
        .route("/chatbot/history", get(history))
}

async fn send_message(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    Ok(Json(state.chat_service.respond(&user.0, body).await?))
}

async fn history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    Ok(Json(state.chat_service.history(&user.0, &query.session_id).await?))
}
