//! Authentication API endpoints
//!
//! - POST /auth/register - Parent registration
//! - POST /auth/register-librarian - Librarian registration
//! - GET /auth/verify?token= - Email verification link
//! - POST /auth/token - Login (form encoded), returns a bearer token
//! - POST /auth/logout - Invalidate the presented token

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::api::middleware::{bearer_token, ApiError, AppState, AuthenticatedUser};
use crate::models::UserRole;
use crate::services::user::{RegisterInput, UserServiceError, VerifyOutcome};

/// Form fields of `POST /auth/token`
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user_role: UserRole,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: String,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register_parent))
        .route("/register-librarian", post(register_librarian))
        .route("/verify", get(verify_email))
        .route("/token", post(login))
}

pub fn protected_router() -> Router<AppState> {
    Router::new().route("/logout", post(logout))
}

/// POST /auth/register
async fn register_parent(
    State(state): State<AppState>,
    Json(body): Json<RegisterInput>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let user = state.user_service.register_parent(body).await?;
    Ok((StatusCode::CREATED, MessageResponse::new(registered_message(user.is_verified))))
}

/// POST /auth/register-librarian
async fn register_librarian(
    State(state): State<AppState>,
    Json(body): Json<RegisterInput>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let user = state.user_service.register_librarian(body).await?;
    let message = if user.is_verified {
        "Librarian account created. An administrator must approve it before you can manage the catalog."
    } else {
        "Librarian account created. Check your email to verify your address; an administrator must approve the account before you can manage the catalog."
    };
    Ok((StatusCode::CREATED, MessageResponse::new(message)))
}

fn registered_message(verified: bool) -> &'static str {
    if verified {
        "Registration successful. You can now log in."
    } else {
        "Registration successful. Please check your email to verify your account."
    }
}

/// GET /auth/verify?token=
async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = match state.user_service.verify_email(&query.token).await? {
        VerifyOutcome::Verified => "Email verified successfully. You can now log in.",
        VerifyOutcome::AlreadyVerified => "Email already verified. You can log in.",
    };
    Ok(MessageResponse::new(message))
}

/// POST /auth/token
///
/// Limited to 10 requests per minute per client IP and 5 failures per
/// 15 minutes per username.
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(body): Form<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    if let Some(ip) = client_ip(&headers) {
        if state.rate_limiter.is_ip_limited(ip).await {
            tracing::warn!("Login rate limit hit for {}", ip);
            return Err(ApiError::rate_limited("Too many requests. Please try again in a minute."));
        }
        state.rate_limiter.record_ip_request(ip).await;
    }

    if state.rate_limiter.is_username_limited(&body.username).await {
        tracing::warn!("Too many failed logins for '{}'", body.username);
        return Err(ApiError::rate_limited(
            "Too many failed login attempts. Please try again in 15 minutes.",
        ));
    }

    let (session, user) = match state.user_service.login(&body.username, &body.password).await {
        Ok(ok) => ok,
        Err(e) => {
            if matches!(e, UserServiceError::AuthenticationError(_)) {
                state.rate_limiter.record_failed_attempt(&body.username).await;
            }
            return Err(e.into());
        }
    };

    state.rate_limiter.clear_username_attempts(&body.username).await;

    Ok(Json(TokenResponse {
        access_token: session.id,
        token_type: "bearer".to_string(),
        user_role: user.role,
    }))
}

/// POST /auth/logout
async fn logout(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(&headers).ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;
    state.user_service.logout(token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Client address as reported by a fronting proxy
fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next());
    let real_ip = headers.get("x-real-ip").and_then(|h| h.to_str().ok());

    forwarded
        .or(real_ip)
        .and_then(|ip| ip.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 192.168.1.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("172.16.0.1"));
        assert_eq!(client_ip(&headers), Some("10.0.0.1".parse().unwrap()));

        headers.remove("x-forwarded-for");
        assert_eq!(client_ip(&headers), Some("172.16.0.1".parse().unwrap()));

        headers.insert("x-real-ip", HeaderValue::from_static("not-an-ip"));
        assert_eq!(client_ip(&headers), None);
    }
}
