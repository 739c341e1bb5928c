//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The `ApiError` response type and conversions from service errors
//! - Authentication (bearer session token) and role guards
//! - Request statistics

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{create_cache, Cache};
use crate::config::Config;
use crate::db::repositories::{
    SqlxChatRepository, SqlxInterestRepository, SqlxLandingRepository, SqlxMediaRepository,
    SqlxReviewRepository, SqlxSessionRepository, SqlxUserRepository, SqlxVerificationRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole};
use crate::services::{
    AdminError, AdminService, CatalogError, CatalogService, ChatError, ChatService, EmailService,
    FamilyError, FamilyService, LandingError, LandingService, LoginRateLimiter, ReviewError,
    ReviewService, UserService, UserServiceError,
};

// ============================================================================
// Request Statistics
// ============================================================================

/// Request counters kept with atomics
pub struct RequestStats {
    total_requests: AtomicU64,
    /// Sum of response times in microseconds
    total_response_time_us: AtomicU64,
    start_time: Instant,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record(&self, duration_us: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us.fetch_add(duration_us, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn avg_response_time_us(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.total_response_time_us.load(Ordering::Relaxed) as f64 / total as f64
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Application State
// ============================================================================

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub cache: Arc<Cache>,
    pub user_service: Arc<UserService>,
    pub family_service: Arc<FamilyService>,
    pub catalog_service: Arc<CatalogService>,
    pub admin_service: Arc<AdminService>,
    pub review_service: Arc<ReviewService>,
    pub landing_service: Arc<LandingService>,
    pub chat_service: Arc<ChatService>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub request_stats: Arc<RequestStats>,
}

impl AppState {
    /// Wire repositories and services over an open, migrated pool
    pub fn new(pool: DynDatabasePool, config: &Config) -> Self {
        let cache = create_cache(&config.cache);

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let interest_repo = SqlxInterestRepository::boxed(pool.clone());
        let media_repo = SqlxMediaRepository::boxed(pool.clone());
        let email = Arc::new(EmailService::new(config.email.clone()));

        let user_service = Arc::new(UserService::new(
            user_repo.clone(),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxVerificationRepository::boxed(pool.clone()),
            email,
            config.auth.clone(),
        ));
        let family_service = Arc::new(FamilyService::new(user_repo.clone(), interest_repo.clone()));
        let catalog_service = Arc::new(CatalogService::new(media_repo.clone(), cache.clone()));
        let admin_service = Arc::new(AdminService::new(user_repo));
        let review_service = Arc::new(ReviewService::new(
            SqlxReviewRepository::boxed(pool.clone()),
            cache.clone(),
        ));
        let landing_service = Arc::new(LandingService::new(
            SqlxLandingRepository::boxed(pool.clone()),
            cache.clone(),
        ));
        let chat_service = Arc::new(ChatService::new(
            media_repo,
            interest_repo,
            SqlxChatRepository::boxed(pool.clone()),
            config.chat.clone(),
        ));

        Self {
            pool,
            cache,
            user_service,
            family_service,
            catalog_service,
            admin_service,
            review_service,
            landing_service,
            chat_service,
            rate_limiter: Arc::new(LoginRateLimiter::new()),
            request_stats: Arc::new(RequestStats::new()),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error body returned by every endpoint.
///
/// `detail` is the human readable message the dashboards display, `code`
/// the machine readable kind that also selects the HTTP status.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub detail: String,
    pub code: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            code: code.into(),
        }
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", detail)
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", detail)
    }

    pub fn validation_error(detail: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", detail)
    }

    pub fn rate_limited(detail: impl Into<String>) -> Self {
        Self::new("RATE_LIMIT", detail)
    }

    /// Logs the cause and hides it from the client
    pub fn internal_error(err: impl std::fmt::Display) -> Self {
        tracing::error!("Request failed: {:#}", err);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" | "DUPLICATE" | "EMAIL_NOT_VERIFIED" | "INVALID_TOKEN" => {
                StatusCode::BAD_REQUEST
            }
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, Json(self)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::UserExists(msg) => ApiError::new("DUPLICATE", msg),
            e @ UserServiceError::EmailNotVerified => ApiError::new("EMAIL_NOT_VERIFIED", e.to_string()),
            e @ UserServiceError::InvalidToken => ApiError::new("INVALID_TOKEN", e.to_string()),
            UserServiceError::NotFound(msg) => ApiError::not_found(msg),
            UserServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            UserServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<FamilyError> for ApiError {
    fn from(err: FamilyError) -> Self {
        match err {
            FamilyError::ValidationError(msg) => ApiError::validation_error(msg),
            FamilyError::UserExists(msg) => ApiError::new("DUPLICATE", msg),
            e @ FamilyError::ChildNotFound => ApiError::not_found(e.to_string()),
            FamilyError::Forbidden(msg) => ApiError::forbidden(msg),
            FamilyError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::ValidationError(msg) => ApiError::validation_error(msg),
            e @ CatalogError::DuplicateLink { .. } => ApiError::new("DUPLICATE", e.to_string()),
            e @ CatalogError::NotFound(_) => ApiError::not_found(e.to_string()),
            CatalogError::Forbidden(msg) => ApiError::forbidden(msg),
            CatalogError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        match err {
            e @ AdminError::NotFound(_) => ApiError::not_found(e.to_string()),
            AdminError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<ReviewError> for ApiError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::ValidationError(msg) => ApiError::validation_error(msg),
            e @ ReviewError::NotFound => ApiError::not_found(e.to_string()),
            e @ ReviewError::NotOwner => ApiError::forbidden(e.to_string()),
            ReviewError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<LandingError> for ApiError {
    fn from(err: LandingError) -> Self {
        match err {
            LandingError::ValidationError(msg) => ApiError::validation_error(msg),
            e @ LandingError::NotFound => ApiError::not_found(e.to_string()),
            LandingError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::ValidationError(msg) => ApiError::validation_error(msg),
            ChatError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))
    }
}

/// Session token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?
        .to_string();

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Could not validate credentials"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

fn ensure_role(request: &Request, role: UserRole) -> Result<(), ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

    if user.0.role != role {
        return Err(ApiError::forbidden(format!(
            "Only {} accounts can access this resource",
            role.as_str().to_lowercase()
        )));
    }
    Ok(())
}

pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    ensure_role(&request, UserRole::Admin)?;
    Ok(next.run(request).await)
}

pub async fn require_parent(request: Request, next: Next) -> Result<Response, ApiError> {
    ensure_role(&request, UserRole::Parent)?;
    Ok(next.run(request).await)
}

/// Librarian role only; approval is checked per operation
pub async fn require_librarian(request: Request, next: Next) -> Result<Response, ApiError> {
    ensure_role(&request, UserRole::Librarian)?;
    Ok(next.run(request).await)
}

pub async fn request_stats_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    state.request_stats.record(start.elapsed().as_micros() as u64);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use proptest::prelude::*;

    fn headers(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_unauthorized_sets_challenge() {
        let response = ApiError::unauthorized("nope").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[test]
    fn test_service_error_statuses() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (UserServiceError::EmailNotVerified.into(), StatusCode::BAD_REQUEST),
            (UserServiceError::UserExists("taken".into()).into(), StatusCode::BAD_REQUEST),
            (FamilyError::ChildNotFound.into(), StatusCode::NOT_FOUND),
            (ReviewError::NotOwner.into(), StatusCode::FORBIDDEN),
            (
                CatalogError::DuplicateLink {
                    kind: crate::models::MediaKind::Book,
                    title: "Dune".into(),
                }
                .into(),
                StatusCode::BAD_REQUEST,
            ),
            (ChatError::InternalError(anyhow::anyhow!("boom")).into(), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{}", err.code);
        }
    }

    #[test]
    fn test_internal_error_hides_cause() {
        let err = ApiError::internal_error("database is on fire");
        assert_eq!(err.detail, "Internal server error");
    }

    #[test]
    fn test_request_stats_average() {
        let stats = RequestStats::new();
        assert_eq!(stats.avg_response_time_us(), 0.0);
        stats.record(100);
        stats.record(300);
        assert_eq!(stats.total_requests(), 2);
        assert_eq!(stats.avg_response_time_us(), 200.0);
    }

    proptest! {
        #[test]
        fn property_unknown_codes_are_server_errors(code in "[A-Z_]{1,20}") {
            let known = ["UNAUTHORIZED", "FORBIDDEN", "NOT_FOUND", "VALIDATION_ERROR", "DUPLICATE",
                "EMAIL_NOT_VERIFIED", "INVALID_TOKEN", "RATE_LIMIT"];
            prop_assume!(!known.contains(&code.as_str()));
            prop_assert_eq!(ApiError::new(code, "x").status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
