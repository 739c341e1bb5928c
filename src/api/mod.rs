//! API layer - HTTP handlers and routing
//!
//! Routes are mounted at the root, the dashboards call `/auth/token`,
//! `/users/me/` and friends without a version prefix.
//!
//! Access levels:
//! - public: registration, login, catalog browsing, landing page
//! - any signed-in user: profile, reviews, chat
//! - role specific: `/parent`, librarian curation, `/admin`

pub mod admin;
pub mod auth;
pub mod chat;
pub mod landing;
pub mod librarian;
pub mod middleware;
pub mod parent;
pub mod reviews;
pub mod users;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser, RequestStats};

/// Build the API routes
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let parent_routes = Router::new()
        .nest("/parent", parent::router())
        .route_layer(axum_middleware::from_fn(middleware::require_parent))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let librarian_routes = Router::new()
        .nest("/librarian", librarian::protected_router())
        .route_layer(axum_middleware::from_fn(middleware::require_librarian))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Any authenticated role
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/users", users::router())
        .nest("/reviews", reviews::router())
        .merge(chat::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/librarian", librarian::public_router())
        .merge(landing::router())
        .merge(admin_routes)
        .merge(parent_routes)
        .merge(librarian_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    build_api_router(state.clone())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state)
}
