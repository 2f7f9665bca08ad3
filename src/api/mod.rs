//! API layer - HTTP handlers and routing
//!
//! Every endpoint lives under `/api/v1`. Routes are grouped by the guard
//! they need:
//! - public (auth, VAPID key, mobile login and the JWT-protected mobile API)
//! - optional session (course catalogue, articles)
//! - logged-in users
//! - teachers (GURU/ADMIN authoring)
//! - admins

pub mod activity;
pub mod admin;
pub mod articles;
pub mod auth;
pub mod common;
pub mod courses;
pub mod drawings;
pub mod language;
pub mod live;
pub mod middleware;
pub mod mobile;
pub mod notifications;
pub mod responses;
pub mod tryouts;
pub mod upload;
pub mod vocabulary;

#[cfg(test)]
mod tests;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::UploadConfig;

pub use middleware::{AppState, RequestStats};
pub use responses::ApiError;

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest("/admin", admin::router().merge(notifications::admin_router()))
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Authoring routes (need GURU or ADMIN)
    let teacher_routes = Router::new()
        .merge(live::teacher_router())
        .merge(tryouts::teacher_router())
        .route_layer(axum_middleware::from_fn(middleware::require_teacher))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but no particular role)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/vocabulary", vocabulary::router())
        .nest("/drawings", drawings::router())
        .nest("/upload", upload::router(state.upload_service.body_limit()))
        .merge(courses::protected_router())
        .merge(articles::protected_router())
        .merge(activity::router())
        .merge(live::router())
        .merge(tryouts::router())
        .merge(notifications::protected_router())
        .merge(language::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Routes that behave differently for a logged-in reader
    let optional_routes = Router::new()
        .merge(courses::public_router())
        .merge(articles::public_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/mobile", mobile::router())
        .merge(notifications::public_router())
        .merge(optional_routes)
        .merge(protected_routes)
        .merge(teacher_routes)
        .merge(admin_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str, uploads: &UploadConfig) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    let mut router = Router::new().nest("/api/v1", build_api_router(state.clone()));

    // Files are served locally unless the public prefix points elsewhere
    let prefix = uploads.public_prefix.trim_end_matches('/');
    if prefix.starts_with('/') && prefix.len() > 1 {
        router = router.nest_service(prefix, ServeDir::new(&uploads.path));
    } else {
        tracing::info!(prefix = %uploads.public_prefix, "Uploads are not served by this process");
    }

    Ok(router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // Request stats middleware (outermost layer, runs for all requests)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state))
}
