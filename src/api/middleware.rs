//! API middleware and extractors
//!
//! Contains:
//! - Session authentication (cookie `session=` or `Authorization: Bearer`)
//! - Role guards for admin and teacher routes
//! - Mobile JWT authentication as an extractor
//! - Request statistics

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::api::responses::ApiError;
use crate::config::SessionConfig;
use crate::db::DbPool;
use crate::integrations::{ChatService, Translator};
use crate::models::User;
use crate::services::{
    ActivityService, AdminService, ArticleService, CourseService, DictionaryService,
    DrawingService, LiveService, LoginRateLimiter, MobileTokenService, PushService,
    TryoutService, UploadService, UserService, VocabularyService,
};

// ============================================================================
// Request Statistics
// ============================================================================

/// Lightweight request statistics using atomic operations (no locks)
pub struct RequestStats {
    total_requests: AtomicU64,
    /// Sum of response times in microseconds
    total_response_time_us: AtomicU64,
    server_errors: AtomicU64,
    start_time: Instant,
}

/// Point-in-time copy for the admin dashboard
#[derive(Debug, Clone, Serialize)]
pub struct RequestStatsSnapshot {
    pub total_requests: u64,
    pub server_errors: u64,
    pub avg_response_time_ms: f64,
    pub uptime_seconds: u64,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            server_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record(&self, duration_us: u64, server_error: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us.fetch_add(duration_us, Ordering::Relaxed);
        if server_error {
            self.server_errors.fetch_add(1, Ordering::Relaxed);
        }
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

    pub fn snapshot(&self) -> RequestStatsSnapshot {
        RequestStatsSnapshot {
            total_requests: self.total_requests(),
            server_errors: self.server_errors.load(Ordering::Relaxed),
            avg_response_time_ms: self.avg_response_time_us() / 1000.0,
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub session_config: Arc<SessionConfig>,
    pub user_service: Arc<UserService>,
    pub activity_service: Arc<ActivityService>,
    pub mobile_tokens: Arc<MobileTokenService>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub course_service: Arc<CourseService>,
    pub article_service: Arc<ArticleService>,
    pub vocabulary_service: Arc<VocabularyService>,
    pub live_service: Arc<LiveService>,
    pub tryout_service: Arc<TryoutService>,
    pub push_service: Arc<PushService>,
    pub drawing_service: Arc<DrawingService>,
    pub upload_service: Arc<UploadService>,
    pub dictionary_service: Arc<DictionaryService>,
    pub admin_service: Arc<AdminService>,
    pub translator: Arc<dyn Translator>,
    pub chat: Arc<dyn ChatService>,
    pub request_stats: Arc<RequestStats>,
}

// ============================================================================
// Extractors
// ============================================================================

/// Authenticated user, inserted by `require_auth`
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
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// User set by `optional_auth`, if any
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts.extensions.get::<AuthenticatedUser>().map(|u| u.0.clone()),
        ))
    }
}

/// User authenticated with a mobile bearer JWT
#[derive(Debug, Clone)]
pub struct MobileUser(pub User);

impl FromRequestParts<AppState> for MobileUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Missing or malformed Authorization header"))?;

        let claims = state.mobile_tokens.verify(token)?;
        let user_id = claims
            .user_id()
            .ok_or_else(|| ApiError::unauthorized("Invalid token"))?;

        let user = state
            .user_service
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        Ok(MobileUser(user))
    }
}

/// Token from `Authorization: Bearer <token>`
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Session id from the bearer header, falling back to the `session` cookie
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = bearer_token(headers) {
        return Some(token.to_string());
    }

    headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|cookies| {
            cookies
                .split(';')
                .find_map(|cookie| cookie.trim().strip_prefix("session="))
                .filter(|token| !token.is_empty())
                .map(String::from)
        })
}

// ============================================================================
// Middleware
// ============================================================================

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Attach the user when a valid session is present, never reject
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(request.headers()) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Session lookup failed: {}", e),
        }
    }
    next.run(request).await
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

/// GURU or ADMIN only
pub async fn require_teacher(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_teacher() {
        return Err(ApiError::forbidden("Teacher privileges required"));
    }

    Ok(next.run(request).await)
}

/// Records request count and response time
pub async fn request_stats_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;

    let duration_us = start.elapsed().as_micros() as u64;
    state
        .request_stats
        .record(duration_us, response.status().is_server_error());

    response
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_extract_session_token_from_bearer() {
        let h = headers(&[(header::AUTHORIZATION, "Bearer test-token-123")]);
        assert_eq!(extract_session_token(&h), Some("test-token-123".to_string()));
    }

    #[test]
    fn test_extract_session_token_from_cookie() {
        let h = headers(&[(header::COOKIE, "theme=dark; session=test-token-456")]);
        assert_eq!(extract_session_token(&h), Some("test-token-456".to_string()));
    }

    #[test]
    fn test_extract_session_token_bearer_priority() {
        let h = headers(&[
            (header::AUTHORIZATION, "Bearer bearer-token"),
            (header::COOKIE, "session=cookie-token"),
        ]);
        assert_eq!(extract_session_token(&h), Some("bearer-token".to_string()));
    }

    #[test]
    fn test_extract_session_token_none() {
        assert!(extract_session_token(&HeaderMap::new()).is_none());
        let h = headers(&[(header::AUTHORIZATION, "Basic invalid")]);
        assert!(extract_session_token(&h).is_none());
        let h = headers(&[(header::COOKIE, "session=")]);
        assert!(extract_session_token(&h).is_none());
    }

    #[test]
    fn test_bearer_token_rejects_empty() {
        let h = headers(&[(header::AUTHORIZATION, "Bearer ")]);
        assert!(bearer_token(&h).is_none());
    }

    #[test]
    fn test_request_stats() {
        let stats = RequestStats::new();
        assert_eq!(stats.avg_response_time_us(), 0.0);

        stats.record(1000, false);
        stats.record(3000, true);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.server_errors, 1);
        assert_eq!(snapshot.avg_response_time_ms, 2.0);
    }
}
