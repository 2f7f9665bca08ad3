//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - Register (first account becomes ADMIN)
//! - POST /api/v1/auth/login - Login, sets the session cookie
//! - POST /api/v1/auth/logout - Logout
//! - GET /api/v1/auth/me - Current user
//! - PUT /api/v1/auth/profile - Update name, avatar, bio
//! - PUT /api/v1/auth/password - Change password (all sessions rotated)

use axum::{
    extract::{ConnectInfo, FromRequestParts, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use crate::api::common::{clear_session_cookie, session_cookie};
use crate::api::middleware::{extract_session_token, AppState, AuthenticatedUser};
use crate::api::responses::ApiError;
use crate::models::{UpdateProfileInput, User};
use crate::services::{LoginInput, RegisterInput, UserServiceError};

/// User as returned to clients, with the derived level
#[derive(Debug, Serialize)]
pub struct UserResponse {
    #[serde(flatten)]
    pub user: User,
    pub level: i64,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            level: user.level(),
            user,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Client address from proxy headers, falling back to the socket peer
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = forwarded_ip(&parts.headers);
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());
        Ok(ClientIp(forwarded.or(peer)))
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|h| h.to_str().ok()))
        .and_then(|s| s.trim().parse().ok())
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/profile", put(update_profile))
        .route("/password", put(change_password))
}

/// Reject the login early when the IP or the email is over its limit
pub(crate) async fn enforce_login_limits(
    state: &AppState,
    ip: ClientIp,
    email: &str,
) -> Result<(), ApiError> {
    if let ClientIp(Some(ip)) = ip {
        if state.rate_limiter.is_ip_limited(ip).await {
            tracing::warn!(%ip, "Login rate limit exceeded for IP");
            return Err(ApiError::rate_limited("Too many requests, try again later", 60));
        }
        state.rate_limiter.record_ip_request(ip).await;
    }

    if state.rate_limiter.is_email_limited(email).await {
        tracing::warn!(email, "Login rate limit exceeded for email");
        return Err(ApiError::rate_limited(
            "Too many failed attempts, try again in 15 minutes",
            900,
        ));
    }
    Ok(())
}

/// Count a failed login and hide which part of the credentials was wrong
pub(crate) async fn login_failed(state: &AppState, email: &str, err: UserServiceError) -> ApiError {
    match err {
        UserServiceError::AuthenticationError(_) => {
            state.rate_limiter.record_failed_attempt(email).await;
            ApiError::unauthorized("Invalid email or password")
        }
        other => other.into(),
    }
}

/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    let login_input = LoginInput::new(body.email.clone(), body.password.clone());
    let user = state.user_service.register(body).await?;
    tracing::info!(user_id = user.id, role = %user.role, "User registered");

    let (session, user) = state.user_service.login(login_input).await?;
    let headers = session_cookie(&state.session_config, &session.id)?;

    Ok((
        StatusCode::CREATED,
        headers,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(body): Json<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    enforce_login_limits(&state, ip, &body.email).await?;

    let email = body.email.clone();
    let (session, user) = match state.user_service.login(body).await {
        Ok(result) => result,
        Err(e) => return Err(login_failed(&state, &email, e).await),
    };
    state.rate_limiter.clear_email(&email).await;

    let headers = session_cookie(&state.session_config, &session.id)?;
    Ok((
        headers,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_session_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;
    state.user_service.logout(&token).await?;

    Ok((StatusCode::NO_CONTENT, clear_session_cookie()))
}

/// GET /api/v1/auth/me
async fn me(user: AuthenticatedUser) -> Json<UserResponse> {
    Json(user.0.into())
}

/// PUT /api/v1/auth/profile
async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdateProfileInput>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state.user_service.update_profile(user.0.id, body).await?;
    Ok(Json(updated.into()))
}

/// PUT /api/v1/auth/password
async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .user_service
        .change_password(user.0.id, &body.current_password, &body.new_password)
        .await?;
    tracing::info!(user_id = user.0.id, "Password changed, sessions rotated");

    let headers = session_cookie(&state.session_config, &session.id)?;
    Ok((headers, Json(serde_json::json!({ "token": session.id }))))
}
