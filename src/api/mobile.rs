//! Mobile app API (bearer JWT)
//!
//! - POST /api/v1/mobile/auth/login - Issue a token
//! - GET /api/v1/mobile/me - Current user
//! - GET /api/v1/mobile/leaderboard?limit= - Top users by XP
//! - GET /api/v1/mobile/streak - Streak summary
//! - POST /api/v1/mobile/streak/checkin - Daily check-in

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::auth::{enforce_login_limits, login_failed, ClientIp, UserResponse};
use crate::api::common::LimitQuery;
use crate::api::middleware::{AppState, MobileUser};
use crate::api::responses::ApiError;
use crate::models::{ActivityOutcome, ActivityType, LeaderboardEntry, StreakInfo};
use crate::services::LoginInput;

#[derive(Debug, Serialize)]
pub struct MobileLoginResponse {
    pub token: String,
    pub user: UserResponse,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/me", get(me))
        .route("/leaderboard", get(leaderboard))
        .route("/streak", get(streak))
        .route("/streak/checkin", post(checkin))
}

/// POST /api/v1/mobile/auth/login
async fn login(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(body): Json<LoginInput>,
) -> Result<Json<MobileLoginResponse>, ApiError> {
    enforce_login_limits(&state, ip, &body.email).await?;

    let user = match state.user_service.authenticate(&body).await {
        Ok(user) => user,
        Err(e) => return Err(login_failed(&state, &body.email, e).await),
    };
    state.rate_limiter.clear_email(&body.email).await;
    state.user_service.record_login(user.id).await;

    let token = state.mobile_tokens.issue(&user)?;
    tracing::info!(user_id = user.id, "Mobile token issued");

    Ok(Json(MobileLoginResponse {
        token,
        user: user.into(),
    }))
}

/// GET /api/v1/mobile/me
async fn me(MobileUser(user): MobileUser) -> Json<UserResponse> {
    Json(user.into())
}

/// GET /api/v1/mobile/leaderboard
async fn leaderboard(
    State(state): State<AppState>,
    _user: MobileUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    Ok(Json(state.user_service.leaderboard(query.limit).await?))
}

/// GET /api/v1/mobile/streak
async fn streak(
    State(state): State<AppState>,
    MobileUser(user): MobileUser,
) -> Result<Json<StreakInfo>, ApiError> {
    Ok(Json(state.activity_service.streak_info(user.id).await?))
}

/// POST /api/v1/mobile/streak/checkin
async fn checkin(
    State(state): State<AppState>,
    MobileUser(user): MobileUser,
) -> Result<Json<ActivityOutcome>, ApiError> {
    let outcome = state
        .activity_service
        .record_fixed(user.id, ActivityType::Login, None, Some("Daily check-in".to_string()))
        .await?;
    Ok(Json(outcome))
}
