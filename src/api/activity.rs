//! Activity feed
//!
//! - GET /api/v1/activity?limit= - Recent XP events of the current user
//! - GET /api/v1/activity/streak - Streak summary

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use crate::api::common::LimitQuery;
use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::api::responses::ApiError;
use crate::models::{ActivityLog, StreakInfo};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/activity", get(recent))
        .route("/activity/streak", get(streak))
}

async fn recent(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<ActivityLog>>, ApiError> {
    Ok(Json(state.activity_service.recent(user.id, query.limit).await?))
}

async fn streak(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<StreakInfo>, ApiError> {
    Ok(Json(state.activity_service.streak_info(user.id).await?))
}
