//! Admin API endpoints
//!
//! - GET /api/v1/admin/users?page=&per_page=&role= - Paginated users
//! - PUT /api/v1/admin/users/{id} - Change role or plan
//! - DELETE /api/v1/admin/users/{id} - Delete one user
//! - POST /api/v1/admin/users/bulk-delete - Delete from chat, then locally
//! - GET /api/v1/admin/stats - Dashboard statistics

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::auth::UserResponse;
use crate::api::middleware::{AppState, AuthenticatedUser, RequestStatsSnapshot};
use crate::api::responses::ApiError;
use crate::models::{AdminUpdateUserInput, ListParams, PagedResult, UserRole};
use crate::services::PlatformStats;

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub role: Option<UserRole>,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub user_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    pub deleted: u64,
}

/// Response for dashboard stats
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub platform: PlatformStats,
    pub requests: RequestStatsSnapshot,
}

/// Build the admin router (mounted behind auth and admin middleware)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/bulk-delete", post(bulk_delete))
        .route("/users/{id}", put(update_user).delete(delete_user))
        .route("/stats", get(stats))
}

/// GET /api/v1/admin/users
async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<PagedResult<UserResponse>>, ApiError> {
    let params = ListParams::new(query.page, query.per_page);
    let page = state.admin_service.list_users(&params, query.role).await?;
    Ok(Json(page.map(UserResponse::from)))
}

/// PUT /api/v1/admin/users/{id}
async fn update_user(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<AdminUpdateUserInput>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.admin_service.update_user(&admin, id, body).await?;
    Ok(Json(user.into()))
}

/// DELETE /api/v1/admin/users/{id}
async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.admin_service.delete_user(&admin, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/admin/users/bulk-delete
async fn bulk_delete(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Json(body): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteResponse>, ApiError> {
    let deleted = state.admin_service.bulk_delete(&admin, &body.user_ids).await?;
    Ok(Json(BulkDeleteResponse { deleted }))
}

/// GET /api/v1/admin/stats
async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let platform = state.admin_service.stats().await?;
    Ok(Json(StatsResponse {
        platform,
        requests: state.request_stats.snapshot(),
    }))
}
