//! Web Push subscriptions and the notification inbox
//!
//! - GET /api/v1/push/vapid-public-key - Application server key
//! - POST /api/v1/push/subscribe - Store a browser subscription
//! - POST /api/v1/push/unsubscribe - Remove a subscription by endpoint
//! - GET /api/v1/notifications?unread_only=&limit=
//! - GET /api/v1/notifications/unread-count
//! - POST /api/v1/notifications/{id}/read
//! - POST /api/v1/notifications/read-all
//! - POST /api/v1/admin/notifications/broadcast (ADMIN)
//! - POST /api/v1/admin/notifications/users/{id} (ADMIN)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::api::responses::ApiError;
use crate::models::{DeliveryReport, Notification, NotificationMessage, PushSubscription, SubscribeInput};

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}

#[derive(Debug, Serialize)]
pub struct VapidKeyResponse {
    pub public_key: String,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/push/vapid-public-key", get(vapid_public_key))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/push/subscribe", post(subscribe))
        .route("/push/unsubscribe", post(unsubscribe))
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/{id}/read", post(mark_read))
}

/// Nested under `/admin`
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/notifications/broadcast", post(broadcast))
        .route("/notifications/users/{id}", post(send_to_user))
}

async fn vapid_public_key(State(state): State<AppState>) -> Result<Json<VapidKeyResponse>, ApiError> {
    let key = state.push_service.vapid_public_key()?;
    Ok(Json(VapidKeyResponse {
        public_key: key.to_string(),
    }))
}

/// POST /api/v1/push/subscribe
async fn subscribe(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<SubscribeInput>,
) -> Result<(StatusCode, Json<PushSubscription>), ApiError> {
    let subscription = state.push_service.subscribe(&user, body).await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

async fn unsubscribe(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<UnsubscribeRequest>,
) -> Result<StatusCode, ApiError> {
    state.push_service.unsubscribe(&user, &body.endpoint).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_notifications(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let items = state
        .push_service
        .list_notifications(&user, query.unread_only, query.limit)
        .await?;
    Ok(Json(items))
}

async fn unread_count(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let unread = state.push_service.unread_count(&user).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

async fn mark_read(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.push_service.mark_read(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn mark_all_read(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<MarkAllReadResponse>, ApiError> {
    let updated = state.push_service.mark_all_read(&user).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

/// POST /api/v1/admin/notifications/broadcast
async fn broadcast(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<NotificationMessage>,
) -> Result<Json<DeliveryReport>, ApiError> {
    Ok(Json(state.push_service.broadcast(&user, &body).await?))
}

async fn send_to_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(body): Json<NotificationMessage>,
) -> Result<Json<DeliveryReport>, ApiError> {
    Ok(Json(state.push_service.send_to_user(user_id, &body).await?))
}
