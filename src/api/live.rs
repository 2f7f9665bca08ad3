//! Video room and live session endpoints
//!
//! Rooms:
//! - GET /api/v1/rooms - Rooms visible to the caller
//! - POST /api/v1/rooms - Create (GURU/ADMIN)
//! - GET|DELETE /api/v1/rooms/{id}
//! - POST /api/v1/rooms/{id}/join, POST /api/v1/rooms/{id}/leave
//! - POST /api/v1/rooms/{id}/token - Video access token
//!
//! Live sessions:
//! - GET /api/v1/live-sessions - Upcoming sessions of the caller's courses
//! - POST /api/v1/live-sessions - Schedule (GURU/ADMIN, course author)
//! - GET /api/v1/courses/{id}/live-sessions
//! - GET|DELETE /api/v1/live-sessions/{id}
//! - POST /api/v1/live-sessions/{id}/register|start|end|token

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::api::responses::ApiError;
use crate::models::{
    CreateLiveSessionInput, CreateRoomInput, JoinToken, LiveSession, LiveSessionDetail, Room,
    RoomDetail,
};

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub joined: bool,
}

/// Creation routes, mounted behind the teacher guard
pub fn teacher_router() -> Router<AppState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/live-sessions", post(create_session))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/rooms/{id}", get(get_room).delete(delete_room))
        .route("/rooms/{id}/join", post(join_room))
        .route("/rooms/{id}/leave", post(leave_room))
        .route("/rooms/{id}/token", post(room_token))
        .route("/live-sessions", get(list_upcoming))
        .route("/courses/{id}/live-sessions", get(list_for_course))
        .route("/live-sessions/{id}", get(get_session).delete(delete_session))
        .route("/live-sessions/{id}/register", post(register))
        .route("/live-sessions/{id}/start", post(start_session))
        .route("/live-sessions/{id}/end", post(end_session))
        .route("/live-sessions/{id}/token", post(session_token))
}

// ============================================================================
// Rooms
// ============================================================================

async fn create_room(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateRoomInput>,
) -> Result<(StatusCode, Json<Room>), ApiError> {
    let room = state.live_service.create_room(&user, body).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

async fn list_rooms(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<Room>>, ApiError> {
    Ok(Json(state.live_service.list_rooms(&user).await?))
}

async fn get_room(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<RoomDetail>, ApiError> {
    Ok(Json(state.live_service.get_room(id).await?))
}

async fn join_room(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<JoinResponse>, ApiError> {
    let joined = state.live_service.join_room(&user, id).await?;
    Ok(Json(JoinResponse { joined }))
}

async fn leave_room(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.live_service.leave_room(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/rooms/{id}/token
async fn room_token(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<JoinToken>, ApiError> {
    Ok(Json(state.live_service.room_token(&user, id).await?))
}

async fn delete_room(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.live_service.delete_room(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Live sessions
// ============================================================================

async fn create_session(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateLiveSessionInput>,
) -> Result<(StatusCode, Json<LiveSession>), ApiError> {
    let session = state.live_service.create_session(&user, body).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn list_upcoming(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<LiveSession>>, ApiError> {
    Ok(Json(state.live_service.list_upcoming(&user).await?))
}

async fn list_for_course(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(course_id): Path<i64>,
) -> Result<Json<Vec<LiveSession>>, ApiError> {
    state.course_service.visible_course(Some(&user), course_id).await?;
    Ok(Json(state.live_service.list_for_course(course_id).await?))
}

async fn get_session(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<LiveSessionDetail>, ApiError> {
    Ok(Json(state.live_service.get_session(id).await?))
}

async fn register(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<JoinResponse>, ApiError> {
    let joined = state.live_service.register(&user, id).await?;
    Ok(Json(JoinResponse { joined }))
}

async fn start_session(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<LiveSession>, ApiError> {
    Ok(Json(state.live_service.start(&user, id).await?))
}

async fn end_session(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<LiveSession>, ApiError> {
    Ok(Json(state.live_service.end(&user, id).await?))
}

/// POST /api/v1/live-sessions/{id}/token
async fn session_token(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<JoinToken>, ApiError> {
    Ok(Json(state.live_service.session_token(&user, id).await?))
}

async fn delete_session(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.live_service.delete_session(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
