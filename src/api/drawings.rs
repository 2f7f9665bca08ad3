//! Excalidraw drawings, owner only
//!
//! - GET|POST /api/v1/drawings
//! - GET|PUT|DELETE /api/v1/drawings/{id}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::api::responses::ApiError;
use crate::models::{Drawing, DrawingSummary, SaveDrawingInput, UpdateDrawingInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_drawings).post(create_drawing))
        .route(
            "/{id}",
            get(get_drawing).put(update_drawing).delete(delete_drawing),
        )
}

async fn list_drawings(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<DrawingSummary>>, ApiError> {
    Ok(Json(state.drawing_service.list(&user).await?))
}

async fn create_drawing(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<SaveDrawingInput>,
) -> Result<(StatusCode, Json<Drawing>), ApiError> {
    let drawing = state.drawing_service.create(&user, body).await?;
    Ok((StatusCode::CREATED, Json(drawing)))
}

async fn get_drawing(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Drawing>, ApiError> {
    Ok(Json(state.drawing_service.get(&user, id).await?))
}

async fn update_drawing(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateDrawingInput>,
) -> Result<Json<Drawing>, ApiError> {
    Ok(Json(state.drawing_service.update(&user, id, body).await?))
}

async fn delete_drawing(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.drawing_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
