//! Course API endpoints
//!
//! - GET /api/v1/courses - Published catalogue
//! - GET /api/v1/courses/{id} - Course with modules (drafts for author/admin)
//! - GET /api/v1/courses/mine - Courses authored by the caller
//! - GET /api/v1/courses/enrolled - Courses the caller joined
//! - POST /api/v1/courses - Create (GURU/ADMIN)
//! - PUT /api/v1/courses/{id} - Update
//! - DELETE /api/v1/courses/{id} - Delete
//! - POST /api/v1/courses/{id}/join - Enroll
//! - GET /api/v1/courses/{id}/progress - Completed/total modules
//! - POST /api/v1/courses/{id}/modules - Append a module
//! - PUT /api/v1/courses/{id}/modules/order - Reorder modules
//! - PUT /api/v1/modules/{id} - Update a module
//! - DELETE /api/v1/modules/{id} - Delete a module
//! - POST /api/v1/modules/{id}/complete - Mark a module completed

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::PaginationQuery;
use crate::api::middleware::{AppState, AuthenticatedUser, MaybeUser};
use crate::api::responses::ApiError;
use crate::models::{
    Course, CourseDetail, CourseProgress, CourseSummary, CreateCourseInput, CreateModuleInput,
    Module, PagedResult, UpdateCourseInput, UpdateModuleInput,
};

#[derive(Debug, Deserialize)]
pub struct ReorderModulesRequest {
    pub module_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    /// False when the caller was already enrolled
    pub joined: bool,
}

/// Catalogue and detail; the session is optional
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/courses", get(list_courses))
        .route("/courses/{id}", get(get_course))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/courses", post(create_course))
        .route("/courses/mine", get(my_courses))
        .route("/courses/enrolled", get(enrolled_courses))
        .route("/courses/{id}", put(update_course).delete(delete_course))
        .route("/courses/{id}/join", post(join_course))
        .route("/courses/{id}/progress", get(course_progress))
        .route("/courses/{id}/modules", post(add_module))
        .route("/courses/{id}/modules/order", put(reorder_modules))
        .route("/modules/{id}", put(update_module).delete(delete_module))
        .route("/modules/{id}/complete", post(complete_module))
}

/// GET /api/v1/courses
async fn list_courses(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PagedResult<CourseSummary>>, ApiError> {
    Ok(Json(state.course_service.list_public(&query.params()).await?))
}

/// GET /api/v1/courses/{id}
async fn get_course(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<CourseDetail>, ApiError> {
    Ok(Json(state.course_service.get_detail(user.as_ref(), id).await?))
}

async fn my_courses(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PagedResult<CourseSummary>>, ApiError> {
    Ok(Json(state.course_service.list_authored(&user, &query.params()).await?))
}

async fn enrolled_courses(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<CourseSummary>>, ApiError> {
    Ok(Json(state.course_service.list_enrolled(&user).await?))
}

/// POST /api/v1/courses
async fn create_course(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateCourseInput>,
) -> Result<(StatusCode, Json<Course>), ApiError> {
    let course = state.course_service.create(&user, body).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn update_course(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCourseInput>,
) -> Result<Json<Course>, ApiError> {
    Ok(Json(state.course_service.update(&user, id, body).await?))
}

async fn delete_course(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.course_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn join_course(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<JoinResponse>, ApiError> {
    let joined = state.course_service.join(&user, id).await?;
    Ok(Json(JoinResponse { joined }))
}

async fn course_progress(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<CourseProgress>, ApiError> {
    Ok(Json(state.course_service.progress(&user, id).await?))
}

async fn add_module(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(course_id): Path<i64>,
    Json(body): Json<CreateModuleInput>,
) -> Result<(StatusCode, Json<Module>), ApiError> {
    let module = state.course_service.add_module(&user, course_id, body).await?;
    Ok((StatusCode::CREATED, Json(module)))
}

async fn reorder_modules(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(course_id): Path<i64>,
    Json(body): Json<ReorderModulesRequest>,
) -> Result<Json<Vec<Module>>, ApiError> {
    let modules = state
        .course_service
        .reorder_modules(&user, course_id, &body.module_ids)
        .await?;
    Ok(Json(modules))
}

async fn update_module(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateModuleInput>,
) -> Result<Json<Module>, ApiError> {
    Ok(Json(state.course_service.update_module(&user, id, body).await?))
}

async fn delete_module(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.course_service.delete_module(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/modules/{id}/complete
async fn complete_module(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<CourseProgress>, ApiError> {
    Ok(Json(state.course_service.complete_module(&user, id).await?))
}
