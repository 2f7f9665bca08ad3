//! Question bank and tryout endpoints
//!
//! Question banks (GURU/ADMIN):
//! - GET|POST /api/v1/question-banks
//! - GET|PUT|DELETE /api/v1/question-banks/{id}
//! - POST /api/v1/question-banks/{id}/questions
//! - PUT|DELETE /api/v1/questions/{id}
//!
//! Tryouts:
//! - GET /api/v1/tryouts, POST /api/v1/tryouts (GURU/ADMIN)
//! - GET|PUT|DELETE /api/v1/tryouts/{id}
//! - POST /api/v1/tryouts/{id}/attempts - Start or resume an attempt
//! - GET /api/v1/tryouts/{id}/attempts - Caller's attempts
//! - GET /api/v1/tryouts/{id}/leaderboard?limit=
//! - POST /api/v1/attempts/{id}/submit
//! - GET /api/v1/attempts/{id}/results

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use crate::api::common::LimitQuery;
use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::api::responses::ApiError;
use crate::models::tryout::{CreateCollectionInput, UpdateCollectionInput};
use crate::models::{
    AttemptResult, AttemptSheet, Question, QuestionBank, QuestionCollection, QuestionInput,
    SubmitAnswersInput, Tryout, TryoutAttempt, TryoutInput, TryoutLeaderboardEntry,
};

/// Question bank authoring, mounted behind the teacher guard
pub fn teacher_router() -> Router<AppState> {
    Router::new()
        .route("/question-banks", get(list_banks).post(create_bank))
        .route(
            "/question-banks/{id}",
            get(get_bank).put(update_bank).delete(delete_bank),
        )
        .route("/question-banks/{id}/questions", post(add_question))
        .route("/questions/{id}", put(replace_question).delete(delete_question))
        .route("/tryouts", post(create_tryout))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tryouts", get(list_tryouts))
        .route(
            "/tryouts/{id}",
            get(get_tryout).put(update_tryout).delete(delete_tryout),
        )
        .route("/tryouts/{id}/attempts", post(start_attempt).get(my_attempts))
        .route("/tryouts/{id}/leaderboard", get(leaderboard))
        .route("/attempts/{id}/submit", post(submit_attempt))
        .route("/attempts/{id}/results", get(attempt_results))
}

// ============================================================================
// Question banks
// ============================================================================

async fn list_banks(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<QuestionCollection>>, ApiError> {
    Ok(Json(state.tryout_service.list_collections(&user).await?))
}

async fn create_bank(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateCollectionInput>,
) -> Result<(StatusCode, Json<QuestionCollection>), ApiError> {
    let bank = state.tryout_service.create_collection(&user, body).await?;
    Ok((StatusCode::CREATED, Json(bank)))
}

async fn get_bank(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<QuestionBank>, ApiError> {
    Ok(Json(state.tryout_service.get_collection(&user, id).await?))
}

async fn update_bank(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCollectionInput>,
) -> Result<Json<QuestionCollection>, ApiError> {
    Ok(Json(state.tryout_service.update_collection(&user, id, body).await?))
}

async fn delete_bank(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.tryout_service.delete_collection(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_question(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(bank_id): Path<i64>,
    Json(body): Json<QuestionInput>,
) -> Result<(StatusCode, Json<Question>), ApiError> {
    let question = state.tryout_service.add_question(&user, bank_id, body).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

async fn replace_question(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<QuestionInput>,
) -> Result<Json<Question>, ApiError> {
    Ok(Json(state.tryout_service.replace_question(&user, id, body).await?))
}

async fn delete_question(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.tryout_service.delete_question(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Tryouts
// ============================================================================

async fn create_tryout(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<TryoutInput>,
) -> Result<(StatusCode, Json<Tryout>), ApiError> {
    let tryout = state.tryout_service.create_tryout(&user, body).await?;
    Ok((StatusCode::CREATED, Json(tryout)))
}

async fn list_tryouts(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<Tryout>>, ApiError> {
    Ok(Json(state.tryout_service.list_tryouts(&user).await?))
}

async fn get_tryout(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Tryout>, ApiError> {
    Ok(Json(state.tryout_service.get_tryout(&user, id).await?))
}

async fn update_tryout(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<TryoutInput>,
) -> Result<Json<Tryout>, ApiError> {
    Ok(Json(state.tryout_service.update_tryout(&user, id, body).await?))
}

async fn delete_tryout(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.tryout_service.delete_tryout(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/tryouts/{id}/attempts
async fn start_attempt(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<AttemptSheet>, ApiError> {
    Ok(Json(state.tryout_service.start_attempt(&user, id).await?))
}

async fn my_attempts(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<TryoutAttempt>>, ApiError> {
    Ok(Json(state.tryout_service.my_attempts(&user, id).await?))
}

async fn leaderboard(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<TryoutLeaderboardEntry>>, ApiError> {
    Ok(Json(state.tryout_service.leaderboard(id, query.limit).await?))
}

/// POST /api/v1/attempts/{id}/submit
async fn submit_attempt(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<SubmitAnswersInput>,
) -> Result<Json<AttemptResult>, ApiError> {
    Ok(Json(state.tryout_service.submit(&user, id, body).await?))
}

async fn attempt_results(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<AttemptResult>, ApiError> {
    Ok(Json(state.tryout_service.results(&user, id).await?))
}
