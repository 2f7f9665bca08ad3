//! Vocabulary API endpoints
//!
//! - GET /api/v1/vocabulary/collections - Caller's collections
//! - GET /api/v1/vocabulary/collections/public - Public collections
//! - POST /api/v1/vocabulary/collections - Create a collection
//! - GET|PUT|DELETE /api/v1/vocabulary/collections/{id}
//! - POST /api/v1/vocabulary/collections/{id}/items - Add an item
//! - PUT|DELETE /api/v1/vocabulary/items/{id}
//! - POST /api/v1/vocabulary/items/{id}/toggle - Flip `is_checked`
//! - GET /api/v1/vocabulary/search?q=&limit=

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::api::responses::ApiError;
use crate::models::vocabulary::{
    CreateCollectionInput, CreateItemInput, UpdateCollectionInput, UpdateItemInput,
};
use crate::models::{CollectionDetail, CollectionSummary, VocabularyCollection, VocabularyItem};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_search_limit")]
    pub limit: i64,
}

fn default_search_limit() -> i64 {
    20
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/collections", get(list_mine).post(create_collection))
        .route("/collections/public", get(list_public))
        .route(
            "/collections/{id}",
            get(get_collection).put(update_collection).delete(delete_collection),
        )
        .route("/collections/{id}/items", post(add_item))
        .route("/items/{id}", put(update_item).delete(delete_item))
        .route("/items/{id}/toggle", post(toggle_item))
        .route("/search", get(search))
}

async fn list_mine(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<CollectionSummary>>, ApiError> {
    Ok(Json(state.vocabulary_service.list_mine(&user).await?))
}

async fn list_public(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<CollectionSummary>>, ApiError> {
    Ok(Json(state.vocabulary_service.list_public().await?))
}

async fn create_collection(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateCollectionInput>,
) -> Result<(StatusCode, Json<VocabularyCollection>), ApiError> {
    let collection = state.vocabulary_service.create_collection(&user, body).await?;
    Ok((StatusCode::CREATED, Json(collection)))
}

async fn get_collection(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<CollectionDetail>, ApiError> {
    Ok(Json(state.vocabulary_service.get_collection(&user, id).await?))
}

async fn update_collection(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCollectionInput>,
) -> Result<Json<VocabularyCollection>, ApiError> {
    Ok(Json(state.vocabulary_service.update_collection(&user, id, body).await?))
}

async fn delete_collection(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.vocabulary_service.delete_collection(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_item(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(collection_id): Path<i64>,
    Json(body): Json<CreateItemInput>,
) -> Result<(StatusCode, Json<VocabularyItem>), ApiError> {
    let item = state.vocabulary_service.add_item(&user, collection_id, body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_item(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateItemInput>,
) -> Result<Json<VocabularyItem>, ApiError> {
    Ok(Json(state.vocabulary_service.update_item(&user, id, body).await?))
}

async fn delete_item(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.vocabulary_service.delete_item(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_item(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<VocabularyItem>, ApiError> {
    Ok(Json(state.vocabulary_service.toggle_checked(&user, id).await?))
}

/// GET /api/v1/vocabulary/search
async fn search(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<VocabularyItem>>, ApiError> {
    Ok(Json(state.vocabulary_service.search(&user, &query.q, query.limit).await?))
}
