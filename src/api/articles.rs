//! Article API endpoints
//!
//! - GET /api/v1/articles - Published articles, paginated
//! - GET /api/v1/articles/{slug} - Read an article (awards XP when logged in)
//! - GET /api/v1/articles/mine - Articles written by the caller
//! - POST /api/v1/articles - Create article (GURU/ADMIN)
//! - PUT /api/v1/articles/{id} - Update article (author/ADMIN)
//! - DELETE /api/v1/articles/{id} - Delete article (author/ADMIN)
//!
//! The slug and the id share one path segment, so every route is declared
//! with `{id}` and the read handler takes it as a string.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use crate::api::common::PaginationQuery;
use crate::api::middleware::{AppState, AuthenticatedUser, MaybeUser};
use crate::api::responses::ApiError;
use crate::models::{Article, ArticleWithAuthor, CreateArticleInput, PagedResult, UpdateArticleInput};

/// Build public article routes (session optional)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/articles", get(list_articles))
        .route("/articles/{id}", get(get_article))
}

/// Build protected article routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/articles", post(create_article))
        .route("/articles/mine", get(my_articles))
        .route("/articles/{id}", put(update_article).delete(delete_article))
}

/// GET /api/v1/articles
async fn list_articles(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PagedResult<ArticleWithAuthor>>, ApiError> {
    Ok(Json(state.article_service.list_published(&query.params()).await?))
}

/// GET /api/v1/articles/{slug}
async fn get_article(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(slug): Path<String>,
) -> Result<Json<ArticleWithAuthor>, ApiError> {
    Ok(Json(state.article_service.read(&slug, user.as_ref()).await?))
}

/// GET /api/v1/articles/mine
async fn my_articles(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PagedResult<ArticleWithAuthor>>, ApiError> {
    Ok(Json(state.article_service.list_authored(&user, &query.params()).await?))
}

/// POST /api/v1/articles
async fn create_article(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateArticleInput>,
) -> Result<(StatusCode, Json<Article>), ApiError> {
    let article = state.article_service.create(&user, body).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

/// PUT /api/v1/articles/{id}
async fn update_article(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateArticleInput>,
) -> Result<Json<Article>, ApiError> {
    Ok(Json(state.article_service.update(&user, id, body).await?))
}

/// DELETE /api/v1/articles/{id}
async fn delete_article(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.article_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
