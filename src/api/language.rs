//! Language tools backed by external services
//!
//! - POST /api/v1/translate - Streamed translation, `text/plain`
//! - GET /api/v1/dictionary?q= - KRDict search, upstream XML
//! - POST /api/v1/chat/token - Chat user token for the caller

use axum::{
    body::Body,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::api::responses::ApiError;
use crate::services::ServiceError;

const MAX_TRANSLATE_CHARS: usize = 5000;

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    pub text: String,
    /// Language code of the output, Indonesian by default
    #[serde(default = "default_target")]
    pub target: String,
}

fn default_target() -> String {
    "id".to_string()
}

#[derive(Debug, Deserialize)]
pub struct DictionaryQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct ChatTokenResponse {
    pub user_id: String,
    pub token: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/translate", post(translate))
        .route("/dictionary", get(dictionary))
        .route("/chat/token", post(chat_token))
}

/// POST /api/v1/translate
async fn translate(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<TranslateRequest>,
) -> Result<Response, ApiError> {
    let text = body.text.trim();
    if text.is_empty() {
        return Err(ApiError::validation_error("Text cannot be empty"));
    }
    if text.chars().count() > MAX_TRANSLATE_CHARS {
        return Err(ApiError::validation_error(format!(
            "Text cannot exceed {} characters",
            MAX_TRANSLATE_CHARS
        )));
    }

    let stream = state
        .translator
        .translate(text, &body.target)
        .await
        .map_err(ServiceError::from)?;
    tracing::debug!(user_id = user.id, target = %body.target, "Translation started");

    let stream = stream.inspect_err(|e| tracing::warn!("Translation stream failed: {}", e));
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response())
}

/// GET /api/v1/dictionary
async fn dictionary(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<DictionaryQuery>,
) -> Result<Response, ApiError> {
    let xml = state.dictionary_service.search(&query.q).await?;
    Ok(([(header::CONTENT_TYPE, "application/xml; charset=utf-8")], xml).into_response())
}

/// POST /api/v1/chat/token
async fn chat_token(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<ChatTokenResponse>, ApiError> {
    let user_id = user.id.to_string();
    let token = state.chat.user_token(&user_id).map_err(ServiceError::from)?;
    Ok(Json(ChatTokenResponse { user_id, token }))
}
