//! Upload API endpoints
//!
//! - POST /api/v1/upload/image - Course thumbnails, article images, avatars
//! - POST /api/v1/upload/audio - Pronunciation clips for vocabulary items
//!
//! Both accept multipart/form-data with a single file field named "file".

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};

use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::api::responses::ApiError;
use crate::config::UploadKind;
use crate::services::StoredFile;

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the upload router; `max_file_size` is the largest allowed file
pub fn router(max_file_size: usize) -> Router<AppState> {
    Router::new()
        .route("/image", post(upload_image))
        .route("/audio", post(upload_audio))
        .layer(DefaultBodyLimit::max(max_file_size + MULTIPART_OVERHEAD))
}

/// POST /api/v1/upload/image
async fn upload_image(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> Result<Json<StoredFile>, ApiError> {
    upload(state, user, UploadKind::Image, multipart).await
}

/// POST /api/v1/upload/audio
async fn upload_audio(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> Result<Json<StoredFile>, ApiError> {
    upload(state, user, UploadKind::Audio, multipart).await
}

async fn upload(
    state: AppState,
    AuthenticatedUser(user): AuthenticatedUser,
    kind: UploadKind,
    mut multipart: Multipart,
) -> Result<Json<StoredFile>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;

        let stored = state.upload_service.store(kind, &content_type, &data).await?;
        tracing::info!(
            user_id = user.id,
            kind = kind.dir_name(),
            file = %stored.filename,
            size = stored.size,
            "File uploaded"
        );
        return Ok(Json(stored));
    }

    Err(ApiError::validation_error("No file provided"))
}
