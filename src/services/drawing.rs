//! Whiteboard drawings, private to their owner

use crate::db::repositories::DrawingRepository;
use crate::models::{Drawing, DrawingSummary, SaveDrawingInput, UpdateDrawingInput, User};
use crate::services::error::{ServiceError, ServiceResult};
use chrono::Utc;
use std::sync::Arc;

pub struct DrawingService {
    repo: Arc<dyn DrawingRepository>,
}

impl DrawingService {
    pub fn new(repo: Arc<dyn DrawingRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self, actor: &User) -> ServiceResult<Vec<DrawingSummary>> {
        Ok(self.repo.list_by_user(actor.id).await?)
    }

    pub async fn create(&self, actor: &User, input: SaveDrawingInput) -> ServiceResult<Drawing> {
        let name = drawing_name(&input.name)?;
        validate_scene(&input.elements, &input.app_state, &input.files)?;

        let now = Utc::now();
        let drawing = self
            .repo
            .create(&Drawing {
                id: 0,
                user_id: actor.id,
                name,
                elements: input.elements,
                app_state: input.app_state,
                files: input.files,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::debug!(drawing_id = drawing.id, user_id = actor.id, "Drawing created");
        Ok(drawing)
    }

    pub async fn get(&self, actor: &User, id: i64) -> ServiceResult<Drawing> {
        self.owned(actor, id).await
    }

    pub async fn update(&self, actor: &User, id: i64, input: UpdateDrawingInput) -> ServiceResult<Drawing> {
        let mut drawing = self.owned(actor, id).await?;

        if let Some(name) = input.name {
            drawing.name = drawing_name(&name)?;
        }
        if let Some(elements) = input.elements {
            drawing.elements = elements;
        }
        if let Some(app_state) = input.app_state {
            drawing.app_state = app_state;
        }
        if let Some(files) = input.files {
            drawing.files = files;
        }
        validate_scene(&drawing.elements, &drawing.app_state, &drawing.files)?;
        drawing.updated_at = Utc::now();

        Ok(self.repo.update(&drawing).await?)
    }

    pub async fn delete(&self, actor: &User, id: i64) -> ServiceResult<()> {
        self.owned(actor, id).await?;
        self.repo.delete(id).await?;
        Ok(())
    }

    /// Drawings are never shared, not even with admins
    async fn owned(&self, actor: &User, id: i64) -> ServiceResult<Drawing> {
        let drawing = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Drawing"))?;
        if drawing.user_id != actor.id {
            return Err(ServiceError::NotFound("Drawing"));
        }
        Ok(drawing)
    }
}

fn drawing_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::validation("Drawing name cannot be empty"));
    }
    Ok(name.to_string())
}

fn validate_scene(
    elements: &serde_json::Value,
    app_state: &serde_json::Value,
    files: &serde_json::Value,
) -> ServiceResult<()> {
    if !elements.is_array() {
        return Err(ServiceError::validation("elements must be an array"));
    }
    if !app_state.is_object() || !files.is_object() {
        return Err(ServiceError::validation("appState and files must be objects"));
    }
    Ok(())
}
