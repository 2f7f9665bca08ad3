//! Excalidraw drawing repository
//!
//! Scene JSON is stored as TEXT and parsed on read.

use crate::db::DbPool;
use crate::models::{Drawing, DrawingSummary};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait DrawingRepository: Send + Sync {
    async fn create(&self, drawing: &Drawing) -> Result<Drawing>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Drawing>>;

    async fn update(&self, drawing: &Drawing) -> Result<Drawing>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// The user's drawings, most recently edited first
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<DrawingSummary>>;
}

pub struct SqlxDrawingRepository {
    pool: DbPool,
}

impl SqlxDrawingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn DrawingRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl DrawingRepository for SqlxDrawingRepository {
    async fn create(&self, drawing: &Drawing) -> Result<Drawing> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO excalidraw_drawings (user_id, name, elements, app_state, files, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(drawing.user_id)
        .bind(&drawing.name)
        .bind(drawing.elements.to_string())
        .bind(drawing.app_state.to_string())
        .bind(drawing.files.to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create drawing")?;

        Ok(Drawing {
            id: result.last_insert_rowid(),
            created_at: now,
            updated_at: now,
            ..drawing.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Drawing>> {
        let row = sqlx::query(
            "SELECT id, user_id, name, elements, app_state, files, created_at, updated_at \
             FROM excalidraw_drawings WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get drawing")?;

        row.as_ref().map(row_to_drawing).transpose()
    }

    async fn update(&self, drawing: &Drawing) -> Result<Drawing> {
        let now = Utc::now();

        sqlx::query(
            "UPDATE excalidraw_drawings SET name = ?, elements = ?, app_state = ?, files = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&drawing.name)
        .bind(drawing.elements.to_string())
        .bind(drawing.app_state.to_string())
        .bind(drawing.files.to_string())
        .bind(now)
        .bind(drawing.id)
        .execute(&self.pool)
        .await
        .context("Failed to update drawing")?;

        Ok(Drawing {
            updated_at: now,
            ..drawing.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM excalidraw_drawings WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete drawing")?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<DrawingSummary>> {
        let rows = sqlx::query(
            "SELECT id, name, updated_at FROM excalidraw_drawings WHERE user_id = ? ORDER BY updated_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list drawings")?;

        Ok(rows
            .iter()
            .map(|row| DrawingSummary {
                id: row.get("id"),
                name: row.get("name"),
                updated_at: row.get("updated_at"),
            })
            .collect())
    }
}

fn row_to_drawing(row: &sqlx::sqlite::SqliteRow) -> Result<Drawing> {
    let elements: String = row.get("elements");
    let app_state: String = row.get("app_state");
    let files: String = row.get("files");

    Ok(Drawing {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        elements: serde_json::from_str(&elements).context("Corrupt drawing elements")?,
        app_state: serde_json::from_str(&app_state).context("Corrupt drawing app state")?,
        files: serde_json::from_str(&files).context("Corrupt drawing files")?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::{insert_user, setup_pool};
    use crate::models::UserRole;
    use serde_json::json;

    fn drawing(user_id: i64, name: &str) -> Drawing {
        let now = Utc::now();
        Drawing {
            id: 0,
            user_id,
            name: name.to_string(),
            elements: json!([{"type": "text", "text": "한글"}]),
            app_state: json!({"viewBackgroundColor": "#fff"}),
            files: json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_scene_json_survives_storage() {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "Dewi", UserRole::Murid).await;
        let repo = SqlxDrawingRepository::new(pool);

        let created = repo.create(&drawing(user, "Latihan")).await.unwrap();
        let loaded = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(loaded.elements[0]["text"], "한글");
        assert_eq!(loaded.app_state["viewBackgroundColor"], "#fff");
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "Dewi", UserRole::Murid).await;
        let repo = SqlxDrawingRepository::new(pool);
        let a = repo.create(&drawing(user, "A")).await.unwrap();
        repo.create(&drawing(user, "B")).await.unwrap();

        assert_eq!(repo.list_by_user(user).await.unwrap().len(), 2);
        assert!(repo.delete(a.id).await.unwrap());
        assert_eq!(repo.list_by_user(user).await.unwrap().len(), 1);
    }
}
