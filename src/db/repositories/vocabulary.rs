//! Vocabulary repository

use crate::db::DbPool;
use crate::models::{CollectionSummary, VocabularyCollection, VocabularyItem, VocabularyItemType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait VocabularyRepository: Send + Sync {
    async fn create_collection(&self, collection: &VocabularyCollection) -> Result<VocabularyCollection>;

    async fn get_collection(&self, id: i64) -> Result<Option<VocabularyCollection>>;

    async fn update_collection(&self, collection: &VocabularyCollection) -> Result<VocabularyCollection>;

    async fn delete_collection(&self, id: i64) -> Result<bool>;

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<CollectionSummary>>;

    /// Public collections from every user
    async fn list_public(&self) -> Result<Vec<CollectionSummary>>;

    async fn create_item(&self, item: &VocabularyItem) -> Result<VocabularyItem>;

    async fn get_item(&self, id: i64) -> Result<Option<VocabularyItem>>;

    async fn update_item(&self, item: &VocabularyItem) -> Result<VocabularyItem>;

    async fn delete_item(&self, id: i64) -> Result<bool>;

    async fn set_checked(&self, id: i64, checked: bool) -> Result<()>;

    async fn list_items(&self, collection_id: i64) -> Result<Vec<VocabularyItem>>;

    /// Case-insensitive search over a user's own items
    async fn search_items(&self, user_id: i64, query: &str, limit: i64) -> Result<Vec<VocabularyItem>>;
}

pub struct SqlxVocabularyRepository {
    pool: DbPool,
}

impl SqlxVocabularyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn VocabularyRepository> {
        Arc::new(Self::new(pool))
    }
}

const SUMMARY_SELECT: &str = r#"
    SELECT c.id, c.title, c.description, c.icon, c.is_public, c.user_id, c.created_at, c.updated_at,
           COUNT(i.id) as item_count,
           COALESCE(SUM(CASE WHEN i.is_checked THEN 1 ELSE 0 END), 0) as checked_count
    FROM vocabulary_collections c
    LEFT JOIN vocabulary_items i ON i.collection_id = c.id
"#;

const ITEM_COLUMNS: &str = "id, collection_id, korean, meaning, romanization, example_sentence, \
     example_translation, audio_url, item_type, is_checked, created_at, updated_at";

#[async_trait]
impl VocabularyRepository for SqlxVocabularyRepository {
    async fn create_collection(&self, collection: &VocabularyCollection) -> Result<VocabularyCollection> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO vocabulary_collections (title, description, icon, is_public, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&collection.title)
        .bind(&collection.description)
        .bind(&collection.icon)
        .bind(collection.is_public)
        .bind(collection.user_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create vocabulary collection")?;

        Ok(VocabularyCollection {
            id: result.last_insert_rowid(),
            created_at: now,
            updated_at: now,
            ..collection.clone()
        })
    }

    async fn get_collection(&self, id: i64) -> Result<Option<VocabularyCollection>> {
        let row = sqlx::query(
            "SELECT id, title, description, icon, is_public, user_id, created_at, updated_at \
             FROM vocabulary_collections WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get vocabulary collection")?;

        Ok(row.as_ref().map(row_to_collection))
    }

    async fn update_collection(&self, collection: &VocabularyCollection) -> Result<VocabularyCollection> {
        let now = Utc::now();

        sqlx::query(
            "UPDATE vocabulary_collections SET title = ?, description = ?, icon = ?, is_public = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&collection.title)
        .bind(&collection.description)
        .bind(&collection.icon)
        .bind(collection.is_public)
        .bind(now)
        .bind(collection.id)
        .execute(&self.pool)
        .await
        .context("Failed to update vocabulary collection")?;

        Ok(VocabularyCollection {
            updated_at: now,
            ..collection.clone()
        })
    }

    async fn delete_collection(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM vocabulary_collections WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete vocabulary collection")?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<CollectionSummary>> {
        let rows = sqlx::query(&format!(
            "{} WHERE c.user_id = ? GROUP BY c.id ORDER BY c.updated_at DESC",
            SUMMARY_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list vocabulary collections")?;

        Ok(rows.iter().map(row_to_summary).collect())
    }

    async fn list_public(&self) -> Result<Vec<CollectionSummary>> {
        let rows = sqlx::query(&format!(
            "{} WHERE c.is_public = 1 GROUP BY c.id ORDER BY c.updated_at DESC",
            SUMMARY_SELECT
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list public vocabulary collections")?;

        Ok(rows.iter().map(row_to_summary).collect())
    }

    async fn create_item(&self, item: &VocabularyItem) -> Result<VocabularyItem> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO vocabulary_items (collection_id, korean, meaning, romanization, example_sentence,
                                          example_translation, audio_url, item_type, is_checked, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(item.collection_id)
        .bind(&item.korean)
        .bind(&item.meaning)
        .bind(&item.romanization)
        .bind(&item.example_sentence)
        .bind(&item.example_translation)
        .bind(&item.audio_url)
        .bind(item.item_type.to_string())
        .bind(item.is_checked)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create vocabulary item")?;

        Ok(VocabularyItem {
            id: result.last_insert_rowid(),
            created_at: now,
            updated_at: now,
            ..item.clone()
        })
    }

    async fn get_item(&self, id: i64) -> Result<Option<VocabularyItem>> {
        let row = sqlx::query(&format!("SELECT {} FROM vocabulary_items WHERE id = ?", ITEM_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get vocabulary item")?;

        row.as_ref().map(row_to_item).transpose()
    }

    async fn update_item(&self, item: &VocabularyItem) -> Result<VocabularyItem> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE vocabulary_items
            SET korean = ?, meaning = ?, romanization = ?, example_sentence = ?, example_translation = ?,
                audio_url = ?, item_type = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&item.korean)
        .bind(&item.meaning)
        .bind(&item.romanization)
        .bind(&item.example_sentence)
        .bind(&item.example_translation)
        .bind(&item.audio_url)
        .bind(item.item_type.to_string())
        .bind(now)
        .bind(item.id)
        .execute(&self.pool)
        .await
        .context("Failed to update vocabulary item")?;

        Ok(VocabularyItem {
            updated_at: now,
            ..item.clone()
        })
    }

    async fn delete_item(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM vocabulary_items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete vocabulary item")?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_checked(&self, id: i64, checked: bool) -> Result<()> {
        sqlx::query("UPDATE vocabulary_items SET is_checked = ?, updated_at = ? WHERE id = ?")
            .bind(checked)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update vocabulary item")?;
        Ok(())
    }

    async fn list_items(&self, collection_id: i64) -> Result<Vec<VocabularyItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM vocabulary_items WHERE collection_id = ? ORDER BY created_at ASC, id ASC",
            ITEM_COLUMNS
        ))
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list vocabulary items")?;

        rows.iter().map(row_to_item).collect()
    }

    async fn search_items(&self, user_id: i64, query: &str, limit: i64) -> Result<Vec<VocabularyItem>> {
        let pattern = format!("%{}%", escape_like(query));

        let rows = sqlx::query(
            r#"
            SELECT i.id, i.collection_id, i.korean, i.meaning, i.romanization, i.example_sentence,
                   i.example_translation, i.audio_url, i.item_type, i.is_checked, i.created_at, i.updated_at
            FROM vocabulary_items i
            JOIN vocabulary_collections c ON c.id = i.collection_id
            WHERE c.user_id = ?
              AND (i.korean LIKE ? ESCAPE '\' OR i.meaning LIKE ? ESCAPE '\' OR i.romanization LIKE ? ESCAPE '\')
            ORDER BY i.korean
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to search vocabulary")?;

        rows.iter().map(row_to_item).collect()
    }
}

/// Escape LIKE wildcards in user input
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn row_to_collection(row: &sqlx::sqlite::SqliteRow) -> VocabularyCollection {
    VocabularyCollection {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        icon: row.get("icon"),
        is_public: row.get("is_public"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_summary(row: &sqlx::sqlite::SqliteRow) -> CollectionSummary {
    CollectionSummary {
        collection: row_to_collection(row),
        item_count: row.get("item_count"),
        checked_count: row.get("checked_count"),
    }
}

fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<VocabularyItem> {
    let item_type: String = row.get("item_type");

    Ok(VocabularyItem {
        id: row.get("id"),
        collection_id: row.get("collection_id"),
        korean: row.get("korean"),
        meaning: row.get("meaning"),
        romanization: row.get("romanization"),
        example_sentence: row.get("example_sentence"),
        example_translation: row.get("example_translation"),
        audio_url: row.get("audio_url"),
        item_type: VocabularyItemType::from_str(&item_type)?,
        is_checked: row.get("is_checked"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::{insert_user, setup_pool};
    use crate::models::UserRole;

    fn collection(user_id: i64, title: &str, is_public: bool) -> VocabularyCollection {
        let now = Utc::now();
        VocabularyCollection {
            id: 0,
            title: title.to_string(),
            description: None,
            icon: None,
            is_public,
            user_id,
            created_at: now,
            updated_at: now,
        }
    }

    fn item(collection_id: i64, korean: &str, meaning: &str) -> VocabularyItem {
        let now = Utc::now();
        VocabularyItem {
            id: 0,
            collection_id,
            korean: korean.to_string(),
            meaning: meaning.to_string(),
            romanization: None,
            example_sentence: None,
            example_translation: None,
            audio_url: None,
            item_type: VocabularyItemType::Word,
            is_checked: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_summary_counts() {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "Joko", UserRole::Murid).await;
        let repo = SqlxVocabularyRepository::new(pool);

        let c = repo.create_collection(&collection(user, "Buah", false)).await.unwrap();
        let apel = repo.create_item(&item(c.id, "사과", "apel")).await.unwrap();
        repo.create_item(&item(c.id, "배", "pir")).await.unwrap();
        repo.set_checked(apel.id, true).await.unwrap();

        let summaries = repo.list_by_user(user).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].item_count, 2);
        assert_eq!(summaries[0].checked_count, 1);
    }

    #[tokio::test]
    async fn test_empty_collection_summary() {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "Kiki", UserRole::Murid).await;
        let repo = SqlxVocabularyRepository::new(pool);
        repo.create_collection(&collection(user, "Kosong", true)).await.unwrap();

        let public = repo.list_public().await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].item_count, 0);
        assert_eq!(public[0].checked_count, 0);
    }

    #[tokio::test]
    async fn test_search_only_own_items() {
        let pool = setup_pool().await;
        let me = insert_user(&pool, "Lina", UserRole::Murid).await;
        let other = insert_user(&pool, "Maya", UserRole::Murid).await;
        let repo = SqlxVocabularyRepository::new(pool);

        let mine = repo.create_collection(&collection(me, "Mine", false)).await.unwrap();
        let theirs = repo.create_collection(&collection(other, "Theirs", true)).await.unwrap();
        repo.create_item(&item(mine.id, "사과", "apel")).await.unwrap();
        repo.create_item(&item(theirs.id, "사과나무", "pohon apel")).await.unwrap();

        let found = repo.search_items(me, "apel", 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].korean, "사과");

        assert!(repo.search_items(me, "100%", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_collection_removes_items() {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "Nina", UserRole::Murid).await;
        let repo = SqlxVocabularyRepository::new(pool);
        let c = repo.create_collection(&collection(user, "C", false)).await.unwrap();
        let i = repo.create_item(&item(c.id, "물", "air")).await.unwrap();

        assert!(repo.delete_collection(c.id).await.unwrap());
        assert!(repo.get_item(i.id).await.unwrap().is_none());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a%b_c\\"), "a\\%b\\_c\\\\");
    }
}
