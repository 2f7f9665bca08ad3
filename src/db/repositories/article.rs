//! Article repository

use crate::db::DbPool;
use crate::models::{Article, ArticleWithAuthor, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn create(&self, article: &Article) -> Result<Article>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<ArticleWithAuthor>>;

    /// Check whether a slug is taken, optionally ignoring one article
    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    async fn update(&self, article: &Article) -> Result<Article>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// List articles, newest publication first
    async fn list(
        &self,
        params: &ListParams,
        published_only: bool,
        author_id: Option<i64>,
    ) -> Result<(Vec<ArticleWithAuthor>, i64)>;

    async fn count(&self) -> Result<i64>;
}

pub struct SqlxArticleRepository {
    pool: DbPool,
}

impl SqlxArticleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

const ARTICLE_COLUMNS: &str = "a.id, a.slug, a.title, a.description, a.content, a.content_html, \
     a.thumbnail, a.author_id, a.is_published, a.published_at, a.created_at, a.updated_at";

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn create(&self, article: &Article) -> Result<Article> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO articles (slug, title, description, content, content_html, thumbnail, author_id,
                                  is_published, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&article.slug)
        .bind(&article.title)
        .bind(&article.description)
        .bind(&article.content)
        .bind(&article.content_html)
        .bind(&article.thumbnail)
        .bind(article.author_id)
        .bind(article.is_published)
        .bind(article.published_at)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create article")?;

        Ok(Article {
            id: result.last_insert_rowid(),
            created_at: now,
            updated_at: now,
            ..article.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        let row = sqlx::query(&format!("SELECT {} FROM articles a WHERE a.id = ?", ARTICLE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get article by ID")?;

        Ok(row.as_ref().map(row_to_article))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<ArticleWithAuthor>> {
        let row = sqlx::query(&format!(
            "SELECT {}, u.name as author_name, u.image as author_image \
             FROM articles a JOIN users u ON u.id = a.author_id WHERE a.slug = ?",
            ARTICLE_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get article by slug")?;

        Ok(row.as_ref().map(row_to_article_with_author))
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM articles WHERE slug = ? AND (? IS NULL OR id != ?)) as found",
        )
        .bind(slug)
        .bind(exclude_id)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check slug")?;

        Ok(row.get::<i64, _>("found") != 0)
    }

    async fn update(&self, article: &Article) -> Result<Article> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE articles
            SET slug = ?, title = ?, description = ?, content = ?, content_html = ?, thumbnail = ?,
                is_published = ?, published_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&article.slug)
        .bind(&article.title)
        .bind(&article.description)
        .bind(&article.content)
        .bind(&article.content_html)
        .bind(&article.thumbnail)
        .bind(article.is_published)
        .bind(article.published_at)
        .bind(now)
        .bind(article.id)
        .execute(&self.pool)
        .await
        .context("Failed to update article")?;

        Ok(Article {
            updated_at: now,
            ..article.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete article")?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(
        &self,
        params: &ListParams,
        published_only: bool,
        author_id: Option<i64>,
    ) -> Result<(Vec<ArticleWithAuthor>, i64)> {
        let rows = sqlx::query(&format!(
            "SELECT {}, u.name as author_name, u.image as author_image \
             FROM articles a JOIN users u ON u.id = a.author_id \
             WHERE (? = 0 OR a.is_published = 1) AND (? IS NULL OR a.author_id = ?) \
             ORDER BY COALESCE(a.published_at, a.created_at) DESC, a.id DESC LIMIT ? OFFSET ?",
            ARTICLE_COLUMNS
        ))
        .bind(published_only)
        .bind(author_id)
        .bind(author_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list articles")?;

        let total: i64 = sqlx::query(
            "SELECT COUNT(*) as count FROM articles a WHERE (? = 0 OR a.is_published = 1) AND (? IS NULL OR a.author_id = ?)",
        )
        .bind(published_only)
        .bind(author_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count articles")?
        .get("count");

        Ok((rows.iter().map(row_to_article_with_author).collect(), total))
    }

    async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM articles")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count articles")?;
        Ok(row.get("count"))
    }
}

fn row_to_article(row: &sqlx::sqlite::SqliteRow) -> Article {
    Article {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        description: row.get("description"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        thumbnail: row.get("thumbnail"),
        author_id: row.get("author_id"),
        is_published: row.get("is_published"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_article_with_author(row: &sqlx::sqlite::SqliteRow) -> ArticleWithAuthor {
    ArticleWithAuthor {
        article: row_to_article(row),
        author_name: row.get("author_name"),
        author_image: row.get("author_image"),
    }
}
