//! Article service
//!
//! Reading material authored by GURU and ADMIN users. Only the author or an
//! admin may change or delete an article. Markdown is rendered once on write.

use crate::db::repositories::ArticleRepository;
use crate::models::{
    ActivityType, Article, ArticleWithAuthor, CreateArticleInput, ListParams, PagedResult,
    UpdateArticleInput, User,
};
use crate::services::activity::ActivityService;
use crate::services::markdown::MarkdownRenderer;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

/// Characters kept for the generated description
const EXCERPT_CHARS: usize = 160;

#[derive(Debug, thiserror::Error)]
pub enum ArticleServiceError {
    #[error("Article not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Article slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
    renderer: MarkdownRenderer,
    activity: Arc<ActivityService>,
}

impl ArticleService {
    pub fn new(repo: Arc<dyn ArticleRepository>, activity: Arc<ActivityService>) -> Self {
        Self {
            repo,
            renderer: MarkdownRenderer::new(),
            activity,
        }
    }

    pub async fn create(&self, actor: &User, input: CreateArticleInput) -> Result<Article, ArticleServiceError> {
        if !actor.is_teacher() {
            return Err(ArticleServiceError::Forbidden(
                "Only teachers can write articles".to_string(),
            ));
        }

        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(ArticleServiceError::ValidationError("Title cannot be empty".to_string()));
        }
        if input.content.trim().is_empty() {
            return Err(ArticleServiceError::ValidationError("Content cannot be empty".to_string()));
        }

        let slug = match input.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(custom) => generate_slug(custom),
            None => generate_slug(&title),
        };
        if slug.is_empty() {
            return Err(ArticleServiceError::ValidationError(
                "Slug cannot be generated from the title".to_string(),
            ));
        }
        self.ensure_slug_free(&slug, None).await?;

        let content_html = self.renderer.render(&input.content);
        let mut article = Article::new(slug, title, input.content, content_html, actor.id, input.is_published);
        article.description = self.description_or_excerpt(input.description, &article.content);
        article.thumbnail = input.thumbnail.filter(|t| !t.trim().is_empty());

        let article = self
            .repo
            .create(&article)
            .await
            .context("Failed to create article")?;

        tracing::info!(article_id = article.id, slug = %article.slug, "Article created");
        Ok(article)
    }

    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        input: UpdateArticleInput,
    ) -> Result<Article, ArticleServiceError> {
        let mut article = self.owned_article(actor, id).await?;
        if !input.has_changes() {
            return Ok(article);
        }

        if let Some(title) = input.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(ArticleServiceError::ValidationError("Title cannot be empty".to_string()));
            }
            article.title = title;
        }
        if let Some(slug) = input.slug {
            let slug = generate_slug(&slug);
            if slug.is_empty() {
                return Err(ArticleServiceError::ValidationError("Slug cannot be empty".to_string()));
            }
            if slug != article.slug {
                self.ensure_slug_free(&slug, Some(id)).await?;
                article.slug = slug;
            }
        }
        if let Some(content) = input.content {
            article.content_html = self.renderer.render(&content);
            article.content = content;
        }
        if let Some(description) = input.description {
            article.description = self.description_or_excerpt(description, &article.content);
        }
        if let Some(thumbnail) = input.thumbnail {
            article.thumbnail = Some(thumbnail).filter(|t| !t.trim().is_empty());
        }
        if let Some(published) = input.is_published {
            if published && article.published_at.is_none() {
                article.published_at = Some(Utc::now());
            }
            article.is_published = published;
        }

        Ok(self
            .repo
            .update(&article)
            .await
            .context("Failed to update article")?)
    }

    /// Delete an article; only its author or an admin may do so
    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), ArticleServiceError> {
        self.owned_article(actor, id).await?;
        self.repo
            .delete(id)
            .await
            .context("Failed to delete article")?;
        tracing::info!(article_id = id, actor_id = actor.id, "Article deleted");
        Ok(())
    }

    pub async fn list_published(
        &self,
        params: &ListParams,
    ) -> Result<PagedResult<ArticleWithAuthor>, ArticleServiceError> {
        let (items, total) = self
            .repo
            .list(params, true, None)
            .await
            .context("Failed to list articles")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Articles written by the caller, drafts included
    pub async fn list_authored(
        &self,
        actor: &User,
        params: &ListParams,
    ) -> Result<PagedResult<ArticleWithAuthor>, ArticleServiceError> {
        let (items, total) = self
            .repo
            .list(params, false, Some(actor.id))
            .await
            .context("Failed to list articles")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Read an article by slug.
    ///
    /// Drafts are only readable by their author or an admin. A logged-in
    /// reader earns `READ_ARTICLE` XP once per article.
    pub async fn read(&self, slug: &str, reader: Option<&User>) -> Result<ArticleWithAuthor, ArticleServiceError> {
        let found = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get article")?
            .ok_or_else(|| ArticleServiceError::NotFound(slug.to_string()))?;

        if !found.article.is_published {
            if reader.is_some_and(|u| u.can_edit(found.article.author_id)) {
                return Ok(found);
            }
            return Err(ArticleServiceError::NotFound(slug.to_string()));
        }

        if let Some(user) = reader {
            if let Err(e) = self
                .activity
                .record_fixed(
                    user.id,
                    ActivityType::ReadArticle,
                    Some(found.article.id),
                    Some(found.article.title.clone()),
                )
                .await
            {
                tracing::warn!(user_id = user.id, article_id = found.article.id, error = %e, "Failed to record article read");
            }
        }

        Ok(found)
    }

    async fn owned_article(&self, actor: &User, id: i64) -> Result<Article, ArticleServiceError> {
        let article = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get article")?
            .ok_or_else(|| ArticleServiceError::NotFound(id.to_string()))?;

        if !actor.can_edit(article.author_id) {
            return Err(ArticleServiceError::Forbidden(
                "Only the author can modify this article".to_string(),
            ));
        }
        Ok(article)
    }

    async fn ensure_slug_free(&self, slug: &str, exclude_id: Option<i64>) -> Result<(), ArticleServiceError> {
        if self
            .repo
            .slug_exists(slug, exclude_id)
            .await
            .context("Failed to check slug")?
        {
            return Err(ArticleServiceError::DuplicateSlug(slug.to_string()));
        }
        Ok(())
    }

    fn description_or_excerpt(&self, description: String, content: &str) -> String {
        let description = description.trim();
        if description.is_empty() {
            self.renderer.excerpt(content, EXCERPT_CHARS)
        } else {
            description.to_string()
        }
    }
}

/// URL slug from a title.
///
/// ASCII letters and digits are lowercased, Hangul and other non-ASCII
/// letters are kept, and everything else collapses into single hyphens.
pub fn generate_slug(title: &str) -> String {
    let mut result = String::new();
    let mut prev_hyphen = false;

    for c in title.to_lowercase().chars() {
        let keep = c.is_ascii_alphanumeric() || (!c.is_ascii() && c.is_alphanumeric());
        if keep {
            result.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen && !result.is_empty() {
            result.push('-');
            prev_hyphen = true;
        }
    }

    result.trim_end_matches('-').to_string()
}
