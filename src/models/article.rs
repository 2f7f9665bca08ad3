//! Article model
//!
//! Articles are Markdown reading material written by GURU/ADMIN users.
//! Only published articles are visible to the public list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Article entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    /// URL-friendly slug
    pub slug: String,
    pub title: String,
    /// Short teaser shown in lists
    pub description: String,
    /// Markdown content
    pub content: String,
    /// Rendered HTML content
    pub content_html: String,
    pub thumbnail: Option<String>,
    pub author_id: i64,
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    pub fn new(
        slug: String,
        title: String,
        content: String,
        content_html: String,
        author_id: i64,
        is_published: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            slug,
            title,
            description: String::new(),
            content,
            content_html,
            thumbnail: None,
            author_id,
            is_published,
            published_at: is_published.then_some(now),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Article with author details, for list and detail responses
#[derive(Debug, Clone, Serialize)]
pub struct ArticleWithAuthor {
    #[serde(flatten)]
    pub article: Article,
    pub author_name: String,
    pub author_image: Option<String>,
}

/// Input for creating a new article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateArticleInput {
    pub title: String,
    /// Generated from the title when omitted
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub content: String,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub is_published: bool,
}

/// Input for updating an existing article
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateArticleInput {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub thumbnail: Option<String>,
    pub is_published: Option<bool>,
}

impl UpdateArticleInput {
    pub fn has_changes(&self) -> bool {
        self.slug.is_some()
            || self.title.is_some()
            || self.description.is_some()
            || self.content.is_some()
            || self.thumbnail.is_some()
            || self.is_published.is_some()
    }
}
