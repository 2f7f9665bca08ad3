//! User administration and platform statistics
//!
//! Bulk deletion removes the users from the chat service first and waits
//! for its background task; local rows are only deleted once that task
//! completed.

use crate::db::repositories::{ArticleRepository, CourseRepository, UserRepository};
use crate::integrations::{wait_for_task, ChatService};
use crate::models::{AdminUpdateUserInput, ListParams, PagedResult, User, UserRole};
use crate::services::error::{ServiceError, ServiceResult};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound of users per bulk request
pub const MAX_BULK_DELETE: usize = 100;

/// Content and user totals for the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct PlatformStats {
    pub users: i64,
    pub users_by_role: BTreeMap<String, i64>,
    pub courses: i64,
    pub articles: i64,
}

pub struct AdminService {
    users: Arc<dyn UserRepository>,
    courses: Arc<dyn CourseRepository>,
    articles: Arc<dyn ArticleRepository>,
    chat: Arc<dyn ChatService>,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl AdminService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        courses: Arc<dyn CourseRepository>,
        articles: Arc<dyn ArticleRepository>,
        chat: Arc<dyn ChatService>,
    ) -> Self {
        Self {
            users,
            courses,
            articles,
            chat,
            poll_interval: Duration::from_secs(1),
            max_poll_attempts: 30,
        }
    }

    /// Override how the chat deletion task is polled
    pub fn with_polling(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.poll_interval = interval;
        self.max_poll_attempts = max_attempts.max(1);
        self
    }

    pub async fn list_users(
        &self,
        params: &ListParams,
        role: Option<UserRole>,
    ) -> ServiceResult<PagedResult<User>> {
        let (users, total) = self.users.list(params, role).await?;
        Ok(PagedResult::new(users, total, params))
    }

    pub async fn update_user(
        &self,
        actor: &User,
        id: i64,
        input: AdminUpdateUserInput,
    ) -> ServiceResult<User> {
        let mut user = self.find_user(id).await?;

        if let Some(role) = input.role {
            if user.id == actor.id && role != UserRole::Admin {
                return Err(ServiceError::Conflict("Admins cannot demote themselves".into()));
            }
            user.role = role;
        }
        if let Some(plan) = input.plan {
            user.plan = plan;
        }
        user.updated_at = Utc::now();

        let user = self.users.update(&user).await?;
        tracing::info!(user_id = user.id, role = %user.role, plan = %user.plan, admin_id = actor.id, "User updated");
        Ok(user)
    }

    pub async fn delete_user(&self, actor: &User, id: i64) -> ServiceResult<()> {
        if id == actor.id {
            return Err(ServiceError::Conflict("Admins cannot delete themselves".into()));
        }
        if !self.users.delete(id).await? {
            return Err(ServiceError::NotFound("User"));
        }
        tracing::info!(user_id = id, admin_id = actor.id, "User deleted");
        Ok(())
    }

    /// Remove users from the chat service, then locally
    pub async fn bulk_delete(&self, actor: &User, ids: &[i64]) -> ServiceResult<u64> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        if ids.is_empty() {
            return Err(ServiceError::validation("No users selected"));
        }
        if ids.len() > MAX_BULK_DELETE {
            return Err(ServiceError::validation(format!(
                "At most {} users can be deleted at once",
                MAX_BULK_DELETE
            )));
        }
        if ids.contains(&actor.id) {
            return Err(ServiceError::Conflict("Admins cannot delete themselves".into()));
        }

        let chat_ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        let task_id = self.chat.delete_users(&chat_ids).await.map_err(|e| {
            tracing::warn!(count = ids.len(), "Chat user deletion failed: {}", e);
            ServiceError::from(e)
        })?;

        wait_for_task(self.chat.as_ref(), &task_id, self.poll_interval, self.max_poll_attempts)
            .await
            .map_err(|e| {
                tracing::warn!(task_id = %task_id, "Chat deletion task did not complete: {}", e);
                ServiceError::from(e)
            })?;

        let deleted = self.users.delete_many(&ids).await?;
        tracing::info!(requested = ids.len(), deleted, admin_id = actor.id, "Users bulk deleted");
        Ok(deleted)
    }

    pub async fn stats(&self) -> ServiceResult<PlatformStats> {
        let users_by_role: BTreeMap<String, i64> = self
            .users
            .count_by_role()
            .await?
            .into_iter()
            .map(|(role, count)| (role.to_string(), count))
            .collect();

        Ok(PlatformStats {
            users: users_by_role.values().sum(),
            users_by_role,
            courses: self.courses.count().await?,
            articles: self.articles.count().await?,
        })
    }

    async fn find_user(&self, id: i64) -> ServiceResult<User> {
        self.users
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("User"))
    }
}
