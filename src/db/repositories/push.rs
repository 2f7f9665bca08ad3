//! Push subscription and notification inbox repository

use crate::db::DbPool;
use crate::models::{Notification, PushSubscription};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait PushRepository: Send + Sync {
    /// Insert or re-own a subscription; the endpoint is unique
    async fn upsert_subscription(
        &self,
        user_id: i64,
        endpoint: &str,
        p256dh: &str,
        auth: &str,
    ) -> Result<PushSubscription>;

    /// Remove the user's subscription for an endpoint
    async fn delete_subscription(&self, user_id: i64, endpoint: &str) -> Result<bool>;

    async fn delete_subscription_by_id(&self, id: i64) -> Result<()>;

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<PushSubscription>>;

    async fn list_all(&self) -> Result<Vec<PushSubscription>>;

    async fn create_notification(
        &self,
        user_id: i64,
        title: &str,
        body: &str,
        url: Option<&str>,
    ) -> Result<Notification>;

    async fn list_notifications(&self, user_id: i64, unread_only: bool, limit: i64) -> Result<Vec<Notification>>;

    async fn unread_count(&self, user_id: i64) -> Result<i64>;

    /// Mark one of the user's notifications read
    async fn mark_read(&self, user_id: i64, id: i64) -> Result<bool>;

    async fn mark_all_read(&self, user_id: i64) -> Result<u64>;
}

pub struct SqlxPushRepository {
    pool: DbPool,
}

impl SqlxPushRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn PushRepository> {
        Arc::new(Self::new(pool))
    }
}

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, endpoint, p256dh, auth, created_at";

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, body, url, read_at, created_at";

#[async_trait]
impl PushRepository for SqlxPushRepository {
    async fn upsert_subscription(
        &self,
        user_id: i64,
        endpoint: &str,
        p256dh: &str,
        auth: &str,
    ) -> Result<PushSubscription> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO push_subscriptions (user_id, endpoint, p256dh, auth, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(endpoint) DO UPDATE SET user_id = excluded.user_id, p256dh = excluded.p256dh, auth = excluded.auth
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id)
        .bind(endpoint)
        .bind(p256dh)
        .bind(auth)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .context("Failed to save push subscription")?;

        Ok(row_to_subscription(&row))
    }

    async fn delete_subscription(&self, user_id: i64, endpoint: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE user_id = ? AND endpoint = ?")
            .bind(user_id)
            .bind(endpoint)
            .execute(&self.pool)
            .await
            .context("Failed to delete push subscription")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_subscription_by_id(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM push_subscriptions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete push subscription")?;
        Ok(())
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<PushSubscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM push_subscriptions WHERE user_id = ? ORDER BY id",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list push subscriptions")?;

        Ok(rows.iter().map(row_to_subscription).collect())
    }

    async fn list_all(&self) -> Result<Vec<PushSubscription>> {
        let rows = sqlx::query(&format!("SELECT {} FROM push_subscriptions ORDER BY id", SUBSCRIPTION_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list push subscriptions")?;

        Ok(rows.iter().map(row_to_subscription).collect())
    }

    async fn create_notification(
        &self,
        user_id: i64,
        title: &str,
        body: &str,
        url: Option<&str>,
    ) -> Result<Notification> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO notifications (user_id, title, body, url, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(title)
        .bind(body)
        .bind(url)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create notification")?;

        Ok(Notification {
            id: result.last_insert_rowid(),
            user_id,
            title: title.to_string(),
            body: body.to_string(),
            url: url.map(str::to_string),
            read_at: None,
            created_at: now,
        })
    }

    async fn list_notifications(&self, user_id: i64, unread_only: bool, limit: i64) -> Result<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM notifications WHERE user_id = ? AND (? = 0 OR read_at IS NULL) \
             ORDER BY created_at DESC, id DESC LIMIT ?",
            NOTIFICATION_COLUMNS
        ))
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list notifications")?;

        Ok(rows.iter().map(row_to_notification).collect())
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM notifications WHERE user_id = ? AND read_at IS NULL")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count notifications")?;
        Ok(row.get("count"))
    }

    async fn mark_read(&self, user_id: i64, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = COALESCE(read_at, ?) WHERE id = ? AND user_id = ?",
        )
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .context("Failed to mark notification read")?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query("UPDATE notifications SET read_at = ? WHERE user_id = ? AND read_at IS NULL")
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to mark notifications read")?;
        Ok(result.rows_affected())
    }
}

fn row_to_subscription(row: &sqlx::sqlite::SqliteRow) -> PushSubscription {
    PushSubscription {
        id: row.get("id"),
        user_id: row.get("user_id"),
        endpoint: row.get("endpoint"),
        p256dh: row.get("p256dh"),
        auth: row.get("auth"),
        created_at: row.get("created_at"),
    }
}

fn row_to_notification(row: &sqlx::sqlite::SqliteRow) -> Notification {
    Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        body: row.get("body"),
        url: row.get("url"),
        read_at: row.get("read_at"),
        created_at: row.get("created_at"),
    }
}
