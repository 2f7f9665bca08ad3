//! Activity log repository

use crate::db::DbPool;
use crate::models::{next_streak, ActivityLog, ActivityType, UserProgress};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// Log the activity and apply its XP and streak to the user in one
    /// transaction.
    ///
    /// Returns `None` when the activity was already logged: a `LOGIN` on the
    /// same date, or the same activity for the same reference.
    async fn record(&self, log: &ActivityLog) -> Result<Option<UserProgress>>;

    /// Most recent activities of a user
    async fn list_by_user(&self, user_id: i64, limit: i64) -> Result<Vec<ActivityLog>>;
}

pub struct SqlxActivityRepository {
    pool: DbPool,
}

impl SqlxActivityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn ActivityRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ActivityRepository for SqlxActivityRepository {
    async fn record(&self, log: &ActivityLog) -> Result<Option<UserProgress>> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO activity_logs (user_id, activity_type, xp_earned, description, reference_id, activity_date, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(log.user_id)
        .bind(log.activity_type.as_str())
        .bind(log.xp_earned)
        .bind(&log.description)
        .bind(log.reference_id)
        .bind(log.activity_date)
        .bind(log.created_at)
        .execute(&mut *tx)
        .await
        .context("Failed to create activity log")?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let row = sqlx::query(
            "SELECT xp, current_streak, longest_streak, last_activity_date FROM users WHERE id = ?",
        )
        .bind(log.user_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to load user progress")?
        .ok_or_else(|| anyhow!("User {} not found", log.user_id))?;

        let last_active: Option<NaiveDate> = row.get("last_activity_date");
        let current = next_streak(last_active, row.get("current_streak"), log.activity_date);
        let progress = UserProgress {
            total_xp: row.get::<i64, _>("xp") + log.xp_earned,
            current_streak: current,
            longest_streak: row.get::<i64, _>("longest_streak").max(current),
        };

        sqlx::query(
            r#"
            UPDATE users
            SET xp = ?, current_streak = ?, longest_streak = ?, last_activity_date = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(progress.total_xp)
        .bind(progress.current_streak)
        .bind(progress.longest_streak)
        .bind(log.activity_date)
        .bind(log.created_at)
        .bind(log.user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to update user progress")?;

        tx.commit().await?;
        Ok(Some(progress))
    }

    async fn list_by_user(&self, user_id: i64, limit: i64) -> Result<Vec<ActivityLog>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, activity_type, xp_earned, description, reference_id, activity_date, created_at
            FROM activity_logs
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list activity logs")?;

        rows.iter().map(row_to_activity).collect()
    }
}

fn row_to_activity(row: &sqlx::sqlite::SqliteRow) -> Result<ActivityLog> {
    let type_str: String = row.get("activity_type");

    Ok(ActivityLog {
        id: row.get("id"),
        user_id: row.get("user_id"),
        activity_type: ActivityType::from_str(&type_str)?,
        xp_earned: row.get("xp_earned"),
        description: row.get("description"),
        reference_id: row.get("reference_id"),
        activity_date: row.get("activity_date"),
        created_at: row.get("created_at"),
    })
}
