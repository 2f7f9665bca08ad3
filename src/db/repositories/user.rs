//! User repository
//!
//! Accounts, roles and the XP/streak counters used by the leaderboard.

use crate::db::DbPool;
use crate::models::{ListParams, User, UserPlan, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite};
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a self-registered account. The role is decided by the insert
    /// itself: ADMIN when the table is empty, `user.role` otherwise.
    async fn register(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist profile, credential, role and plan fields
    async fn update(&self, user: &User) -> Result<User>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Delete several users, returning how many rows went away
    async fn delete_many(&self, ids: &[i64]) -> Result<u64>;

    async fn count_by_role(&self) -> Result<Vec<(UserRole, i64)>>;

    /// Paginated list, newest first, optionally filtered by role
    async fn list(&self, params: &ListParams, role: Option<UserRole>) -> Result<(Vec<User>, i64)>;

    /// Users ordered by XP, ties going to the earlier account
    async fn top_by_xp(&self, limit: i64) -> Result<Vec<User>>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DbPool,
}

impl SqlxUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DbPool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, plan, image, bio, xp, \
     current_streak, longest_streak, last_activity_date, created_at, updated_at";

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get user by ID")?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE email = ? COLLATE NOCASE",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get user by email")?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn update(&self, user: &User) -> Result<User> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE users
            SET name = ?, email = ?, password_hash = ?, role = ?, plan = ?, image = ?, bio = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .bind(user.plan.to_string())
        .bind(&user.image)
        .bind(&user.bio)
        .bind(now)
        .bind(user.id)
        .execute(&self.pool)
        .await
        .context("Failed to update user")?;

        Ok(User {
            updated_at: now,
            ..user.clone()
        })
    }

    async fn register(&self, user: &User) -> Result<User> {
        let now = Utc::now();

        let row = sqlx::query(
            r#"
            INSERT INTO users (name, email, password_hash, role, plan, image, bio, created_at, updated_at)
            SELECT ?, ?, ?, CASE WHEN EXISTS (SELECT 1 FROM users) THEN ? ELSE 'ADMIN' END, ?, ?, ?, ?, ?
            RETURNING id, role
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .bind(user.plan.to_string())
        .bind(&user.image)
        .bind(&user.bio)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("Failed to register user")?;

        let role: String = row.get("role");
        Ok(User {
            id: row.get("id"),
            role: UserRole::from_str(&role)?,
            created_at: now,
            updated_at: now,
            ..user.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete user")?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_many(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM users WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .context("Failed to delete users")?;

        Ok(result.rows_affected())
    }

    async fn count_by_role(&self) -> Result<Vec<(UserRole, i64)>> {
        let rows = sqlx::query("SELECT role, COUNT(*) as count FROM users GROUP BY role ORDER BY role")
            .fetch_all(&self.pool)
            .await
            .context("Failed to count users by role")?;

        rows.iter()
            .map(|row| {
                let role: String = row.get("role");
                Ok((UserRole::from_str(&role)?, row.get("count")))
            })
            .collect()
    }

    async fn list(&self, params: &ListParams, role: Option<UserRole>) -> Result<(Vec<User>, i64)> {
        let role = role.map(|r| r.to_string());

        let rows = sqlx::query(&format!(
            "SELECT {} FROM users WHERE (? IS NULL OR role = ?) ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            USER_COLUMNS
        ))
        .bind(&role)
        .bind(&role)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users")?;

        let total_row = sqlx::query("SELECT COUNT(*) as count FROM users WHERE (? IS NULL OR role = ?)")
            .bind(&role)
            .bind(&role)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?;

        let users = rows.iter().map(row_to_user).collect::<Result<Vec<_>>>()?;
        Ok((users, total_row.get("count")))
    }

    async fn top_by_xp(&self, limit: i64) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users ORDER BY xp DESC, created_at ASC, id ASC LIMIT ?",
            USER_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load leaderboard")?;

        rows.iter().map(row_to_user).collect()
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role_str: String = row.get("role");
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;
    let plan_str: String = row.get("plan");
    let plan = UserPlan::from_str(&plan_str).unwrap_or_default();

    Ok(User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role,
        plan,
        image: row.get("image"),
        bio: row.get("bio"),
        xp: row.get("xp"),
        current_streak: row.get("current_streak"),
        longest_streak: row.get("longest_streak"),
        last_activity_date: row.get("last_activity_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
