//! Video room and live session repositories

use crate::db::DbPool;
use crate::models::{LiveSession, LiveSessionStatus, Participant, Room};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn create(&self, room: &Room) -> Result<Room>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Room>>;

    /// Rooms the user created or joined
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Room>>;

    /// Returns false when the user was already a member
    async fn add_member(&self, room_id: i64, user_id: i64) -> Result<bool>;

    async fn remove_member(&self, room_id: i64, user_id: i64) -> Result<bool>;

    async fn is_member(&self, room_id: i64, user_id: i64) -> Result<bool>;

    async fn members(&self, room_id: i64) -> Result<Vec<Participant>>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

#[async_trait]
pub trait LiveSessionRepository: Send + Sync {
    async fn create(&self, session: &LiveSession) -> Result<LiveSession>;

    async fn get_by_id(&self, id: i64) -> Result<Option<LiveSession>>;

    /// Sessions of a course, soonest first
    async fn list_by_course(&self, course_id: i64) -> Result<Vec<LiveSession>>;

    /// Sessions that have not ended in courses the user teaches or attends
    async fn list_upcoming_for_user(&self, user_id: i64) -> Result<Vec<LiveSession>>;

    /// Move a session to `status`, stamping `started_at`/`ended_at`
    async fn set_status(&self, id: i64, status: LiveSessionStatus) -> Result<()>;

    async fn add_participant(&self, session_id: i64, user_id: i64) -> Result<bool>;

    async fn is_participant(&self, session_id: i64, user_id: i64) -> Result<bool>;

    async fn participants(&self, session_id: i64) -> Result<Vec<Participant>>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxRoomRepository {
    pool: DbPool,
}

impl SqlxRoomRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn RoomRepository> {
        Arc::new(Self::new(pool))
    }
}

pub struct SqlxLiveSessionRepository {
    pool: DbPool,
}

impl SqlxLiveSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn LiveSessionRepository> {
        Arc::new(Self::new(pool))
    }
}

const ROOM_COLUMNS: &str =
    "r.id, r.name, r.description, r.course_id, r.creator_id, r.video_room, r.is_active, r.created_at";

const SESSION_COLUMNS: &str = "s.id, s.name, s.description, s.course_id, s.creator_id, s.video_room, \
     s.status, s.scheduled_at, s.started_at, s.ended_at, s.created_at";

#[async_trait]
impl RoomRepository for SqlxRoomRepository {
    async fn create(&self, room: &Room) -> Result<Room> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO rooms (name, description, course_id, creator_id, video_room, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&room.name)
        .bind(&room.description)
        .bind(room.course_id)
        .bind(room.creator_id)
        .bind(&room.video_room)
        .bind(room.is_active)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create room")?;

        Ok(Room {
            id: result.last_insert_rowid(),
            created_at: now,
            ..room.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Room>> {
        let row = sqlx::query(&format!("SELECT {} FROM rooms r WHERE r.id = ?", ROOM_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get room")?;

        Ok(row.as_ref().map(row_to_room))
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Room>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM rooms r \
             WHERE r.creator_id = ? OR EXISTS(SELECT 1 FROM room_members m WHERE m.room_id = r.id AND m.user_id = ?) \
             ORDER BY r.created_at DESC",
            ROOM_COLUMNS
        ))
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list rooms")?;

        Ok(rows.iter().map(row_to_room).collect())
    }

    async fn add_member(&self, room_id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query("INSERT OR IGNORE INTO room_members (room_id, user_id, joined_at) VALUES (?, ?, ?)")
            .bind(room_id)
            .bind(user_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .context("Failed to add room member")?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_member(&self, room_id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM room_members WHERE room_id = ? AND user_id = ?")
            .bind(room_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to remove room member")?;
        Ok(result.rows_affected() > 0)
    }

    async fn is_member(&self, room_id: i64, user_id: i64) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM room_members WHERE room_id = ? AND user_id = ?) as found",
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check room membership")?;
        Ok(row.get::<i64, _>("found") != 0)
    }

    async fn members(&self, room_id: i64) -> Result<Vec<Participant>> {
        let rows = sqlx::query(
            r#"
            SELECT u.id as user_id, u.name, u.image, m.joined_at
            FROM room_members m JOIN users u ON u.id = m.user_id
            WHERE m.room_id = ?
            ORDER BY m.joined_at
            "#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list room members")?;

        Ok(rows.iter().map(row_to_participant).collect())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM rooms WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete room")?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl LiveSessionRepository for SqlxLiveSessionRepository {
    async fn create(&self, session: &LiveSession) -> Result<LiveSession> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO live_sessions (name, description, course_id, creator_id, video_room, status,
                                       scheduled_at, started_at, ended_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.name)
        .bind(&session.description)
        .bind(session.course_id)
        .bind(session.creator_id)
        .bind(&session.video_room)
        .bind(session.status.to_string())
        .bind(session.scheduled_at)
        .bind(session.started_at)
        .bind(session.ended_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create live session")?;

        Ok(LiveSession {
            id: result.last_insert_rowid(),
            created_at: now,
            ..session.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<LiveSession>> {
        let row = sqlx::query(&format!("SELECT {} FROM live_sessions s WHERE s.id = ?", SESSION_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get live session")?;

        row.as_ref().map(row_to_session).transpose()
    }

    async fn list_by_course(&self, course_id: i64) -> Result<Vec<LiveSession>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM live_sessions s WHERE s.course_id = ? ORDER BY s.scheduled_at ASC",
            SESSION_COLUMNS
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list live sessions")?;

        rows.iter().map(row_to_session).collect()
    }

    async fn list_upcoming_for_user(&self, user_id: i64) -> Result<Vec<LiveSession>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM live_sessions s \
             WHERE s.status != 'ENDED' AND (s.creator_id = ? \
                OR EXISTS(SELECT 1 FROM course_enrollments e WHERE e.course_id = s.course_id AND e.user_id = ?)) \
             ORDER BY s.scheduled_at ASC",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list upcoming live sessions")?;

        rows.iter().map(row_to_session).collect()
    }

    async fn set_status(&self, id: i64, status: LiveSessionStatus) -> Result<()> {
        let now = Utc::now();
        let (started, ended): (Option<DateTime<Utc>>, Option<DateTime<Utc>>) = match status {
            LiveSessionStatus::Scheduled => (None, None),
            LiveSessionStatus::Live => (Some(now), None),
            LiveSessionStatus::Ended => (None, Some(now)),
        };

        sqlx::query(
            r#"
            UPDATE live_sessions
            SET status = ?, started_at = COALESCE(started_at, ?), ended_at = COALESCE(ended_at, ?)
            WHERE id = ?
            "#,
        )
        .bind(status.to_string())
        .bind(started)
        .bind(ended)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update live session status")?;
        Ok(())
    }

    async fn add_participant(&self, session_id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO live_session_participants (session_id, user_id, joined_at) VALUES (?, ?, ?)",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to add live session participant")?;
        Ok(result.rows_affected() > 0)
    }

    async fn is_participant(&self, session_id: i64, user_id: i64) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM live_session_participants WHERE session_id = ? AND user_id = ?) as found",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check live session participant")?;
        Ok(row.get::<i64, _>("found") != 0)
    }

    async fn participants(&self, session_id: i64) -> Result<Vec<Participant>> {
        let rows = sqlx::query(
            r#"
            SELECT u.id as user_id, u.name, u.image, p.joined_at
            FROM live_session_participants p JOIN users u ON u.id = p.user_id
            WHERE p.session_id = ?
            ORDER BY p.joined_at
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list live session participants")?;

        Ok(rows.iter().map(row_to_participant).collect())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM live_sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete live session")?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_room(row: &sqlx::sqlite::SqliteRow) -> Room {
    Room {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        course_id: row.get("course_id"),
        creator_id: row.get("creator_id"),
        video_room: row.get("video_room"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    }
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<LiveSession> {
    let status: String = row.get("status");

    Ok(LiveSession {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        course_id: row.get("course_id"),
        creator_id: row.get("creator_id"),
        video_room: row.get("video_room"),
        status: LiveSessionStatus::from_str(&status)?,
        scheduled_at: row.get("scheduled_at"),
        started_at: row.get("started_at"),
        ended_at: row.get("ended_at"),
        created_at: row.get("created_at"),
    })
}

fn row_to_participant(row: &sqlx::sqlite::SqliteRow) -> Participant {
    Participant {
        user_id: row.get("user_id"),
        name: row.get("name"),
        image: row.get("image"),
        joined_at: row.get("joined_at"),
    }
}
