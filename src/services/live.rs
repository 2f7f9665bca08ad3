//! Video rooms and live sessions
//!
//! Both map to a room on the video service. Tokens are only handed to the
//! creator, a member/participant or an admin. Deleting always removes the
//! local record, even when the video service refuses the remote delete.

use crate::db::repositories::{CourseRepository, LiveSessionRepository, RoomRepository};
use crate::integrations::{VideoGrants, VideoService};
use crate::models::{
    ActivityType, CreateLiveSessionInput, CreateRoomInput, JoinToken, LiveSession,
    LiveSessionDetail, LiveSessionStatus, Room, RoomDetail, User,
};
use crate::services::activity::ActivityService;
use crate::services::error::{ServiceError, ServiceResult};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub struct LiveService {
    rooms: Arc<dyn RoomRepository>,
    sessions: Arc<dyn LiveSessionRepository>,
    courses: Arc<dyn CourseRepository>,
    video: Arc<dyn VideoService>,
    activity: Arc<ActivityService>,
}

impl LiveService {
    pub fn new(
        rooms: Arc<dyn RoomRepository>,
        sessions: Arc<dyn LiveSessionRepository>,
        courses: Arc<dyn CourseRepository>,
        video: Arc<dyn VideoService>,
        activity: Arc<ActivityService>,
    ) -> Self {
        Self {
            rooms,
            sessions,
            courses,
            video,
            activity,
        }
    }

    // ---- Rooms ----

    /// Create a room on the video service, then store it
    pub async fn create_room(&self, actor: &User, input: CreateRoomInput) -> ServiceResult<Room> {
        if !actor.is_teacher() {
            return Err(ServiceError::forbidden("Only teachers can create rooms"));
        }
        let name = required(&input.name)?;
        if let Some(course_id) = input.course_id {
            self.courses
                .get_by_id(course_id)
                .await?
                .ok_or(ServiceError::NotFound("Course"))?;
        }

        let video_room = format!("room-{}", Uuid::new_v4());
        self.video.create_room(&video_room).await?;

        let created = self
            .rooms
            .create(&Room {
                id: 0,
                name,
                description: input.description.filter(|d| !d.trim().is_empty()),
                course_id: input.course_id,
                creator_id: actor.id,
                video_room: video_room.clone(),
                is_active: true,
                created_at: Utc::now(),
            })
            .await;
        let room = match created {
            Ok(room) => room,
            Err(e) => {
                self.delete_remote_room(&video_room).await;
                return Err(e.into());
            }
        };

        tracing::info!(room_id = room.id, creator_id = actor.id, "Room created");
        Ok(room)
    }

    /// Rooms the caller created or joined
    pub async fn list_rooms(&self, actor: &User) -> ServiceResult<Vec<Room>> {
        Ok(self.rooms.list_for_user(actor.id).await?)
    }

    pub async fn get_room(&self, id: i64) -> ServiceResult<RoomDetail> {
        let room = self.find_room(id).await?;
        let members = self.rooms.members(id).await?;
        Ok(RoomDetail { room, members })
    }

    /// Join an active room; returns false when already a member
    pub async fn join_room(&self, actor: &User, id: i64) -> ServiceResult<bool> {
        let room = self.find_room(id).await?;
        if !room.is_active {
            return Err(ServiceError::Conflict("Room is no longer active".to_string()));
        }
        Ok(self.rooms.add_member(id, actor.id).await?)
    }

    pub async fn leave_room(&self, actor: &User, id: i64) -> ServiceResult<()> {
        self.find_room(id).await?;
        self.rooms.remove_member(id, actor.id).await?;
        Ok(())
    }

    pub async fn room_token(&self, actor: &User, id: i64) -> ServiceResult<JoinToken> {
        let room = self.find_room(id).await?;
        let is_host = actor.can_edit(room.creator_id);

        if !is_host && !self.rooms.is_member(id, actor.id).await? {
            return Err(ServiceError::forbidden("Join the room before requesting a token"));
        }

        self.join_token(actor, &room.video_room, is_host)
    }

    pub async fn delete_room(&self, actor: &User, id: i64) -> ServiceResult<()> {
        let room = self.find_room(id).await?;
        if !actor.can_edit(room.creator_id) {
            return Err(ServiceError::forbidden("Only the room creator can delete this room"));
        }

        self.delete_remote_room(&room.video_room).await;
        self.rooms.delete(id).await?;
        tracing::info!(room_id = id, actor_id = actor.id, "Room deleted");
        Ok(())
    }

    // ---- Live sessions ----

    /// Schedule a live class for a course the caller teaches
    pub async fn create_session(&self, actor: &User, input: CreateLiveSessionInput) -> ServiceResult<LiveSession> {
        if !actor.is_teacher() {
            return Err(ServiceError::forbidden("Only teachers can schedule live sessions"));
        }
        let name = required(&input.name)?;
        let course = self
            .courses
            .get_by_id(input.course_id)
            .await?
            .ok_or(ServiceError::NotFound("Course"))?;
        if !actor.can_edit(course.author_id) {
            return Err(ServiceError::forbidden("Only the course author can schedule sessions for it"));
        }

        let session = self
            .sessions
            .create(&LiveSession {
                id: 0,
                name,
                description: input.description.filter(|d| !d.trim().is_empty()),
                course_id: course.id,
                creator_id: actor.id,
                video_room: format!("live-{}", Uuid::new_v4()),
                status: LiveSessionStatus::Scheduled,
                scheduled_at: input.scheduled_at,
                started_at: None,
                ended_at: None,
                created_at: Utc::now(),
            })
            .await?;

        tracing::info!(session_id = session.id, course_id = course.id, "Live session scheduled");
        Ok(session)
    }

    pub async fn list_for_course(&self, course_id: i64) -> ServiceResult<Vec<LiveSession>> {
        Ok(self.sessions.list_by_course(course_id).await?)
    }

    /// Sessions not yet ended that the caller hosts or can attend
    pub async fn list_upcoming(&self, actor: &User) -> ServiceResult<Vec<LiveSession>> {
        Ok(self.sessions.list_upcoming_for_user(actor.id).await?)
    }

    pub async fn get_session(&self, id: i64) -> ServiceResult<LiveSessionDetail> {
        let session = self.find_session(id).await?;
        let participants = self.sessions.participants(id).await?;
        Ok(LiveSessionDetail { session, participants })
    }

    /// Become a participant; requires enrollment in the course
    pub async fn register(&self, actor: &User, id: i64) -> ServiceResult<bool> {
        let session = self.find_session(id).await?;
        if session.status == LiveSessionStatus::Ended {
            return Err(ServiceError::Conflict("Live session has ended".to_string()));
        }

        let course = self
            .courses
            .get_by_id(session.course_id)
            .await?
            .ok_or(ServiceError::NotFound("Course"))?;
        let enrolled = self.courses.is_enrolled(course.id, actor.id).await?;
        if !enrolled && !actor.can_edit(course.author_id) {
            return Err(ServiceError::forbidden("Join the course before registering for its sessions"));
        }

        let added = self.sessions.add_participant(id, actor.id).await?;
        if added {
            if let Err(e) = self
                .activity
                .record_fixed(actor.id, ActivityType::JoinLiveSession, Some(id), Some(session.name.clone()))
                .await
            {
                tracing::warn!(user_id = actor.id, session_id = id, error = %e, "Failed to record live session activity");
            }
        }
        Ok(added)
    }

    /// SCHEDULED -> LIVE; opens the room on the video service
    pub async fn start(&self, actor: &User, id: i64) -> ServiceResult<LiveSession> {
        let session = self.hosted_session(actor, id).await?;
        if session.status != LiveSessionStatus::Scheduled {
            return Err(ServiceError::Conflict(format!(
                "Cannot start a session that is {}",
                session.status
            )));
        }

        self.video.create_room(&session.video_room).await?;
        if let Err(e) = self.sessions.set_status(id, LiveSessionStatus::Live).await {
            self.delete_remote_room(&session.video_room).await;
            return Err(e.into());
        }
        self.find_session(id).await
    }

    /// LIVE -> ENDED; closes the remote room when possible
    pub async fn end(&self, actor: &User, id: i64) -> ServiceResult<LiveSession> {
        let session = self.hosted_session(actor, id).await?;
        if session.status != LiveSessionStatus::Live {
            return Err(ServiceError::Conflict(format!(
                "Cannot end a session that is {}",
                session.status
            )));
        }

        self.delete_remote_room(&session.video_room).await;
        self.sessions.set_status(id, LiveSessionStatus::Ended).await?;
        self.find_session(id).await
    }

    /// Video token for the creator, a participant or an admin
    pub async fn session_token(&self, actor: &User, id: i64) -> ServiceResult<JoinToken> {
        let session = self.find_session(id).await?;
        if session.status == LiveSessionStatus::Ended {
            return Err(ServiceError::Conflict("Live session has ended".to_string()));
        }

        let is_host = actor.can_edit(session.creator_id);
        if !is_host && !self.sessions.is_participant(id, actor.id).await? {
            return Err(ServiceError::forbidden(
                "Only participants can join this live session",
            ));
        }

        self.join_token(actor, &session.video_room, is_host)
    }

    pub async fn delete_session(&self, actor: &User, id: i64) -> ServiceResult<()> {
        let session = self.hosted_session(actor, id).await?;

        self.delete_remote_room(&session.video_room).await;
        self.sessions.delete(id).await?;
        tracing::info!(session_id = id, actor_id = actor.id, "Live session deleted");
        Ok(())
    }

    // ---- Helpers ----

    fn join_token(&self, actor: &User, video_room: &str, is_host: bool) -> ServiceResult<JoinToken> {
        let grants = if is_host {
            VideoGrants::host(video_room)
        } else {
            VideoGrants::participant(video_room)
        };
        let identity = actor.id.to_string();
        let token = self.video.create_token(&identity, &actor.name, grants)?;

        Ok(JoinToken {
            token,
            url: self.video.url(),
            room: video_room.to_string(),
            identity,
        })
    }

    /// Remote delete failures are logged; local cleanup goes on regardless
    async fn delete_remote_room(&self, video_room: &str) {
        if let Err(e) = self.video.delete_room(video_room).await {
            tracing::warn!(video_room, error = %e, "Failed to delete remote video room, continuing");
        }
    }

    async fn find_room(&self, id: i64) -> ServiceResult<Room> {
        self.rooms
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Room"))
    }

    async fn find_session(&self, id: i64) -> ServiceResult<LiveSession> {
        self.sessions
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Live session"))
    }

    async fn hosted_session(&self, actor: &User, id: i64) -> ServiceResult<LiveSession> {
        let session = self.find_session(id).await?;
        if !actor.can_edit(session.creator_id) {
            return Err(ServiceError::forbidden("Only the session creator can manage this session"));
        }
        Ok(session)
    }
}

fn required(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::validation("Name cannot be empty"));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCourseRepository, SqlxLiveSessionRepository, SqlxRoomRepository};
    use crate::db::test_utils::setup_pool;
    use crate::db::DbPool;
    use crate::integrations::fakes::FakeVideo;
    use crate::models::UserRole;
    use crate::services::test_support::{activity_service, create_course, create_user};
    use chrono::Duration;

    async fn setup(video: Arc<FakeVideo>) -> (DbPool, LiveService) {
        let pool = setup_pool().await;
        let service = LiveService::new(
            SqlxRoomRepository::boxed(pool.clone()),
            SqlxLiveSessionRepository::boxed(pool.clone()),
            SqlxCourseRepository::boxed(pool.clone()),
            video,
            activity_service(&pool),
        );
        (pool, service)
    }

    fn session_input(course_id: i64) -> CreateLiveSessionInput {
        CreateLiveSessionInput {
            name: "Kelas Percakapan".into(),
            description: None,
            course_id,
            scheduled_at: Utc::now() + Duration::days(1),
        }
    }

    async fn enroll(pool: &DbPool, course_id: i64, user_id: i64) {
        sqlx::query("INSERT INTO course_enrollments (course_id, user_id, joined_at) VALUES (?, ?, ?)")
            .bind(course_id)
            .bind(user_id)
            .bind(Utc::now())
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_non_participant_cannot_get_token() {
        let (pool, service) = setup(Arc::new(FakeVideo::default())).await;
        let guru = create_user(&pool, "Kim", UserRole::Guru).await;
        let admin = create_user(&pool, "Admin", UserRole::Admin).await;
        let murid = create_user(&pool, "Budi", UserRole::Murid).await;
        let stranger = create_user(&pool, "Tono", UserRole::Murid).await;
        let course_id = create_course(&pool, guru.id).await;
        enroll(&pool, course_id, murid.id).await;

        let session = service.create_session(&guru, session_input(course_id)).await.unwrap();

        assert!(matches!(
            service.session_token(&murid, session.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.session_token(&stranger, session.id).await,
            Err(ServiceError::Forbidden(_))
        ));

        service.register(&murid, session.id).await.unwrap();
        let token = service.session_token(&murid, session.id).await.unwrap();
        assert!(token.token.ends_with(":guest"));
        assert_eq!(token.room, session.video_room);

        let host = service.session_token(&guru, session.id).await.unwrap();
        assert!(host.token.ends_with(":host"));
        assert!(service.session_token(&admin, session.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_register_requires_enrollment_and_awards_once() {
        let (pool, service) = setup(Arc::new(FakeVideo::default())).await;
        let guru = create_user(&pool, "Kim", UserRole::Guru).await;
        let murid = create_user(&pool, "Budi", UserRole::Murid).await;
        let course_id = create_course(&pool, guru.id).await;
        let session = service.create_session(&guru, session_input(course_id)).await.unwrap();

        assert!(matches!(
            service.register(&murid, session.id).await,
            Err(ServiceError::Forbidden(_))
        ));

        enroll(&pool, course_id, murid.id).await;
        assert!(service.register(&murid, session.id).await.unwrap());
        assert!(!service.register(&murid, session.id).await.unwrap());

        let xp: i64 = sqlx::query_scalar("SELECT xp FROM users WHERE id = ?")
            .bind(murid.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(xp, 20);
    }

    #[tokio::test]
    async fn test_only_course_author_schedules() {
        let (pool, service) = setup(Arc::new(FakeVideo::default())).await;
        let guru = create_user(&pool, "Kim", UserRole::Guru).await;
        let other = create_user(&pool, "Lee", UserRole::Guru).await;
        let murid = create_user(&pool, "Budi", UserRole::Murid).await;
        let course_id = create_course(&pool, guru.id).await;

        assert!(matches!(
            service.create_session(&other, session_input(course_id)).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.create_session(&murid, session_input(course_id)).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_start_and_end() {
        let video = Arc::new(FakeVideo::default());
        let (pool, service) = setup(video.clone()).await;
        let guru = create_user(&pool, "Kim", UserRole::Guru).await;
        let course_id = create_course(&pool, guru.id).await;
        let session = service.create_session(&guru, session_input(course_id)).await.unwrap();

        assert!(matches!(
            service.end(&guru, session.id).await,
            Err(ServiceError::Conflict(_))
        ));

        let live = service.start(&guru, session.id).await.unwrap();
        assert_eq!(live.status, LiveSessionStatus::Live);
        assert!(live.started_at.is_some());
        assert_eq!(video.created.lock().unwrap().as_slice(), &[session.video_room.clone()]);

        let ended = service.end(&guru, session.id).await.unwrap();
        assert_eq!(ended.status, LiveSessionStatus::Ended);
        assert!(ended.ended_at.is_some());

        assert!(matches!(
            service.session_token(&guru, session.id).await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_continues_when_remote_delete_fails() {
        let (pool, service) = setup(Arc::new(FakeVideo::failing_delete())).await;
        let guru = create_user(&pool, "Kim", UserRole::Guru).await;
        let murid = create_user(&pool, "Budi", UserRole::Murid).await;
        let course_id = create_course(&pool, guru.id).await;
        let session = service.create_session(&guru, session_input(course_id)).await.unwrap();

        assert!(matches!(
            service.delete_session(&murid, session.id).await,
            Err(ServiceError::Forbidden(_))
        ));

        service.delete_session(&guru, session.id).await.unwrap();
        assert!(matches!(
            service.get_session(session.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remote_room_removed_when_local_write_fails() {
        let video = Arc::new(FakeVideo::default());
        let (pool, service) = setup(video.clone()).await;
        let guru = create_user(&pool, "Kim", UserRole::Guru).await;
        let course_id = create_course(&pool, guru.id).await;
        let session = service.create_session(&guru, session_input(course_id)).await.unwrap();

        for trigger in [
            "CREATE TRIGGER rooms_down BEFORE INSERT ON rooms BEGIN SELECT RAISE(ABORT, 'rooms down'); END",
            "CREATE TRIGGER sessions_down BEFORE UPDATE ON live_sessions BEGIN SELECT RAISE(ABORT, 'sessions down'); END",
        ] {
            sqlx::query(trigger).execute(&pool).await.unwrap();
        }

        assert!(service
            .create_room(&guru, CreateRoomInput { name: "Belajar".into(), description: None, course_id: None })
            .await
            .is_err());
        assert!(service.start(&guru, session.id).await.is_err());

        let created = video.created.lock().unwrap().clone();
        assert_eq!(created.len(), 2);
        assert_eq!(video.deleted.lock().unwrap().as_slice(), created.as_slice());
        assert_eq!(
            service.get_session(session.id).await.unwrap().session.status,
            LiveSessionStatus::Scheduled
        );
    }

    #[tokio::test]
    async fn test_room_flow() {
        let video = Arc::new(FakeVideo::default());
        let (pool, service) = setup(video.clone()).await;
        let guru = create_user(&pool, "Kim", UserRole::Guru).await;
        let murid = create_user(&pool, "Budi", UserRole::Murid).await;

        assert!(matches!(
            service
                .create_room(&murid, CreateRoomInput { name: "x".into(), description: None, course_id: None })
                .await,
            Err(ServiceError::Forbidden(_))
        ));

        let room = service
            .create_room(&guru, CreateRoomInput { name: "Belajar".into(), description: None, course_id: None })
            .await
            .unwrap();
        assert_eq!(video.created.lock().unwrap().len(), 1);

        assert!(matches!(
            service.room_token(&murid, room.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(service.join_room(&murid, room.id).await.unwrap());
        assert!(service.room_token(&murid, room.id).await.is_ok());
        assert_eq!(service.list_rooms(&murid).await.unwrap().len(), 1);

        service.delete_room(&guru, room.id).await.unwrap();
        assert_eq!(video.deleted.lock().unwrap().as_slice(), &[room.video_room.clone()]);
    }
}
