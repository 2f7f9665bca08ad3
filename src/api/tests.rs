//! Router-level tests: guards, status codes and error bodies

use super::*;
use crate::cache::MemoryCache;
use crate::config::Config;
use crate::db::repositories::{
    ArticleRepository, SessionRepository, SqlxArticleRepository, SqlxCourseRepository,
    SqlxDrawingRepository, SqlxLiveSessionRepository, SqlxPushRepository, SqlxRoomRepository,
    SqlxSessionRepository, SqlxTryoutRepository, SqlxUserRepository, SqlxVocabularyRepository,
};
use crate::db::test_utils::setup_pool;
use crate::db::DbPool;
use crate::integrations::fakes::{FakeChat, FakeDictionary, FakePush, FakeTranslator, FakeVideo};
use crate::models::{Session, User, UserRole};
use crate::services::test_support::{activity_service, create_course, create_user};
use crate::services::{
    AdminService, ArticleService, CourseService, DictionaryService, DrawingService, LiveService,
    LoginRateLimiter, MobileTokenService, PushService, TryoutService, UploadService, UserService,
    VocabularyService,
};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const JWT_SECRET: &str = "router-test-secret";

struct TestApp {
    router: Router,
    pool: DbPool,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_push(FakePush::default()).await
    }

    async fn with_push(push: FakePush) -> Self {
        let pool = setup_pool().await;
        let state = test_state(&pool, push);
        let router = build_router(state, "http://localhost:3000", &Config::default().upload)
            .expect("router");
        Self { router, pool }
    }

    async fn user(&self, name: &str, role: UserRole) -> (User, String) {
        let user = create_user(&self.pool, name, role).await;
        let now = Utc::now();
        let session = SqlxSessionRepository::new(self.pool.clone())
            .create(&Session {
                id: format!("session-{}", user.id),
                user_id: user.id,
                expires_at: now + Duration::days(1),
                created_at: now,
            })
            .await
            .expect("session");
        (user, session.id)
    }

    async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = self.send_raw(method, uri, token, body).await;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn send_raw(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }
}

fn test_state(pool: &DbPool, push: FakePush) -> AppState {
    let config = Config::default();
    let activity = activity_service(pool);
    let cache = Arc::new(MemoryCache::new());
    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let course_repo = SqlxCourseRepository::boxed(pool.clone());
    let article_repo = SqlxArticleRepository::boxed(pool.clone());
    let chat = Arc::new(FakeChat::completing_after(0));

    AppState {
        pool: pool.clone(),
        session_config: Arc::new(config.session.clone()),
        user_service: Arc::new(UserService::new(
            user_repo.clone(),
            SqlxSessionRepository::boxed(pool.clone()),
            activity.clone(),
        )),
        activity_service: activity.clone(),
        mobile_tokens: Arc::new(MobileTokenService::new(JWT_SECRET, 30)),
        rate_limiter: Arc::new(LoginRateLimiter::new()),
        course_service: Arc::new(CourseService::new(course_repo.clone(), cache.clone(), activity.clone())),
        article_service: Arc::new(ArticleService::new(article_repo.clone(), activity.clone())),
        vocabulary_service: Arc::new(VocabularyService::new(
            SqlxVocabularyRepository::boxed(pool.clone()),
            activity.clone(),
        )),
        live_service: Arc::new(LiveService::new(
            SqlxRoomRepository::boxed(pool.clone()),
            SqlxLiveSessionRepository::boxed(pool.clone()),
            course_repo.clone(),
            Arc::new(FakeVideo::default()),
            activity.clone(),
        )),
        tryout_service: Arc::new(TryoutService::new(
            SqlxTryoutRepository::boxed(pool.clone()),
            activity.clone(),
        )),
        push_service: Arc::new(PushService::new(
            SqlxPushRepository::boxed(pool.clone()),
            user_repo.clone(),
            Arc::new(push),
            "BPublicKey".to_string(),
        )),
        drawing_service: Arc::new(DrawingService::new(SqlxDrawingRepository::boxed(pool.clone()))),
        upload_service: Arc::new(UploadService::new(config.upload.clone())),
        dictionary_service: Arc::new(DictionaryService::new(
            Arc::new(FakeDictionary::default()),
            cache.clone(),
            std::time::Duration::from_secs(60),
        )),
        admin_service: Arc::new(AdminService::new(user_repo, course_repo, article_repo, chat.clone())),
        translator: Arc::new(FakeTranslator {
            fragments: vec!["Halo, ".to_string(), "apa kabar?".to_string()],
        }),
        chat,
        request_stats: Arc::new(RequestStats::new()),
    }
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn test_protected_route_requires_session() {
    let app = TestApp::new().await;

    let (status, body) = app.send("GET", "/api/v1/drawings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "UNAUTHORIZED");

    let (status, _) = app.send("GET", "/api/v1/drawings", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_then_mobile_login() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({ "name": "Dewi", "email": "dewi@hakgyo.id", "password": "annyeong123" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], "ADMIN");
    assert!(body["user"].get("password_hash").is_none());

    let (status, body) = app
        .send(
            "POST",
            "/api/v1/mobile/auth/login",
            None,
            Some(json!({ "email": "dewi@hakgyo.id", "password": "annyeong123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = app.send("GET", "/api/v1/mobile/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "dewi@hakgyo.id");

    let (status, body) = app
        .send(
            "POST",
            "/api/v1/mobile/auth/login",
            None,
            Some(json!({ "email": "dewi@hakgyo.id", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Invalid email or password");
}

#[tokio::test]
async fn test_mobile_token_failures() {
    let app = TestApp::new().await;
    let user = create_user(&app.pool, "Budi", UserRole::Murid).await;

    let (status, body) = app.send("GET", "/api/v1/mobile/streak", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "UNAUTHORIZED");

    let expired = MobileTokenService::new(JWT_SECRET, -1).issue(&user).unwrap();
    let (status, body) = app.send("GET", "/api/v1/mobile/streak", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "TOKEN_EXPIRED");

    let forged = MobileTokenService::new("other-secret", 30).issue(&user).unwrap();
    let (status, body) = app.send("GET", "/api/v1/mobile/streak", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "UNAUTHORIZED");

    let valid = MobileTokenService::new(JWT_SECRET, 30).issue(&user).unwrap();
    let (status, body) = app.send("GET", "/api/v1/mobile/streak", Some(&valid), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_streak"], 0);

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user.id)
        .execute(&app.pool)
        .await
        .unwrap();
    let (status, body) = app.send("GET", "/api/v1/mobile/me", Some(&valid), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");
}

#[tokio::test]
async fn test_mobile_checkin_awards_xp_once() {
    let app = TestApp::new().await;
    let user = create_user(&app.pool, "Rina", UserRole::Murid).await;
    let token = MobileTokenService::new(JWT_SECRET, 30).issue(&user).unwrap();

    let (status, body) = app.send("POST", "/api/v1/mobile/streak/checkin", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recorded"], true);

    let (_, body) = app.send("POST", "/api/v1/mobile/streak/checkin", Some(&token), None).await;
    assert_eq!(body["recorded"], false);

    let (_, body) = app.send("GET", "/api/v1/mobile/streak", Some(&token), None).await;
    assert_eq!(body["current_streak"], 1);
    assert_eq!(body["active_today"], true);
}

#[tokio::test]
async fn test_non_owner_cannot_delete_article() {
    let app = TestApp::new().await;
    let (_, author) = app.user("Guru Kim", UserRole::Guru).await;
    let (_, other) = app.user("Guru Lee", UserRole::Guru).await;

    let (status, body) = app
        .send(
            "POST",
            "/api/v1/articles",
            Some(&author),
            Some(json!({ "title": "Partikel 은/는", "content": "Penanda **topik**", "is_published": true })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_i64().unwrap();
    let slug = body["slug"].as_str().unwrap().to_string();

    let (status, body) = app
        .send("DELETE", &format!("/api/v1/articles/{}", id), Some(&other), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "FORBIDDEN");

    let (status, body) = app.send("GET", &format!("/api/v1/articles/{}", slug), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["content_html"].as_str().unwrap().contains("<strong>topik</strong>"));

    let (status, _) = app
        .send("DELETE", &format!("/api/v1/articles/{}", id), Some(&author), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(SqlxArticleRepository::new(app.pool.clone())
        .get_by_id(id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_teacher_routes_reject_students() {
    let app = TestApp::new().await;
    let (_, student) = app.user("Murid", UserRole::Murid).await;
    let (_, teacher) = app.user("Guru", UserRole::Guru).await;

    let (status, body) = app
        .send("POST", "/api/v1/rooms", Some(&student), Some(json!({ "name": "Kelas" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "FORBIDDEN");

    let (status, _) = app
        .send("POST", "/api/v1/rooms", Some(&teacher), Some(json!({ "name": "Kelas" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Listing stays open to every logged-in user
    let (status, _) = app.send("GET", "/api/v1/rooms", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_live_session_token_requires_participation() {
    let app = TestApp::new().await;
    let (teacher, teacher_token) = app.user("Guru Park", UserRole::Guru).await;
    let (_, student_token) = app.user("Sari", UserRole::Murid).await;
    let course_id = create_course(&app.pool, teacher.id).await;

    let (status, body) = app
        .send(
            "POST",
            "/api/v1/live-sessions",
            Some(&teacher_token),
            Some(json!({
                "name": "Kelas Live 1",
                "course_id": course_id,
                "scheduled_at": (Utc::now() + Duration::hours(1)).to_rfc3339(),
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_i64().unwrap();
    let token_uri = format!("/api/v1/live-sessions/{}/token", id);

    let (status, body) = app.send("POST", &token_uri, Some(&student_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "FORBIDDEN");

    let (status, body) = app.send("POST", &token_uri, Some(&teacher_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().unwrap().ends_with(":host"));
}

#[tokio::test]
async fn test_gone_push_subscription_is_removed() {
    let app = TestApp::with_push(FakePush::with_gone(&["https://push.test/gone"])).await;
    let (student, student_token) = app.user("Ayu", UserRole::Murid).await;
    let (_, admin_token) = app.user("Admin", UserRole::Admin).await;

    for endpoint in ["https://push.test/gone", "https://push.test/ok"] {
        let (status, _) = app
            .send(
                "POST",
                "/api/v1/push/subscribe",
                Some(&student_token),
                Some(json!({ "endpoint": endpoint, "keys": { "p256dh": "key", "auth": "secret" } })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = app
        .send(
            "POST",
            &format!("/api/v1/admin/notifications/users/{}", student.id),
            Some(&admin_token),
            Some(json!({ "title": "Tryout baru", "body": "Ayo kerjakan!", "url": "/tryouts" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "sent": 1, "failed": 0, "removed": 1 }));

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM push_subscriptions")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(remaining, 1);

    let (status, body) = app.send("GET", "/api/v1/notifications", Some(&student_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["title"], "Tryout baru");

    // Students cannot reach the admin routes
    let (status, _) = app
        .send(
            "POST",
            "/api/v1/admin/notifications/broadcast",
            Some(&student_token),
            Some(json!({ "title": "x", "body": "y" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_translate_streams_plain_text() {
    let app = TestApp::new().await;
    let (_, token) = app.user("Nadia", UserRole::Murid).await;

    let (status, bytes) = app
        .send_raw(
            "POST",
            "/api/v1/translate",
            Some(&token),
            Some(json!({ "text": "안녕하세요, 잘 지내요?" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(bytes).unwrap(), "Halo, apa kabar?");

    let (status, body) = app
        .send("POST", "/api/v1/translate", Some(&token), Some(json!({ "text": "   " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_dictionary_returns_xml() {
    let app = TestApp::new().await;
    let (_, token) = app.user("Tono", UserRole::Murid).await;

    let (status, bytes) = app
        .send_raw("GET", "/api/v1/dictionary?q=%EC%82%AC%EB%9E%91", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(bytes).unwrap().contains("<word>사랑</word>"));

    let (status, _) = app.send_raw("GET", "/api/v1/dictionary?q=", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_stats_and_self_delete() {
    let app = TestApp::new().await;
    let (admin, admin_token) = app.user("Admin", UserRole::Admin).await;
    let (_, student_token) = app.user("Murid", UserRole::Murid).await;

    let (status, _) = app.send("GET", "/api/v1/admin/stats", Some(&student_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send("GET", "/api/v1/admin/stats", Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"], 2);
    assert_eq!(body["users_by_role"]["MURID"], 1);
    assert!(body["requests"]["total_requests"].as_u64().unwrap() >= 1);

    let (status, body) = app
        .send("DELETE", &format!("/api/v1/admin/users/{}", admin.id), Some(&admin_token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "CONFLICT");
}

#[tokio::test]
async fn test_course_catalogue_is_public() {
    let app = TestApp::new().await;
    let (teacher, _) = app.user("Guru", UserRole::Guru).await;
    create_course(&app.pool, teacher.id).await;

    let (status, body) = app.send("GET", "/api/v1/courses", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["author_name"], "Guru");
}
