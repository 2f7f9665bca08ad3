//! Hakgyo - Korean learning platform backend

use anyhow::Result;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hakgyo::{
    api::{self, AppState, RequestStats},
    cache::create_cache,
    config::Config,
    db::{
        self,
        repositories::{
            SqlxActivityRepository, SqlxArticleRepository, SqlxCourseRepository,
            SqlxDrawingRepository, SqlxLiveSessionRepository, SqlxPushRepository,
            SqlxRoomRepository, SqlxSessionRepository, SqlxTryoutRepository, SqlxUserRepository,
            SqlxVocabularyRepository,
        },
    },
    integrations::{KrDictClient, LiveKitService, OpenAiTranslator, StreamChatService, WebPushGateway},
    services::{
        ActivityService, AdminService, ArticleService, CourseService, DictionaryService,
        DrawingService, LiveService, LoginRateLimiter, MobileTokenService, PushService,
        TryoutService, UploadService, UserService, VocabularyService,
    },
};

const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hakgyo=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Hakgyo...");

    // Load configuration
    let mut config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    if config.mobile.jwt_secret.is_empty() {
        tracing::warn!("mobile.jwt_secret is not set; using a random secret, mobile tokens will not survive a restart");
        config.mobile.jwt_secret = uuid::Uuid::new_v4().to_string();
    }

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {}", config.database.url);

    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!(applied, "Database migrations completed");

    let cache = create_cache(&config.cache);

    // External services; unconfigured ones answer 503 on use
    let video = Arc::new(LiveKitService::new(config.video.clone())?);
    let chat = Arc::new(StreamChatService::new(config.chat.clone())?);
    let translator = Arc::new(OpenAiTranslator::new(config.translation.clone())?);
    let dictionary = Arc::new(KrDictClient::new(config.dictionary.clone())?);
    let push_gateway = Arc::new(WebPushGateway::new(config.push.clone())?);
    for (name, configured) in [
        ("video", config.video.is_configured()),
        ("chat", config.chat.is_configured()),
        ("translation", config.translation.is_configured()),
        ("dictionary", config.dictionary.is_configured()),
        ("push", config.push.is_configured()),
    ] {
        if !configured {
            tracing::warn!(integration = name, "Integration not configured");
        }
    }

    // Create repositories
    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let course_repo = SqlxCourseRepository::boxed(pool.clone());
    let article_repo = SqlxArticleRepository::boxed(pool.clone());

    // Initialize services
    let activity_service = Arc::new(ActivityService::new(
        user_repo.clone(),
        SqlxActivityRepository::boxed(pool.clone()),
        config.streak.utc_offset_hours,
    ));
    let user_service = Arc::new(UserService::with_session_expiration(
        user_repo.clone(),
        SqlxSessionRepository::boxed(pool.clone()),
        activity_service.clone(),
        config.session.expiration_days,
    ));
    let course_service = Arc::new(CourseService::new(
        course_repo.clone(),
        cache.clone(),
        activity_service.clone(),
    ));
    let article_service = Arc::new(ArticleService::new(article_repo.clone(), activity_service.clone()));
    let vocabulary_service = Arc::new(VocabularyService::new(
        SqlxVocabularyRepository::boxed(pool.clone()),
        activity_service.clone(),
    ));
    let live_service = Arc::new(LiveService::new(
        SqlxRoomRepository::boxed(pool.clone()),
        SqlxLiveSessionRepository::boxed(pool.clone()),
        course_repo.clone(),
        video,
        activity_service.clone(),
    ));
    let tryout_service = Arc::new(TryoutService::new(
        SqlxTryoutRepository::boxed(pool.clone()),
        activity_service.clone(),
    ));
    let push_service = Arc::new(PushService::new(
        SqlxPushRepository::boxed(pool.clone()),
        user_repo.clone(),
        push_gateway,
        config.push.vapid_public_key.clone(),
    ));
    let dictionary_service = Arc::new(DictionaryService::new(
        dictionary,
        cache.clone(),
        Duration::from_secs(config.dictionary.cache_ttl_seconds),
    ));
    let admin_service = Arc::new(
        AdminService::new(user_repo, course_repo, article_repo, chat.clone()).with_polling(
            Duration::from_millis(config.chat.poll_interval_ms),
            config.chat.max_poll_attempts,
        ),
    );
    let rate_limiter = Arc::new(LoginRateLimiter::new());

    // Build application state
    let state = AppState {
        pool: pool.clone(),
        session_config: Arc::new(config.session.clone()),
        user_service: user_service.clone(),
        activity_service,
        mobile_tokens: Arc::new(MobileTokenService::new(
            &config.mobile.jwt_secret,
            config.mobile.token_expiry_days,
        )),
        rate_limiter: rate_limiter.clone(),
        course_service,
        article_service,
        vocabulary_service,
        live_service,
        tryout_service,
        push_service,
        drawing_service: Arc::new(DrawingService::new(SqlxDrawingRepository::boxed(pool.clone()))),
        upload_service: Arc::new(UploadService::new(config.upload.clone())),
        dictionary_service,
        admin_service,
        translator,
        chat,
        request_stats: Arc::new(RequestStats::new()),
    };

    // Purge expired sessions every hour
    {
        let users = user_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                match users.cleanup_expired_sessions().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!(removed, "Expired sessions purged"),
                    Err(e) => tracing::warn!("Session cleanup failed: {}", e),
                }
            }
        });
    }

    // Start rate limiter cleanup task (runs every 5 minutes)
    {
        let limiter = rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                limiter.cleanup().await;
            }
        });
    }

    // Build router
    let app = api::build_router(state, &config.server.cors_origin, &config.upload)?;

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
