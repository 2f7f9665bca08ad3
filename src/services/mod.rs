//! Services layer - Business logic
//!
//! Services own the authorization rules and coordinate repositories, the
//! cache and the external integrations. Handlers stay thin and only map
//! service errors to HTTP responses.

pub mod activity;
pub mod admin;
pub mod article;
pub mod course;
pub mod dictionary;
pub mod drawing;
pub mod error;
pub mod live;
pub mod markdown;
pub mod mobile_token;
pub mod password;
pub mod push;
pub mod rate_limiter;
pub mod tryout;
pub mod upload;
pub mod user;
pub mod vocabulary;

pub use activity::ActivityService;
pub use admin::{AdminService, PlatformStats};
pub use article::{generate_slug, ArticleService, ArticleServiceError};
pub use course::CourseService;
pub use dictionary::DictionaryService;
pub use drawing::DrawingService;
pub use error::{ServiceError, ServiceResult};
pub use live::LiveService;
pub use markdown::MarkdownRenderer;
pub use mobile_token::{MobileClaims, MobileTokenService, TokenError};
pub use password::{hash_password, verify_password};
pub use push::PushService;
pub use rate_limiter::LoginRateLimiter;
pub use tryout::TryoutService;
pub use upload::{StoredFile, UploadService};
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
pub use vocabulary::VocabularyService;
