//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository owns the SQL for one aggregate.

pub mod activity;
pub mod article;
pub mod course;
pub mod drawing;
pub mod live;
pub mod push;
pub mod session;
pub mod tryout;
pub mod user;
pub mod vocabulary;

pub use activity::{ActivityRepository, SqlxActivityRepository};
pub use article::{ArticleRepository, SqlxArticleRepository};
pub use course::{CourseFilter, CourseRepository, SqlxCourseRepository};
pub use drawing::{DrawingRepository, SqlxDrawingRepository};
pub use live::{LiveSessionRepository, RoomRepository, SqlxLiveSessionRepository, SqlxRoomRepository};
pub use push::{PushRepository, SqlxPushRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use tryout::{AttemptStart, SqlxTryoutRepository, TryoutRepository};
pub use user::{SqlxUserRepository, UserRepository};
pub use vocabulary::{SqlxVocabularyRepository, VocabularyRepository};
