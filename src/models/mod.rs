//! Data models
//!
//! Database entities, request inputs and response shapes.

mod activity;
mod article;
mod course;
mod drawing;
mod live;
mod pagination;
mod push;
mod session;
pub mod tryout;
mod user;
pub mod vocabulary;

pub use activity::{
    effective_streak, local_date, next_streak, tryout_xp, ActivityLog, ActivityOutcome,
    ActivityType, StreakInfo, UserProgress,
};
pub use article::{Article, ArticleWithAuthor, CreateArticleInput, UpdateArticleInput};
pub use course::{
    Course, CourseDetail, CourseLevel, CourseProgress, CourseSummary, CreateCourseInput,
    CreateModuleInput, Module, UpdateCourseInput, UpdateModuleInput,
};
pub use drawing::{Drawing, DrawingSummary, SaveDrawingInput, UpdateDrawingInput};
pub use live::{
    CreateLiveSessionInput, CreateRoomInput, JoinToken, LiveSession, LiveSessionDetail,
    LiveSessionStatus, Participant, Room, RoomDetail,
};
pub use pagination::{ListParams, PagedResult};
pub use push::{
    DeliveryReport, Notification, NotificationMessage, PushSubscription, SubscribeInput,
    SubscriptionKeys,
};
pub use session::Session;
pub use tryout::{
    AnswerReview, AttemptAnswer, AttemptResult, AttemptSheet, Difficulty, OptionInput, PublicQuestion,
    Question, QuestionBank, QuestionCollection, QuestionInput, QuestionOption, SubmitAnswersInput, Tryout,
    TryoutAttempt, TryoutInput, TryoutLeaderboardEntry,
};
pub use user::{
    AdminUpdateUserInput, LeaderboardEntry, UpdateProfileInput, User, UserPlan, UserRole,
    XP_PER_LEVEL,
};
pub use vocabulary::{
    contains_hangul, CollectionDetail, CollectionSummary, VocabularyCollection, VocabularyItem, VocabularyItemType,
};
