//! Course service
//!
//! Courses, their ordered modules, enrollment and completion tracking.
//! The public catalogue is cached; any write to a course or its modules
//! drops the cached pages.

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::{CourseFilter, CourseRepository};
use crate::models::{
    ActivityType, Course, CourseDetail, CourseProgress, CourseSummary, CreateCourseInput,
    CreateModuleInput, ListParams, Module, PagedResult, UpdateCourseInput, UpdateModuleInput, User,
};
use crate::services::activity::ActivityService;
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::markdown::MarkdownRenderer;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

const CATALOGUE_PREFIX: &str = "courses:";

pub struct CourseService {
    repo: Arc<dyn CourseRepository>,
    cache: Arc<MemoryCache>,
    renderer: MarkdownRenderer,
    activity: Arc<ActivityService>,
}

impl CourseService {
    pub fn new(
        repo: Arc<dyn CourseRepository>,
        cache: Arc<MemoryCache>,
        activity: Arc<ActivityService>,
    ) -> Self {
        Self {
            repo,
            cache,
            renderer: MarkdownRenderer::new(),
            activity,
        }
    }

    /// Published courses, newest first
    pub async fn list_public(&self, params: &ListParams) -> ServiceResult<PagedResult<CourseSummary>> {
        let key = format!("{}public:{}:{}", CATALOGUE_PREFIX, params.page, params.per_page);
        match self.cache.get::<PagedResult<CourseSummary>>(&key).await {
            Ok(Some(page)) => return Ok(page),
            Ok(None) => {}
            Err(e) => tracing::warn!(key = %key, error = %e, "Ignoring unreadable catalogue cache entry"),
        }

        let filter = CourseFilter {
            published_only: true,
            author_id: None,
        };
        let (items, total) = self.repo.list(params, filter).await?;
        let page = PagedResult::new(items, total, params);

        if let Err(e) = self.cache.set(&key, &page, self.cache.default_ttl()).await {
            tracing::warn!(key = %key, error = %e, "Failed to cache course catalogue");
        }
        Ok(page)
    }

    /// Courses authored by the caller, drafts included
    pub async fn list_authored(&self, actor: &User, params: &ListParams) -> ServiceResult<PagedResult<CourseSummary>> {
        let filter = CourseFilter {
            published_only: false,
            author_id: Some(actor.id),
        };
        let (items, total) = self.repo.list(params, filter).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn list_enrolled(&self, actor: &User) -> ServiceResult<Vec<CourseSummary>> {
        Ok(self.repo.list_enrolled(actor.id).await?)
    }

    pub async fn create(&self, actor: &User, input: CreateCourseInput) -> ServiceResult<Course> {
        if !actor.is_teacher() {
            return Err(ServiceError::forbidden("Only teachers can create courses"));
        }
        let title = required(&input.title, "Title")?;

        let now = Utc::now();
        let course = self
            .repo
            .create(&Course {
                id: 0,
                title,
                description: input.description.trim().to_string(),
                level: input.level,
                thumbnail: input.thumbnail,
                author_id: actor.id,
                is_published: input.is_published,
                is_premium: input.is_premium,
                created_at: now,
                updated_at: now,
            })
            .await?;

        self.invalidate_catalogue().await;
        tracing::info!(course_id = course.id, author_id = actor.id, "Course created");
        Ok(course)
    }

    /// Course with modules; drafts are only visible to their author and admins
    pub async fn get_detail(&self, actor: Option<&User>, id: i64) -> ServiceResult<CourseDetail> {
        let course = self.visible_course(actor, id).await?;
        let modules = self.repo.list_modules(id).await?;
        let enrolled = match actor {
            Some(user) => self.repo.is_enrolled(id, user.id).await?,
            None => false,
        };
        let member_count = self.repo.member_count(id).await?;

        Ok(CourseDetail {
            course,
            modules,
            enrolled,
            member_count,
        })
    }

    pub async fn update(&self, actor: &User, id: i64, input: UpdateCourseInput) -> ServiceResult<Course> {
        let mut course = self.editable_course(actor, id).await?;

        if let Some(title) = input.title {
            course.title = required(&title, "Title")?;
        }
        if let Some(description) = input.description {
            course.description = description.trim().to_string();
        }
        if let Some(level) = input.level {
            course.level = level;
        }
        if let Some(thumbnail) = input.thumbnail {
            course.thumbnail = Some(thumbnail).filter(|t| !t.trim().is_empty());
        }
        if let Some(published) = input.is_published {
            course.is_published = published;
        }
        if let Some(premium) = input.is_premium {
            course.is_premium = premium;
        }

        let course = self.repo.update(&course).await?;
        self.invalidate_catalogue().await;
        Ok(course)
    }

    pub async fn delete(&self, actor: &User, id: i64) -> ServiceResult<()> {
        self.editable_course(actor, id).await?;
        self.repo.delete(id).await?;
        self.invalidate_catalogue().await;
        tracing::info!(course_id = id, actor_id = actor.id, "Course deleted");
        Ok(())
    }

    pub async fn add_module(&self, actor: &User, course_id: i64, input: CreateModuleInput) -> ServiceResult<Module> {
        self.editable_course(actor, course_id).await?;
        let title = required(&input.title, "Title")?;

        let now = Utc::now();
        let module = self
            .repo
            .append_module(&Module {
                id: 0,
                course_id,
                title,
                description: input.description.trim().to_string(),
                content_html: self.renderer.render(&input.content),
                content: input.content,
                position: 0,
                created_at: now,
                updated_at: now,
            })
            .await?;

        self.invalidate_catalogue().await;
        Ok(module)
    }

    pub async fn update_module(&self, actor: &User, module_id: i64, input: UpdateModuleInput) -> ServiceResult<Module> {
        let mut module = self.get_module(module_id).await?;
        self.editable_course(actor, module.course_id).await?;

        if let Some(title) = input.title {
            module.title = required(&title, "Title")?;
        }
        if let Some(description) = input.description {
            module.description = description.trim().to_string();
        }
        if let Some(content) = input.content {
            module.content_html = self.renderer.render(&content);
            module.content = content;
        }

        Ok(self.repo.update_module(&module).await?)
    }

    pub async fn delete_module(&self, actor: &User, module_id: i64) -> ServiceResult<()> {
        let module = self.get_module(module_id).await?;
        self.editable_course(actor, module.course_id).await?;
        self.repo.delete_module(&module).await?;
        self.invalidate_catalogue().await;
        Ok(())
    }

    /// Reorder modules; `ordered_ids` must list every module of the course exactly once
    pub async fn reorder_modules(&self, actor: &User, course_id: i64, ordered_ids: &[i64]) -> ServiceResult<Vec<Module>> {
        self.editable_course(actor, course_id).await?;

        let current: HashSet<i64> = self
            .repo
            .list_modules(course_id)
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect();
        let requested: HashSet<i64> = ordered_ids.iter().copied().collect();

        if requested.len() != ordered_ids.len() || requested != current {
            return Err(ServiceError::validation(
                "Module order must list every module of the course exactly once",
            ));
        }

        self.repo.reorder_modules(course_id, ordered_ids).await?;
        Ok(self.repo.list_modules(course_id).await?)
    }

    /// Enroll in a published course; returns false when already enrolled
    pub async fn join(&self, actor: &User, course_id: i64) -> ServiceResult<bool> {
        let course = self
            .repo
            .get_by_id(course_id)
            .await?
            .filter(|c| c.is_published)
            .ok_or(ServiceError::NotFound("Course"))?;

        if course.is_premium && !actor.has_premium_access() {
            return Err(ServiceError::forbidden("This course requires a premium plan"));
        }

        Ok(self.repo.enroll(course_id, actor.id).await?)
    }

    /// Mark a module complete for an enrolled learner
    pub async fn complete_module(&self, actor: &User, module_id: i64) -> ServiceResult<CourseProgress> {
        let module = self.get_module(module_id).await?;

        if !self.repo.is_enrolled(module.course_id, actor.id).await? {
            return Err(ServiceError::forbidden("Join the course before completing its modules"));
        }

        if self.repo.complete_module(module_id, actor.id).await? {
            self.activity
                .record_fixed(
                    actor.id,
                    ActivityType::CompleteModule,
                    Some(module_id),
                    Some(module.title.clone()),
                )
                .await?;
        }

        self.progress(actor, module.course_id).await
    }

    pub async fn progress(&self, actor: &User, course_id: i64) -> ServiceResult<CourseProgress> {
        self.visible_course(Some(actor), course_id).await?;
        let total = self.repo.list_modules(course_id).await?.len();
        let completed = self.repo.completed_module_ids(course_id, actor.id).await?;
        Ok(CourseProgress::new(course_id, completed, total))
    }

    /// Course the caller may read
    pub async fn visible_course(&self, actor: Option<&User>, id: i64) -> ServiceResult<Course> {
        let course = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Course"))?;

        let can_see_draft = actor.is_some_and(|u| u.can_edit(course.author_id));
        if !course.is_published && !can_see_draft {
            return Err(ServiceError::NotFound("Course"));
        }
        Ok(course)
    }

    /// Course the caller may modify (author or admin)
    pub async fn editable_course(&self, actor: &User, id: i64) -> ServiceResult<Course> {
        let course = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Course"))?;

        if !actor.can_edit(course.author_id) {
            return Err(ServiceError::forbidden("Only the course author can modify this course"));
        }
        Ok(course)
    }

    async fn get_module(&self, id: i64) -> ServiceResult<Module> {
        self.repo
            .get_module(id)
            .await?
            .ok_or(ServiceError::NotFound("Module"))
    }

    async fn invalidate_catalogue(&self) {
        if let Err(e) = self.cache.delete_pattern(&format!("{}*", CATALOGUE_PREFIX)).await {
            tracing::warn!(error = %e, "Failed to invalidate course catalogue cache");
        }
    }
}

fn required(value: &str, field: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation(format!("{} cannot be empty", field)));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxCourseRepository;
    use crate::db::test_utils::setup_pool;
    use crate::db::DbPool;
    use crate::models::{CourseLevel, UserPlan, UserRole};
    use crate::services::test_support::{activity_service, create_user};

    async fn setup() -> (DbPool, CourseService) {
        let pool = setup_pool().await;
        let service = CourseService::new(
            SqlxCourseRepository::boxed(pool.clone()),
            Arc::new(MemoryCache::new()),
            activity_service(&pool),
        );
        (pool, service)
    }

    fn course_input(title: &str, published: bool) -> CreateCourseInput {
        CreateCourseInput {
            title: title.to_string(),
            description: "Belajar hangul".to_string(),
            level: CourseLevel::Beginner,
            thumbnail: None,
            is_published: published,
            is_premium: false,
        }
    }

    fn module_input(title: &str) -> CreateModuleInput {
        CreateModuleInput {
            title: title.to_string(),
            description: String::new(),
            content: "# 안녕하세요\n\nHalo".to_string(),
        }
    }

    #[tokio::test]
    async fn test_murid_cannot_create_course() {
        let (pool, service) = setup().await;
        let murid = create_user(&pool, "Budi", UserRole::Murid).await;

        let result = service.create(&murid, course_input("Hangul", true)).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_drafts_hidden_from_others() {
        let (pool, service) = setup().await;
        let guru = create_user(&pool, "Kim", UserRole::Guru).await;
        let murid = create_user(&pool, "Budi", UserRole::Murid).await;
        let draft = service.create(&guru, course_input("Draft", false)).await.unwrap();

        assert!(service.get_detail(Some(&guru), draft.id).await.is_ok());
        assert!(matches!(
            service.get_detail(Some(&murid), draft.id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.get_detail(None, draft.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_catalogue_is_invalidated_on_write() {
        let (pool, service) = setup().await;
        let guru = create_user(&pool, "Kim", UserRole::Guru).await;
        let params = ListParams::default();

        service.create(&guru, course_input("One", true)).await.unwrap();
        assert_eq!(service.list_public(&params).await.unwrap().total, 1);

        let two = service.create(&guru, course_input("Two", true)).await.unwrap();
        assert_eq!(service.list_public(&params).await.unwrap().total, 2);

        service
            .update(
                &guru,
                two.id,
                UpdateCourseInput {
                    is_published: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(service.list_public(&params).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_only_author_or_admin_edits() {
        let (pool, service) = setup().await;
        let admin = create_user(&pool, "Admin", UserRole::Admin).await;
        let guru = create_user(&pool, "Kim", UserRole::Guru).await;
        let other = create_user(&pool, "Lee", UserRole::Guru).await;
        let course = service.create(&guru, course_input("Hangul", true)).await.unwrap();

        let result = service.add_module(&other, course.id, module_input("Intro")).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));

        service.add_module(&admin, course.id, module_input("Intro")).await.unwrap();
        assert!(matches!(
            service.delete(&other, course.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        service.delete(&admin, course.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_module_rendering_and_reorder() {
        let (pool, service) = setup().await;
        let guru = create_user(&pool, "Kim", UserRole::Guru).await;
        let course = service.create(&guru, course_input("Hangul", true)).await.unwrap();

        let a = service.add_module(&guru, course.id, module_input("A")).await.unwrap();
        let b = service.add_module(&guru, course.id, module_input("B")).await.unwrap();
        assert!(a.content_html.contains("<h1>"));
        assert_eq!((a.position, b.position), (1, 2));

        let reordered = service.reorder_modules(&guru, course.id, &[b.id, a.id]).await.unwrap();
        assert_eq!(reordered[0].id, b.id);

        for bad in [vec![a.id], vec![a.id, a.id], vec![a.id, b.id, 999]] {
            let result = service.reorder_modules(&guru, course.id, &bad).await;
            assert!(matches!(result, Err(ServiceError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_premium_course_requires_plan() {
        let (pool, service) = setup().await;
        let guru = create_user(&pool, "Kim", UserRole::Guru).await;
        let mut murid = create_user(&pool, "Budi", UserRole::Murid).await;
        let mut input = course_input("Premium", true);
        input.is_premium = true;
        let course = service.create(&guru, input).await.unwrap();

        assert!(matches!(
            service.join(&murid, course.id).await,
            Err(ServiceError::Forbidden(_))
        ));

        murid.plan = UserPlan::Premium;
        assert!(service.join(&murid, course.id).await.unwrap());
        assert!(!service.join(&murid, course.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_complete_module_requires_enrollment_and_awards_once() {
        let (pool, service) = setup().await;
        let guru = create_user(&pool, "Kim", UserRole::Guru).await;
        let murid = create_user(&pool, "Budi", UserRole::Murid).await;
        let course = service.create(&guru, course_input("Hangul", true)).await.unwrap();
        let module = service.add_module(&guru, course.id, module_input("A")).await.unwrap();
        service.add_module(&guru, course.id, module_input("B")).await.unwrap();

        assert!(matches!(
            service.complete_module(&murid, module.id).await,
            Err(ServiceError::Forbidden(_))
        ));

        service.join(&murid, course.id).await.unwrap();
        let progress = service.complete_module(&murid, module.id).await.unwrap();
        assert_eq!((progress.completed, progress.total, progress.percent), (1, 2, 50));

        service.complete_module(&murid, module.id).await.unwrap();
        let xp: i64 = sqlx::query_scalar("SELECT xp FROM users WHERE id = ?")
            .bind(murid.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(xp, 50);
    }

    #[tokio::test]
    async fn test_cannot_join_draft() {
        let (pool, service) = setup().await;
        let guru = create_user(&pool, "Kim", UserRole::Guru).await;
        let murid = create_user(&pool, "Budi", UserRole::Murid).await;
        let draft = service.create(&guru, course_input("Draft", false)).await.unwrap();

        assert!(matches!(
            service.join(&murid, draft.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
