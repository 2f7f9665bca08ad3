//! Course repository
//!
//! Courses, their ordered modules, enrollments and module completions.

use crate::db::DbPool;
use crate::models::{Course, CourseLevel, CourseSummary, ListParams, Module};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

/// Filter for course listings
#[derive(Debug, Clone, Copy, Default)]
pub struct CourseFilter {
    pub published_only: bool,
    pub author_id: Option<i64>,
}

#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn create(&self, course: &Course) -> Result<Course>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>>;

    async fn update(&self, course: &Course) -> Result<Course>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn list(&self, params: &ListParams, filter: CourseFilter) -> Result<(Vec<CourseSummary>, i64)>;

    async fn count(&self) -> Result<i64>;

    /// Modules of a course ordered by position
    async fn list_modules(&self, course_id: i64) -> Result<Vec<Module>>;

    async fn get_module(&self, id: i64) -> Result<Option<Module>>;

    /// Insert a module at the end of the course
    async fn append_module(&self, module: &Module) -> Result<Module>;

    async fn update_module(&self, module: &Module) -> Result<Module>;

    /// Delete a module and close the gap in positions
    async fn delete_module(&self, module: &Module) -> Result<()>;

    /// Assign positions 1..=n following `ordered_ids`
    async fn reorder_modules(&self, course_id: i64, ordered_ids: &[i64]) -> Result<()>;

    /// Returns false when the user was already enrolled
    async fn enroll(&self, course_id: i64, user_id: i64) -> Result<bool>;

    async fn is_enrolled(&self, course_id: i64, user_id: i64) -> Result<bool>;

    async fn member_count(&self, course_id: i64) -> Result<i64>;

    async fn list_enrolled(&self, user_id: i64) -> Result<Vec<CourseSummary>>;

    /// Returns false when the module had already been completed
    async fn complete_module(&self, module_id: i64, user_id: i64) -> Result<bool>;

    async fn completed_module_ids(&self, course_id: i64, user_id: i64) -> Result<Vec<i64>>;
}

pub struct SqlxCourseRepository {
    pool: DbPool,
}

impl SqlxCourseRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn CourseRepository> {
        Arc::new(Self::new(pool))
    }
}

const SUMMARY_SELECT: &str = r#"
    SELECT c.id, c.title, c.description, c.level, c.thumbnail, c.author_id, c.is_published,
           c.is_premium, c.created_at, c.updated_at,
           u.name as author_name,
           (SELECT COUNT(*) FROM modules m WHERE m.course_id = c.id) as module_count
    FROM courses c
    JOIN users u ON u.id = c.author_id
"#;

const MODULE_COLUMNS: &str =
    "id, course_id, title, description, content, content_html, position, created_at, updated_at";

#[async_trait]
impl CourseRepository for SqlxCourseRepository {
    async fn create(&self, course: &Course) -> Result<Course> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO courses (title, description, level, thumbnail, author_id, is_published, is_premium, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&course.title)
        .bind(&course.description)
        .bind(course.level.to_string())
        .bind(&course.thumbnail)
        .bind(course.author_id)
        .bind(course.is_published)
        .bind(course.is_premium)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create course")?;

        Ok(Course {
            id: result.last_insert_rowid(),
            created_at: now,
            updated_at: now,
            ..course.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, description, level, thumbnail, author_id, is_published, is_premium, created_at, updated_at
            FROM courses WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get course")?;

        row.as_ref().map(row_to_course).transpose()
    }

    async fn update(&self, course: &Course) -> Result<Course> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE courses
            SET title = ?, description = ?, level = ?, thumbnail = ?, is_published = ?, is_premium = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&course.title)
        .bind(&course.description)
        .bind(course.level.to_string())
        .bind(&course.thumbnail)
        .bind(course.is_published)
        .bind(course.is_premium)
        .bind(now)
        .bind(course.id)
        .execute(&self.pool)
        .await
        .context("Failed to update course")?;

        Ok(Course {
            updated_at: now,
            ..course.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM courses WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete course")?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, params: &ListParams, filter: CourseFilter) -> Result<(Vec<CourseSummary>, i64)> {
        let rows = sqlx::query(&format!(
            "{} WHERE (? = 0 OR c.is_published = 1) AND (? IS NULL OR c.author_id = ?) \
             ORDER BY c.created_at DESC, c.id DESC LIMIT ? OFFSET ?",
            SUMMARY_SELECT
        ))
        .bind(filter.published_only)
        .bind(filter.author_id)
        .bind(filter.author_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list courses")?;

        let total: i64 = sqlx::query(
            "SELECT COUNT(*) as count FROM courses c WHERE (? = 0 OR c.is_published = 1) AND (? IS NULL OR c.author_id = ?)",
        )
        .bind(filter.published_only)
        .bind(filter.author_id)
        .bind(filter.author_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count courses")?
        .get("count");

        let courses = rows.iter().map(row_to_summary).collect::<Result<Vec<_>>>()?;
        Ok((courses, total))
    }

    async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM courses")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count courses")?;
        Ok(row.get("count"))
    }

    async fn list_modules(&self, course_id: i64) -> Result<Vec<Module>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM modules WHERE course_id = ? ORDER BY position ASC, id ASC",
            MODULE_COLUMNS
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list modules")?;

        Ok(rows.iter().map(row_to_module).collect())
    }

    async fn get_module(&self, id: i64) -> Result<Option<Module>> {
        let row = sqlx::query(&format!("SELECT {} FROM modules WHERE id = ?", MODULE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get module")?;

        Ok(row.as_ref().map(row_to_module))
    }

    async fn append_module(&self, module: &Module) -> Result<Module> {
        let now = Utc::now();

        let row = sqlx::query(
            r#"
            INSERT INTO modules (course_id, title, description, content, content_html, position, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, (SELECT COALESCE(MAX(position), 0) + 1 FROM modules WHERE course_id = ?), ?, ?)
            RETURNING id, position
            "#,
        )
        .bind(module.course_id)
        .bind(&module.title)
        .bind(&module.description)
        .bind(&module.content)
        .bind(&module.content_html)
        .bind(module.course_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create module")?;

        Ok(Module {
            id: row.get("id"),
            position: row.get("position"),
            created_at: now,
            updated_at: now,
            ..module.clone()
        })
    }

    async fn update_module(&self, module: &Module) -> Result<Module> {
        let now = Utc::now();

        sqlx::query(
            "UPDATE modules SET title = ?, description = ?, content = ?, content_html = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&module.title)
        .bind(&module.description)
        .bind(&module.content)
        .bind(&module.content_html)
        .bind(now)
        .bind(module.id)
        .execute(&self.pool)
        .await
        .context("Failed to update module")?;

        Ok(Module {
            updated_at: now,
            ..module.clone()
        })
    }

    async fn delete_module(&self, module: &Module) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM modules WHERE id = ?")
            .bind(module.id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete module")?;

        sqlx::query("UPDATE modules SET position = position - 1 WHERE course_id = ? AND position > ?")
            .bind(module.course_id)
            .bind(module.position)
            .execute(&mut *tx)
            .await
            .context("Failed to compact module positions")?;

        tx.commit().await?;
        Ok(())
    }

    async fn reorder_modules(&self, course_id: i64, ordered_ids: &[i64]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (index, id) in ordered_ids.iter().enumerate() {
            sqlx::query("UPDATE modules SET position = ? WHERE id = ? AND course_id = ?")
                .bind(index as i64 + 1)
                .bind(id)
                .bind(course_id)
                .execute(&mut *tx)
                .await
                .context("Failed to reorder modules")?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn enroll(&self, course_id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO course_enrollments (course_id, user_id, joined_at) VALUES (?, ?, ?)",
        )
        .bind(course_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to enroll")?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_enrolled(&self, course_id: i64, user_id: i64) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM course_enrollments WHERE course_id = ? AND user_id = ?) as found",
        )
        .bind(course_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check enrollment")?;

        Ok(row.get::<i64, _>("found") != 0)
    }

    async fn member_count(&self, course_id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM course_enrollments WHERE course_id = ?")
            .bind(course_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count members")?;
        Ok(row.get("count"))
    }

    async fn list_enrolled(&self, user_id: i64) -> Result<Vec<CourseSummary>> {
        let rows = sqlx::query(&format!(
            "{} JOIN course_enrollments e ON e.course_id = c.id WHERE e.user_id = ? ORDER BY e.joined_at DESC",
            SUMMARY_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list enrolled courses")?;

        rows.iter().map(row_to_summary).collect()
    }

    async fn complete_module(&self, module_id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO module_completions (module_id, user_id, completed_at) VALUES (?, ?, ?)",
        )
        .bind(module_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to complete module")?;

        Ok(result.rows_affected() > 0)
    }

    async fn completed_module_ids(&self, course_id: i64, user_id: i64) -> Result<Vec<i64>> {
        let rows = sqlx::query(
            r#"
            SELECT mc.module_id FROM module_completions mc
            JOIN modules m ON m.id = mc.module_id
            WHERE m.course_id = ? AND mc.user_id = ?
            ORDER BY m.position
            "#,
        )
        .bind(course_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load completions")?;

        Ok(rows.iter().map(|row| row.get("module_id")).collect())
    }
}

fn row_to_course(row: &sqlx::sqlite::SqliteRow) -> Result<Course> {
    let level: String = row.get("level");

    Ok(Course {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        level: CourseLevel::from_str(&level)?,
        thumbnail: row.get("thumbnail"),
        author_id: row.get("author_id"),
        is_published: row.get("is_published"),
        is_premium: row.get("is_premium"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_summary(row: &sqlx::sqlite::SqliteRow) -> Result<CourseSummary> {
    Ok(CourseSummary {
        course: row_to_course(row)?,
        author_name: row.get("author_name"),
        module_count: row.get("module_count"),
    })
}

fn row_to_module(row: &sqlx::sqlite::SqliteRow) -> Module {
    Module {
        id: row.get("id"),
        course_id: row.get("course_id"),
        title: row.get("title"),
        description: row.get("description"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        position: row.get("position"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::{insert_user, setup_pool};
    use crate::models::UserRole;

    fn course(author_id: i64, title: &str, published: bool) -> Course {
        let now = Utc::now();
        Course {
            id: 0,
            title: title.to_string(),
            description: String::new(),
            level: CourseLevel::Beginner,
            thumbnail: None,
            author_id,
            is_published: published,
            is_premium: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn module(course_id: i64, title: &str) -> Module {
        let now = Utc::now();
        Module {
            id: 0,
            course_id,
            title: title.to_string(),
            description: String::new(),
            content: String::new(),
            content_html: String::new(),
            position: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_list_respects_published_filter() {
        let pool = setup_pool().await;
        let guru = insert_user(&pool, "Guru", UserRole::Guru).await;
        let repo = SqlxCourseRepository::new(pool);

        repo.create(&course(guru, "Hangul Dasar", true)).await.unwrap();
        repo.create(&course(guru, "Draft", false)).await.unwrap();

        let published = CourseFilter {
            published_only: true,
            author_id: None,
        };
        let (items, total) = repo.list(&ListParams::default(), published).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].course.title, "Hangul Dasar");
        assert_eq!(items[0].author_name, "Guru");

        let (_, all) = repo.list(&ListParams::default(), CourseFilter::default()).await.unwrap();
        assert_eq!(all, 2);
    }

    #[tokio::test]
    async fn test_modules_append_delete_reorder() {
        let pool = setup_pool().await;
        let guru = insert_user(&pool, "Guru", UserRole::Guru).await;
        let repo = SqlxCourseRepository::new(pool);
        let c = repo.create(&course(guru, "C", true)).await.unwrap();

        let m1 = repo.append_module(&module(c.id, "Vokal")).await.unwrap();
        let m2 = repo.append_module(&module(c.id, "Konsonan")).await.unwrap();
        let m3 = repo.append_module(&module(c.id, "Batchim")).await.unwrap();
        assert_eq!((m1.position, m2.position, m3.position), (1, 2, 3));

        repo.delete_module(&m2).await.unwrap();
        let modules = repo.list_modules(c.id).await.unwrap();
        assert_eq!(
            modules.iter().map(|m| (m.id, m.position)).collect::<Vec<_>>(),
            vec![(m1.id, 1), (m3.id, 2)]
        );

        repo.reorder_modules(c.id, &[m3.id, m1.id]).await.unwrap();
        let modules = repo.list_modules(c.id).await.unwrap();
        assert_eq!(modules[0].id, m3.id);
        assert_eq!(modules[1].position, 2);
    }

    #[tokio::test]
    async fn test_enrollment_and_completion_are_idempotent() {
        let pool = setup_pool().await;
        let guru = insert_user(&pool, "Guru", UserRole::Guru).await;
        let murid = insert_user(&pool, "Murid", UserRole::Murid).await;
        let repo = SqlxCourseRepository::new(pool);
        let c = repo.create(&course(guru, "C", true)).await.unwrap();
        let m = repo.append_module(&module(c.id, "M")).await.unwrap();

        assert!(repo.enroll(c.id, murid).await.unwrap());
        assert!(!repo.enroll(c.id, murid).await.unwrap());
        assert!(repo.is_enrolled(c.id, murid).await.unwrap());
        assert!(!repo.is_enrolled(c.id, guru).await.unwrap());
        assert_eq!(repo.member_count(c.id).await.unwrap(), 1);
        assert_eq!(repo.list_enrolled(murid).await.unwrap().len(), 1);

        assert!(repo.complete_module(m.id, murid).await.unwrap());
        assert!(!repo.complete_module(m.id, murid).await.unwrap());
        assert_eq!(repo.completed_module_ids(c.id, murid).await.unwrap(), vec![m.id]);
    }

    #[tokio::test]
    async fn test_delete_course_cascades_modules() {
        let pool = setup_pool().await;
        let guru = insert_user(&pool, "Guru", UserRole::Guru).await;
        let repo = SqlxCourseRepository::new(pool);
        let c = repo.create(&course(guru, "C", true)).await.unwrap();
        let m = repo.append_module(&module(c.id, "M")).await.unwrap();

        assert!(repo.delete(c.id).await.unwrap());
        assert!(repo.get_module(m.id).await.unwrap().is_none());
        assert!(!repo.delete(c.id).await.unwrap());
    }
}
