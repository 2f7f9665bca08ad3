//! Question bank and tryout repository
//!
//! Questions are stored in `soal` with their options in `opsi`; a question
//! and its options are always written together in one transaction.

use crate::db::DbPool;
use crate::models::{
    AttemptAnswer, Difficulty, Question, QuestionCollection, QuestionInput, QuestionOption, Tryout,
    TryoutAttempt, TryoutLeaderboardEntry,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// Result of [`TryoutRepository::start_attempt`]
#[derive(Debug, Clone)]
pub enum AttemptStart {
    Created(TryoutAttempt),
    /// The user's unsubmitted attempt, returned instead of a new one
    Open(TryoutAttempt),
    LimitReached,
}

#[async_trait]
pub trait TryoutRepository: Send + Sync {
    // Question banks

    async fn create_collection(&self, collection: &QuestionCollection) -> Result<QuestionCollection>;

    async fn get_collection(&self, id: i64) -> Result<Option<QuestionCollection>>;

    async fn update_collection(&self, collection: &QuestionCollection) -> Result<QuestionCollection>;

    async fn delete_collection(&self, id: i64) -> Result<bool>;

    /// Banks visible to a user: their own plus every non-private bank.
    /// `all` lists everything (admin).
    async fn list_collections(&self, viewer_id: i64, all: bool) -> Result<Vec<QuestionCollection>>;

    // Questions

    async fn list_questions(&self, collection_id: i64) -> Result<Vec<Question>>;

    async fn get_question(&self, id: i64) -> Result<Option<Question>>;

    /// Append a question at the end of its bank
    async fn create_question(&self, collection_id: i64, input: &QuestionInput) -> Result<Question>;

    /// Replace a question's content and its whole option list
    async fn replace_question(&self, id: i64, input: &QuestionInput) -> Result<Question>;

    async fn delete_question(&self, id: i64) -> Result<bool>;

    // Tryouts

    async fn create_tryout(&self, tryout: &Tryout) -> Result<Tryout>;

    async fn get_tryout(&self, id: i64) -> Result<Option<Tryout>>;

    async fn update_tryout(&self, tryout: &Tryout) -> Result<Tryout>;

    async fn delete_tryout(&self, id: i64) -> Result<bool>;

    async fn list_tryouts(&self, active_only: bool) -> Result<Vec<Tryout>>;

    // Attempts

    /// Start a new attempt unless the user already has an open one or has
    /// used `max_attempts`. Check and insert run in one transaction.
    async fn start_attempt(
        &self,
        tryout_id: i64,
        user_id: i64,
        started_at: DateTime<Utc>,
        max_attempts: i64,
    ) -> Result<AttemptStart>;

    async fn get_attempt(&self, id: i64) -> Result<Option<TryoutAttempt>>;

    /// The user's unsubmitted attempt, if any
    async fn open_attempt(&self, tryout_id: i64, user_id: i64) -> Result<Option<TryoutAttempt>>;

    async fn list_attempts(&self, tryout_id: i64, user_id: i64) -> Result<Vec<TryoutAttempt>>;

    /// Store answers and the final score.
    ///
    /// Returns false without writing anything when the attempt was already submitted.
    async fn submit_attempt(&self, attempt: &TryoutAttempt, answers: &[AttemptAnswer]) -> Result<bool>;

    async fn list_answers(&self, attempt_id: i64) -> Result<Vec<AttemptAnswer>>;

    /// Best submitted score per user, highest first, earlier submission wins ties
    async fn leaderboard(&self, tryout_id: i64, limit: i64) -> Result<Vec<TryoutLeaderboardEntry>>;
}

pub struct SqlxTryoutRepository {
    pool: DbPool,
}

impl SqlxTryoutRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn TryoutRepository> {
        Arc::new(Self::new(pool))
    }

    async fn load_options(&self, question_ids: &[i64]) -> Result<HashMap<i64, Vec<QuestionOption>>> {
        let mut grouped: HashMap<i64, Vec<QuestionOption>> = HashMap::new();
        if question_ids.is_empty() {
            return Ok(grouped);
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, soal_id, text, is_correct FROM opsi WHERE soal_id IN (");
        let mut separated = builder.separated(", ");
        for id in question_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY soal_id, position");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to load question options")?;

        for row in &rows {
            let option = QuestionOption {
                id: row.get("id"),
                question_id: row.get("soal_id"),
                text: row.get("text"),
                is_correct: row.get("is_correct"),
            };
            grouped.entry(option.question_id).or_default().push(option);
        }

        Ok(grouped)
    }
}

const COLLECTION_COLUMNS: &str = "id, name, description, author_id, is_private, created_at, updated_at";

const QUESTION_COLUMNS: &str = "id, koleksi_id, prompt, attachment_url, explanation, difficulty, position";

const TRYOUT_COLUMNS: &str = "id, name, description, koleksi_id, author_id, starts_at, ends_at, \
     duration_minutes, max_attempts, is_active, created_at, updated_at";

const ATTEMPT_COLUMNS: &str =
    "id, tryout_id, user_id, started_at, submitted_at, score, correct_count, total_questions, is_late";

async fn insert_options(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    question_id: i64,
    input: &QuestionInput,
) -> Result<()> {
    for (position, option) in input.options.iter().enumerate() {
        sqlx::query("INSERT INTO opsi (soal_id, text, is_correct, position) VALUES (?, ?, ?, ?)")
            .bind(question_id)
            .bind(option.text.trim())
            .bind(option.is_correct)
            .bind(position as i64 + 1)
            .execute(&mut **tx)
            .await
            .context("Failed to insert option")?;
    }
    Ok(())
}

#[async_trait]
impl TryoutRepository for SqlxTryoutRepository {
    async fn create_collection(&self, collection: &QuestionCollection) -> Result<QuestionCollection> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO koleksi_soal (name, description, author_id, is_private, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&collection.name)
        .bind(&collection.description)
        .bind(collection.author_id)
        .bind(collection.is_private)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create question bank")?;

        Ok(QuestionCollection {
            id: result.last_insert_rowid(),
            created_at: now,
            updated_at: now,
            ..collection.clone()
        })
    }

    async fn get_collection(&self, id: i64) -> Result<Option<QuestionCollection>> {
        let row = sqlx::query(&format!("SELECT {} FROM koleksi_soal WHERE id = ?", COLLECTION_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get question bank")?;

        Ok(row.as_ref().map(row_to_collection))
    }

    async fn update_collection(&self, collection: &QuestionCollection) -> Result<QuestionCollection> {
        let now = Utc::now();

        sqlx::query("UPDATE koleksi_soal SET name = ?, description = ?, is_private = ?, updated_at = ? WHERE id = ?")
            .bind(&collection.name)
            .bind(&collection.description)
            .bind(collection.is_private)
            .bind(now)
            .bind(collection.id)
            .execute(&self.pool)
            .await
            .context("Failed to update question bank")?;

        Ok(QuestionCollection {
            updated_at: now,
            ..collection.clone()
        })
    }

    async fn delete_collection(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM koleksi_soal WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete question bank")?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_collections(&self, viewer_id: i64, all: bool) -> Result<Vec<QuestionCollection>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM koleksi_soal WHERE (? = 1 OR author_id = ? OR is_private = 0) ORDER BY updated_at DESC",
            COLLECTION_COLUMNS
        ))
        .bind(all)
        .bind(viewer_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list question banks")?;

        Ok(rows.iter().map(row_to_collection).collect())
    }

    async fn list_questions(&self, collection_id: i64) -> Result<Vec<Question>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM soal WHERE koleksi_id = ? ORDER BY position",
            QUESTION_COLUMNS
        ))
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list questions")?;

        let mut questions = rows.iter().map(row_to_question).collect::<Result<Vec<_>>>()?;
        let ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
        let mut options = self.load_options(&ids).await?;

        for question in &mut questions {
            question.options = options.remove(&question.id).unwrap_or_default();
        }

        Ok(questions)
    }

    async fn get_question(&self, id: i64) -> Result<Option<Question>> {
        let row = sqlx::query(&format!("SELECT {} FROM soal WHERE id = ?", QUESTION_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get question")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut question = row_to_question(&row)?;
        question.options = self
            .load_options(&[question.id])
            .await?
            .remove(&question.id)
            .unwrap_or_default();

        Ok(Some(question))
    }

    async fn create_question(&self, collection_id: i64, input: &QuestionInput) -> Result<Question> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO soal (koleksi_id, prompt, attachment_url, explanation, difficulty, position, created_at)
            VALUES (?, ?, ?, ?, ?, (SELECT COALESCE(MAX(position), 0) + 1 FROM soal WHERE koleksi_id = ?), ?)
            RETURNING id
            "#,
        )
        .bind(collection_id)
        .bind(input.prompt.trim())
        .bind(&input.attachment_url)
        .bind(&input.explanation)
        .bind(input.difficulty.to_string())
        .bind(collection_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .context("Failed to create question")?;

        let id: i64 = row.get("id");
        insert_options(&mut tx, id, input).await?;
        tx.commit().await?;

        self.get_question(id)
            .await?
            .context("Question vanished after insert")
    }

    async fn replace_question(&self, id: i64, input: &QuestionInput) -> Result<Question> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE soal SET prompt = ?, attachment_url = ?, explanation = ?, difficulty = ? WHERE id = ?")
            .bind(input.prompt.trim())
            .bind(&input.attachment_url)
            .bind(&input.explanation)
            .bind(input.difficulty.to_string())
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to update question")?;

        sqlx::query("DELETE FROM opsi WHERE soal_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear options")?;

        insert_options(&mut tx, id, input).await?;
        tx.commit().await?;

        self.get_question(id)
            .await?
            .context("Question vanished after update")
    }

    async fn delete_question(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM soal WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete question")?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_tryout(&self, tryout: &Tryout) -> Result<Tryout> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO tryouts (name, description, koleksi_id, author_id, starts_at, ends_at,
                                 duration_minutes, max_attempts, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&tryout.name)
        .bind(&tryout.description)
        .bind(tryout.collection_id)
        .bind(tryout.author_id)
        .bind(tryout.starts_at)
        .bind(tryout.ends_at)
        .bind(tryout.duration_minutes)
        .bind(tryout.max_attempts)
        .bind(tryout.is_active)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create tryout")?;

        Ok(Tryout {
            id: result.last_insert_rowid(),
            created_at: now,
            updated_at: now,
            ..tryout.clone()
        })
    }

    async fn get_tryout(&self, id: i64) -> Result<Option<Tryout>> {
        let row = sqlx::query(&format!("SELECT {} FROM tryouts WHERE id = ?", TRYOUT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get tryout")?;

        Ok(row.as_ref().map(row_to_tryout))
    }

    async fn update_tryout(&self, tryout: &Tryout) -> Result<Tryout> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE tryouts
            SET name = ?, description = ?, koleksi_id = ?, starts_at = ?, ends_at = ?,
                duration_minutes = ?, max_attempts = ?, is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&tryout.name)
        .bind(&tryout.description)
        .bind(tryout.collection_id)
        .bind(tryout.starts_at)
        .bind(tryout.ends_at)
        .bind(tryout.duration_minutes)
        .bind(tryout.max_attempts)
        .bind(tryout.is_active)
        .bind(now)
        .bind(tryout.id)
        .execute(&self.pool)
        .await
        .context("Failed to update tryout")?;

        Ok(Tryout {
            updated_at: now,
            ..tryout.clone()
        })
    }

    async fn delete_tryout(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tryouts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete tryout")?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_tryouts(&self, active_only: bool) -> Result<Vec<Tryout>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tryouts WHERE (? = 0 OR is_active = 1) ORDER BY starts_at DESC",
            TRYOUT_COLUMNS
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list tryouts")?;

        Ok(rows.iter().map(row_to_tryout).collect())
    }

    async fn start_attempt(
        &self,
        tryout_id: i64,
        user_id: i64,
        started_at: DateTime<Utc>,
        max_attempts: i64,
    ) -> Result<AttemptStart> {
        let mut tx = self.pool.begin().await?;

        // idx_attempts_open rejects a second unsubmitted attempt
        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO tryout_attempts (tryout_id, user_id, started_at)
            SELECT ?, ?, ?
            WHERE (SELECT COUNT(*) FROM tryout_attempts WHERE tryout_id = ? AND user_id = ?) < ?
            "#,
        )
        .bind(tryout_id)
        .bind(user_id)
        .bind(started_at)
        .bind(tryout_id)
        .bind(user_id)
        .bind(max_attempts)
        .execute(&mut *tx)
        .await
        .context("Failed to create attempt")?;

        if inserted.rows_affected() > 0 {
            tx.commit().await?;
            return Ok(AttemptStart::Created(TryoutAttempt {
                id: inserted.last_insert_rowid(),
                tryout_id,
                user_id,
                started_at,
                submitted_at: None,
                score: None,
                correct_count: 0,
                total_questions: 0,
                is_late: false,
            }));
        }

        let open = sqlx::query(&format!(
            "SELECT {} FROM tryout_attempts WHERE tryout_id = ? AND user_id = ? AND submitted_at IS NULL",
            ATTEMPT_COLUMNS
        ))
        .bind(tryout_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to get open attempt")?;
        tx.commit().await?;

        Ok(match open {
            Some(row) => AttemptStart::Open(row_to_attempt(&row)),
            None => AttemptStart::LimitReached,
        })
    }

    async fn get_attempt(&self, id: i64) -> Result<Option<TryoutAttempt>> {
        let row = sqlx::query(&format!("SELECT {} FROM tryout_attempts WHERE id = ?", ATTEMPT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get attempt")?;

        Ok(row.as_ref().map(row_to_attempt))
    }

    async fn open_attempt(&self, tryout_id: i64, user_id: i64) -> Result<Option<TryoutAttempt>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM tryout_attempts WHERE tryout_id = ? AND user_id = ? AND submitted_at IS NULL \
             ORDER BY started_at DESC LIMIT 1",
            ATTEMPT_COLUMNS
        ))
        .bind(tryout_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get open attempt")?;

        Ok(row.as_ref().map(row_to_attempt))
    }

    async fn list_attempts(&self, tryout_id: i64, user_id: i64) -> Result<Vec<TryoutAttempt>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tryout_attempts WHERE tryout_id = ? AND user_id = ? ORDER BY started_at DESC",
            ATTEMPT_COLUMNS
        ))
        .bind(tryout_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list attempts")?;

        Ok(rows.iter().map(row_to_attempt).collect())
    }

    async fn submit_attempt(&self, attempt: &TryoutAttempt, answers: &[AttemptAnswer]) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE tryout_attempts
            SET submitted_at = ?, score = ?, correct_count = ?, total_questions = ?, is_late = ?
            WHERE id = ? AND submitted_at IS NULL
            "#,
        )
        .bind(attempt.submitted_at)
        .bind(attempt.score)
        .bind(attempt.correct_count)
        .bind(attempt.total_questions)
        .bind(attempt.is_late)
        .bind(attempt.id)
        .execute(&mut *tx)
        .await
        .context("Failed to submit attempt")?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for answer in answers {
            sqlx::query("INSERT INTO tryout_answers (attempt_id, soal_id, opsi_id, is_correct) VALUES (?, ?, ?, ?)")
                .bind(attempt.id)
                .bind(answer.question_id)
                .bind(answer.option_id)
                .bind(answer.is_correct)
                .execute(&mut *tx)
                .await
                .context("Failed to store answer")?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn list_answers(&self, attempt_id: i64) -> Result<Vec<AttemptAnswer>> {
        let rows = sqlx::query("SELECT soal_id, opsi_id, is_correct FROM tryout_answers WHERE attempt_id = ?")
            .bind(attempt_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list answers")?;

        Ok(rows
            .iter()
            .map(|row| AttemptAnswer {
                question_id: row.get("soal_id"),
                option_id: row.get("opsi_id"),
                is_correct: row.get("is_correct"),
            })
            .collect())
    }

    async fn leaderboard(&self, tryout_id: i64, limit: i64) -> Result<Vec<TryoutLeaderboardEntry>> {
        // SQLite takes bare columns from the row holding MAX(score)
        let rows = sqlx::query(
            r#"
            SELECT a.user_id, u.name, MAX(a.score) as best_score, a.submitted_at
            FROM tryout_attempts a JOIN users u ON u.id = a.user_id
            WHERE a.tryout_id = ? AND a.submitted_at IS NOT NULL
            GROUP BY a.user_id
            ORDER BY best_score DESC, a.submitted_at ASC
            LIMIT ?
            "#,
        )
        .bind(tryout_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load tryout leaderboard")?;

        Ok(rows
            .iter()
            .enumerate()
            .map(|(i, row)| TryoutLeaderboardEntry {
                rank: i as u32 + 1,
                user_id: row.get("user_id"),
                name: row.get("name"),
                best_score: row.get("best_score"),
                submitted_at: row.get("submitted_at"),
            })
            .collect())
    }
}

fn row_to_collection(row: &sqlx::sqlite::SqliteRow) -> QuestionCollection {
    QuestionCollection {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        author_id: row.get("author_id"),
        is_private: row.get("is_private"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_question(row: &sqlx::sqlite::SqliteRow) -> Result<Question> {
    let difficulty: String = row.get("difficulty");

    Ok(Question {
        id: row.get("id"),
        collection_id: row.get("koleksi_id"),
        prompt: row.get("prompt"),
        attachment_url: row.get("attachment_url"),
        explanation: row.get("explanation"),
        difficulty: Difficulty::from_str(&difficulty)?,
        position: row.get("position"),
        options: Vec::new(),
    })
}

fn row_to_tryout(row: &sqlx::sqlite::SqliteRow) -> Tryout {
    Tryout {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        collection_id: row.get("koleksi_id"),
        author_id: row.get("author_id"),
        starts_at: row.get("starts_at"),
        ends_at: row.get("ends_at"),
        duration_minutes: row.get("duration_minutes"),
        max_attempts: row.get("max_attempts"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_attempt(row: &sqlx::sqlite::SqliteRow) -> TryoutAttempt {
    TryoutAttempt {
        id: row.get("id"),
        tryout_id: row.get("tryout_id"),
        user_id: row.get("user_id"),
        started_at: row.get("started_at"),
        submitted_at: row.get("submitted_at"),
        score: row.get("score"),
        correct_count: row.get("correct_count"),
        total_questions: row.get("total_questions"),
        is_late: row.get("is_late"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::{insert_user, setup_pool};
    use crate::models::{OptionInput, UserRole};
    use chrono::Duration;

    fn bank(author_id: i64, is_private: bool) -> QuestionCollection {
        let now = Utc::now();
        QuestionCollection {
            id: 0,
            name: "TOPIK I".to_string(),
            description: None,
            author_id,
            is_private,
            created_at: now,
            updated_at: now,
        }
    }

    fn question(prompt: &str) -> QuestionInput {
        QuestionInput {
            prompt: prompt.to_string(),
            attachment_url: None,
            explanation: Some("사과 = apel".to_string()),
            difficulty: Difficulty::Easy,
            options: vec![
                OptionInput { text: "apel".to_string(), is_correct: true },
                OptionInput { text: "jeruk".to_string(), is_correct: false },
            ],
        }
    }

    fn tryout(collection_id: i64, author_id: i64) -> Tryout {
        let now = Utc::now();
        Tryout {
            id: 0,
            name: "Tryout Mingguan".to_string(),
            description: None,
            collection_id,
            author_id,
            starts_at: now - Duration::hours(1),
            ends_at: now + Duration::hours(1),
            duration_minutes: 30,
            max_attempts: 2,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_questions_keep_order_and_options() {
        let pool = setup_pool().await;
        let guru = insert_user(&pool, "Guru", UserRole::Guru).await;
        let repo = SqlxTryoutRepository::new(pool);
        let bank = repo.create_collection(&bank(guru, false)).await.unwrap();

        let q1 = repo.create_question(bank.id, &question("satu")).await.unwrap();
        let q2 = repo.create_question(bank.id, &question("dua")).await.unwrap();
        assert_eq!(q1.position, 1);
        assert_eq!(q2.position, 2);
        assert_eq!(q1.options.len(), 2);
        assert_eq!(q1.options[0].text, "apel");

        let questions = repo.list_questions(bank.id).await.unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[1].prompt, "dua");
        assert_eq!(questions[1].correct_option_ids().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_question_swaps_options() {
        let pool = setup_pool().await;
        let guru = insert_user(&pool, "Guru", UserRole::Guru).await;
        let repo = SqlxTryoutRepository::new(pool);
        let bank = repo.create_collection(&bank(guru, false)).await.unwrap();
        let q = repo.create_question(bank.id, &question("lama")).await.unwrap();

        let mut input = question("baru");
        input.options.push(OptionInput { text: "pir".to_string(), is_correct: false });
        let replaced = repo.replace_question(q.id, &input).await.unwrap();

        assert_eq!(replaced.prompt, "baru");
        assert_eq!(replaced.options.len(), 3);
        assert!(replaced.options.iter().all(|o| !q.options.iter().any(|old| old.id == o.id)));
    }

    #[tokio::test]
    async fn test_private_banks_hidden_from_others() {
        let pool = setup_pool().await;
        let guru = insert_user(&pool, "Guru", UserRole::Guru).await;
        let other = insert_user(&pool, "Guru Lain", UserRole::Guru).await;
        let repo = SqlxTryoutRepository::new(pool);
        repo.create_collection(&bank(guru, true)).await.unwrap();
        repo.create_collection(&bank(guru, false)).await.unwrap();

        assert_eq!(repo.list_collections(guru, false).await.unwrap().len(), 2);
        assert_eq!(repo.list_collections(other, false).await.unwrap().len(), 1);
        assert_eq!(repo.list_collections(other, true).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_submit_once_and_leaderboard() {
        let pool = setup_pool().await;
        let guru = insert_user(&pool, "Guru", UserRole::Guru).await;
        let ani = insert_user(&pool, "Ani", UserRole::Murid).await;
        let budi = insert_user(&pool, "Budi", UserRole::Murid).await;
        let repo = SqlxTryoutRepository::new(pool);
        let bank = repo.create_collection(&bank(guru, false)).await.unwrap();
        let q = repo.create_question(bank.id, &question("satu")).await.unwrap();
        let t = repo.create_tryout(&tryout(bank.id, guru)).await.unwrap();

        let now = Utc::now();
        let AttemptStart::Created(mut first) = repo.start_attempt(t.id, ani, now, 2).await.unwrap() else {
            panic!("expected a new attempt");
        };
        assert_eq!(repo.open_attempt(t.id, ani).await.unwrap().unwrap().id, first.id);

        first.submitted_at = Some(now);
        first.score = Some(100);
        first.correct_count = 1;
        first.total_questions = 1;
        let answers = vec![AttemptAnswer {
            question_id: q.id,
            option_id: Some(q.options[0].id),
            is_correct: true,
        }];
        assert!(repo.submit_attempt(&first, &answers).await.unwrap());
        assert!(!repo.submit_attempt(&first, &answers).await.unwrap());
        assert!(repo.open_attempt(t.id, ani).await.unwrap().is_none());
        assert_eq!(repo.list_answers(first.id).await.unwrap().len(), 1);

        let AttemptStart::Created(mut second) = repo.start_attempt(t.id, budi, now, 2).await.unwrap() else {
            panic!("expected a new attempt");
        };
        second.submitted_at = Some(now + Duration::minutes(1));
        second.score = Some(0);
        repo.submit_attempt(&second, &[]).await.unwrap();

        let board = repo.leaderboard(t.id, 10).await.unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].name, "Ani");
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[1].best_score, 0);

        assert_eq!(repo.list_attempts(t.id, ani).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_start_attempt_resumes_open_and_enforces_limit() {
        let pool = setup_pool().await;
        let guru = insert_user(&pool, "Guru", UserRole::Guru).await;
        let ani = insert_user(&pool, "Ani", UserRole::Murid).await;
        let repo = SqlxTryoutRepository::new(pool);
        let bank = repo.create_collection(&bank(guru, false)).await.unwrap();
        let t = repo.create_tryout(&tryout(bank.id, guru)).await.unwrap();
        let now = Utc::now();

        let AttemptStart::Created(mut first) = repo.start_attempt(t.id, ani, now, 1).await.unwrap() else {
            panic!("expected a new attempt");
        };
        match repo.start_attempt(t.id, ani, now, 1).await.unwrap() {
            AttemptStart::Open(open) => assert_eq!(open.id, first.id),
            other => panic!("expected the open attempt, got {:?}", other),
        }

        first.submitted_at = Some(now);
        first.score = Some(50);
        assert!(repo.submit_attempt(&first, &[]).await.unwrap());

        assert!(matches!(
            repo.start_attempt(t.id, ani, now, 1).await.unwrap(),
            AttemptStart::LimitReached
        ));
        assert!(matches!(
            repo.start_attempt(t.id, ani, now, 2).await.unwrap(),
            AttemptStart::Created(_)
        ));
        assert_eq!(repo.list_attempts(t.id, ani).await.unwrap().len(), 2);
    }
}
