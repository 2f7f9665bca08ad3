//! Question banks, tryouts and graded attempts
//!
//! A student starts an attempt while the tryout window is open and submits
//! it once. Answers are graded against the options stored at submit time;
//! options that do not belong to the question count as unanswered.

use crate::db::repositories::{AttemptStart, TryoutRepository};
use crate::models::tryout::{score_percent, CreateCollectionInput, UpdateCollectionInput};
use crate::models::{
    tryout_xp, ActivityType, AnswerReview, AttemptAnswer, AttemptResult, AttemptSheet, Question,
    QuestionBank, QuestionCollection, QuestionInput, SubmitAnswersInput, Tryout, TryoutAttempt,
    TryoutInput, TryoutLeaderboardEntry, User,
};
use crate::services::activity::ActivityService;
use crate::services::error::{ServiceError, ServiceResult};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

pub struct TryoutService {
    repo: Arc<dyn TryoutRepository>,
    activity: Arc<ActivityService>,
}

impl TryoutService {
    pub fn new(repo: Arc<dyn TryoutRepository>, activity: Arc<ActivityService>) -> Self {
        Self { repo, activity }
    }

    // ---- Question banks ----

    pub async fn list_collections(&self, actor: &User) -> ServiceResult<Vec<QuestionCollection>> {
        if !actor.is_teacher() {
            return Err(ServiceError::forbidden("Only teachers can manage question banks"));
        }
        Ok(self.repo.list_collections(actor.id, actor.is_admin()).await?)
    }

    pub async fn create_collection(
        &self,
        actor: &User,
        input: CreateCollectionInput,
    ) -> ServiceResult<QuestionCollection> {
        if !actor.is_teacher() {
            return Err(ServiceError::forbidden("Only teachers can create question banks"));
        }
        let name = input.name.trim();
        if name.is_empty() {
            return Err(ServiceError::validation("Name cannot be empty"));
        }

        let now = Utc::now();
        let collection = self
            .repo
            .create_collection(&QuestionCollection {
                id: 0,
                name: name.to_string(),
                description: input.description.filter(|d| !d.trim().is_empty()),
                author_id: actor.id,
                is_private: input.is_private,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(collection_id = collection.id, author_id = actor.id, "Question bank created");
        Ok(collection)
    }

    /// Bank with questions and answers; private banks only for their author
    pub async fn get_collection(&self, actor: &User, id: i64) -> ServiceResult<QuestionBank> {
        let collection = self.visible_collection(actor, id).await?;
        let questions = self.repo.list_questions(id).await?;
        Ok(QuestionBank {
            collection,
            questions,
        })
    }

    pub async fn update_collection(
        &self,
        actor: &User,
        id: i64,
        input: UpdateCollectionInput,
    ) -> ServiceResult<QuestionCollection> {
        let mut collection = self.editable_collection(actor, id).await?;

        if let Some(name) = input.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ServiceError::validation("Name cannot be empty"));
            }
            collection.name = name.to_string();
        }
        if let Some(description) = input.description {
            collection.description = Some(description).filter(|d| !d.trim().is_empty());
        }
        if let Some(is_private) = input.is_private {
            collection.is_private = is_private;
        }
        collection.updated_at = Utc::now();

        Ok(self.repo.update_collection(&collection).await?)
    }

    pub async fn delete_collection(&self, actor: &User, id: i64) -> ServiceResult<()> {
        self.editable_collection(actor, id).await?;
        self.repo.delete_collection(id).await?;
        tracing::info!(collection_id = id, "Question bank deleted");
        Ok(())
    }

    // ---- Questions ----

    pub async fn add_question(
        &self,
        actor: &User,
        collection_id: i64,
        input: QuestionInput,
    ) -> ServiceResult<Question> {
        input.validate().map_err(ServiceError::Validation)?;
        self.editable_collection(actor, collection_id).await?;
        Ok(self.repo.create_question(collection_id, &input).await?)
    }

    /// Replace prompt, metadata and the whole option list
    pub async fn replace_question(
        &self,
        actor: &User,
        question_id: i64,
        input: QuestionInput,
    ) -> ServiceResult<Question> {
        input.validate().map_err(ServiceError::Validation)?;
        let question = self.find_question(question_id).await?;
        self.editable_collection(actor, question.collection_id).await?;
        Ok(self.repo.replace_question(question_id, &input).await?)
    }

    pub async fn delete_question(&self, actor: &User, question_id: i64) -> ServiceResult<()> {
        let question = self.find_question(question_id).await?;
        self.editable_collection(actor, question.collection_id).await?;
        self.repo.delete_question(question_id).await?;
        Ok(())
    }

    // ---- Tryouts ----

    pub async fn create_tryout(&self, actor: &User, input: TryoutInput) -> ServiceResult<Tryout> {
        if !actor.is_teacher() {
            return Err(ServiceError::forbidden("Only teachers can create tryouts"));
        }
        input.validate().map_err(ServiceError::Validation)?;
        self.usable_collection(actor, input.collection_id).await?;

        let now = Utc::now();
        let tryout = self
            .repo
            .create_tryout(&Tryout {
                id: 0,
                name: input.name.trim().to_string(),
                description: input.description.filter(|d| !d.trim().is_empty()),
                collection_id: input.collection_id,
                author_id: actor.id,
                starts_at: input.starts_at,
                ends_at: input.ends_at,
                duration_minutes: input.duration_minutes,
                max_attempts: input.max_attempts,
                is_active: input.is_active,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(tryout_id = tryout.id, author_id = actor.id, "Tryout created");
        Ok(tryout)
    }

    pub async fn update_tryout(&self, actor: &User, id: i64, input: TryoutInput) -> ServiceResult<Tryout> {
        let mut tryout = self.editable_tryout(actor, id).await?;
        input.validate().map_err(ServiceError::Validation)?;
        if input.collection_id != tryout.collection_id {
            self.usable_collection(actor, input.collection_id).await?;
        }

        tryout.name = input.name.trim().to_string();
        tryout.description = input.description.filter(|d| !d.trim().is_empty());
        tryout.collection_id = input.collection_id;
        tryout.starts_at = input.starts_at;
        tryout.ends_at = input.ends_at;
        tryout.duration_minutes = input.duration_minutes;
        tryout.max_attempts = input.max_attempts;
        tryout.is_active = input.is_active;
        tryout.updated_at = Utc::now();

        Ok(self.repo.update_tryout(&tryout).await?)
    }

    pub async fn delete_tryout(&self, actor: &User, id: i64) -> ServiceResult<()> {
        self.editable_tryout(actor, id).await?;
        self.repo.delete_tryout(id).await?;
        tracing::info!(tryout_id = id, "Tryout deleted");
        Ok(())
    }

    /// Teachers see every tryout, students only active ones
    pub async fn list_tryouts(&self, actor: &User) -> ServiceResult<Vec<Tryout>> {
        Ok(self.repo.list_tryouts(!actor.is_teacher()).await?)
    }

    pub async fn get_tryout(&self, actor: &User, id: i64) -> ServiceResult<Tryout> {
        let tryout = self.find_tryout(id).await?;
        if !tryout.is_active && !actor.can_edit(tryout.author_id) {
            return Err(ServiceError::NotFound("Tryout"));
        }
        Ok(tryout)
    }

    // ---- Attempts ----

    /// Start an attempt, or resume the caller's unsubmitted one
    pub async fn start_attempt(&self, actor: &User, tryout_id: i64) -> ServiceResult<AttemptSheet> {
        let tryout = self.get_tryout(actor, tryout_id).await?;

        let attempt = match self.repo.open_attempt(tryout_id, actor.id).await? {
            Some(attempt) => attempt,
            None => {
                let now = Utc::now();
                if !tryout.is_open(now) {
                    return Err(ServiceError::Conflict("Tryout is not open".into()));
                }
                if self.repo.list_questions(tryout.collection_id).await?.is_empty() {
                    return Err(ServiceError::validation("Tryout has no questions"));
                }
                match self
                    .repo
                    .start_attempt(tryout_id, actor.id, now, tryout.max_attempts)
                    .await?
                {
                    AttemptStart::Created(attempt) => {
                        tracing::info!(attempt_id = attempt.id, tryout_id, user_id = actor.id, "Attempt started");
                        attempt
                    }
                    AttemptStart::Open(attempt) => attempt,
                    AttemptStart::LimitReached => {
                        return Err(ServiceError::Conflict(format!(
                            "Maximum of {} attempts reached",
                            tryout.max_attempts
                        )));
                    }
                }
            }
        };

        let questions = self.repo.list_questions(tryout.collection_id).await?;
        Ok(AttemptSheet {
            deadline: tryout.deadline(attempt.started_at),
            attempt,
            questions: questions.iter().map(Question::to_public).collect(),
        })
    }

    /// Grade and store the answers; an attempt can only be submitted once
    pub async fn submit(
        &self,
        actor: &User,
        attempt_id: i64,
        input: SubmitAnswersInput,
    ) -> ServiceResult<AttemptResult> {
        let mut attempt = self.find_attempt(attempt_id).await?;
        if attempt.user_id != actor.id {
            return Err(ServiceError::forbidden("Not your attempt"));
        }
        if attempt.is_submitted() {
            return Err(ServiceError::Conflict("Attempt already submitted".into()));
        }
        let tryout = self.find_tryout(attempt.tryout_id).await?;
        let questions = self.repo.list_questions(tryout.collection_id).await?;

        let answers = grade(&questions, &input.answers);
        let correct = answers.iter().filter(|a| a.is_correct).count() as i64;
        let total = questions.len() as i64;
        let now = Utc::now();

        attempt.submitted_at = Some(now);
        attempt.correct_count = correct;
        attempt.total_questions = total;
        attempt.score = Some(score_percent(correct, total));
        attempt.is_late = now > tryout.deadline(attempt.started_at);

        if !self.repo.submit_attempt(&attempt, &answers).await? {
            return Err(ServiceError::Conflict("Attempt already submitted".into()));
        }

        let score = attempt.score.unwrap_or(0);
        tracing::info!(attempt_id, user_id = actor.id, score, late = attempt.is_late, "Attempt submitted");

        if let Err(e) = self
            .activity
            .record(
                actor.id,
                ActivityType::SubmitTryout,
                tryout_xp(score),
                Some(attempt.id),
                Some(tryout.name.clone()),
            )
            .await
        {
            tracing::warn!(attempt_id, "Failed to record tryout activity: {}", e);
        }

        Ok(AttemptResult {
            review: review(&questions, &answers),
            attempt,
        })
    }

    /// Review of a submitted attempt, for its owner or the tryout's editors
    pub async fn results(&self, actor: &User, attempt_id: i64) -> ServiceResult<AttemptResult> {
        let attempt = self.find_attempt(attempt_id).await?;
        let tryout = self.find_tryout(attempt.tryout_id).await?;
        if attempt.user_id != actor.id && !actor.can_edit(tryout.author_id) {
            return Err(ServiceError::forbidden("Not your attempt"));
        }
        if !attempt.is_submitted() {
            return Err(ServiceError::Conflict("Attempt has not been submitted".into()));
        }

        let questions = self.repo.list_questions(tryout.collection_id).await?;
        let answers = self.repo.list_answers(attempt_id).await?;
        Ok(AttemptResult {
            review: review(&questions, &answers),
            attempt,
        })
    }

    pub async fn my_attempts(&self, actor: &User, tryout_id: i64) -> ServiceResult<Vec<TryoutAttempt>> {
        self.find_tryout(tryout_id).await?;
        Ok(self.repo.list_attempts(tryout_id, actor.id).await?)
    }

    /// Best submitted score per user
    pub async fn leaderboard(&self, tryout_id: i64, limit: i64) -> ServiceResult<Vec<TryoutLeaderboardEntry>> {
        self.find_tryout(tryout_id).await?;
        Ok(self.repo.leaderboard(tryout_id, limit.clamp(1, 100)).await?)
    }

    // ---- Lookups ----

    async fn find_collection(&self, id: i64) -> ServiceResult<QuestionCollection> {
        self.repo
            .get_collection(id)
            .await?
            .ok_or(ServiceError::NotFound("Question bank"))
    }

    async fn visible_collection(&self, actor: &User, id: i64) -> ServiceResult<QuestionCollection> {
        let collection = self.find_collection(id).await?;
        if actor.can_edit(collection.author_id) || (!collection.is_private && actor.is_teacher()) {
            Ok(collection)
        } else {
            Err(ServiceError::forbidden("Question bank is private"))
        }
    }

    async fn editable_collection(&self, actor: &User, id: i64) -> ServiceResult<QuestionCollection> {
        let collection = self.find_collection(id).await?;
        if !actor.can_edit(collection.author_id) {
            return Err(ServiceError::forbidden("Not the author of this question bank"));
        }
        Ok(collection)
    }

    /// Bank a new tryout may draw from: visible and not empty
    async fn usable_collection(&self, actor: &User, id: i64) -> ServiceResult<()> {
        self.visible_collection(actor, id).await?;
        if self.repo.list_questions(id).await?.is_empty() {
            return Err(ServiceError::validation("Question bank has no questions"));
        }
        Ok(())
    }

    async fn find_question(&self, id: i64) -> ServiceResult<Question> {
        self.repo
            .get_question(id)
            .await?
            .ok_or(ServiceError::NotFound("Question"))
    }

    async fn find_tryout(&self, id: i64) -> ServiceResult<Tryout> {
        self.repo
            .get_tryout(id)
            .await?
            .ok_or(ServiceError::NotFound("Tryout"))
    }

    async fn editable_tryout(&self, actor: &User, id: i64) -> ServiceResult<Tryout> {
        let tryout = self.find_tryout(id).await?;
        if !actor.can_edit(tryout.author_id) {
            return Err(ServiceError::forbidden("Not the author of this tryout"));
        }
        Ok(tryout)
    }

    async fn find_attempt(&self, id: i64) -> ServiceResult<TryoutAttempt> {
        self.repo
            .get_attempt(id)
            .await?
            .ok_or(ServiceError::NotFound("Attempt"))
    }
}

/// One graded answer per question, in question order
fn grade(questions: &[Question], chosen: &HashMap<i64, i64>) -> Vec<AttemptAnswer> {
    questions
        .iter()
        .map(|question| {
            let option = chosen
                .get(&question.id)
                .and_then(|option_id| question.options.iter().find(|o| o.id == *option_id));
            AttemptAnswer {
                question_id: question.id,
                option_id: option.map(|o| o.id),
                is_correct: option.map(|o| o.is_correct).unwrap_or(false),
            }
        })
        .collect()
}

fn review(questions: &[Question], answers: &[AttemptAnswer]) -> Vec<AnswerReview> {
    let by_question: HashMap<i64, &AttemptAnswer> =
        answers.iter().map(|a| (a.question_id, a)).collect();

    questions
        .iter()
        .map(|question| {
            let answer = by_question.get(&question.id);
            AnswerReview {
                question_id: question.id,
                prompt: question.prompt.clone(),
                chosen_option_id: answer.and_then(|a| a.option_id),
                correct_option_ids: question.correct_option_ids(),
                is_correct: answer.map(|a| a.is_correct).unwrap_or(false),
                explanation: question.explanation.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxTryoutRepository, SqlxUserRepository, UserRepository};
    use crate::db::test_utils::setup_pool;
    use crate::db::DbPool;
    use crate::models::{Difficulty, OptionInput, UserRole};
    use crate::services::test_support::{activity_service, create_user};
    use chrono::Duration;

    async fn setup() -> (DbPool, TryoutService) {
        let pool = setup_pool().await;
        let service = TryoutService::new(SqlxTryoutRepository::boxed(pool.clone()), activity_service(&pool));
        (pool, service)
    }

    fn question(prompt: &str) -> QuestionInput {
        QuestionInput {
            prompt: prompt.to_string(),
            attachment_url: None,
            explanation: Some("penjelasan".to_string()),
            difficulty: Difficulty::Easy,
            options: vec![
                OptionInput { text: "benar".to_string(), is_correct: true },
                OptionInput { text: "salah".to_string(), is_correct: false },
            ],
        }
    }

    fn tryout_input(collection_id: i64) -> TryoutInput {
        let now = Utc::now();
        TryoutInput {
            name: "Tryout TOPIK".to_string(),
            description: None,
            collection_id,
            starts_at: now - Duration::hours(1),
            ends_at: now + Duration::hours(1),
            duration_minutes: 60,
            max_attempts: 1,
            is_active: true,
        }
    }

    fn bank_input(is_private: bool) -> CreateCollectionInput {
        CreateCollectionInput {
            name: "Bank Soal".to_string(),
            description: None,
            is_private,
        }
    }

    /// Bank with two questions and an open tryout over it
    async fn seed(service: &TryoutService, guru: &User) -> (Tryout, Vec<Question>) {
        let bank = service.create_collection(guru, bank_input(false)).await.unwrap();
        let q1 = service.add_question(guru, bank.id, question("satu")).await.unwrap();
        let q2 = service.add_question(guru, bank.id, question("dua")).await.unwrap();
        let tryout = service.create_tryout(guru, tryout_input(bank.id)).await.unwrap();
        (tryout, vec![q1, q2])
    }

    #[tokio::test]
    async fn test_students_cannot_author() {
        let (pool, service) = setup().await;
        let murid = create_user(&pool, "Budi", UserRole::Murid).await;

        assert!(matches!(
            service.create_collection(&murid, bank_input(false)).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_question_rejected() {
        let (pool, service) = setup().await;
        let guru = create_user(&pool, "Kim", UserRole::Guru).await;
        let bank = service.create_collection(&guru, bank_input(false)).await.unwrap();

        let mut bad = question("?");
        bad.options.truncate(1);
        assert!(matches!(
            service.add_question(&guru, bank.id, bad).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_private_bank_hidden_from_other_teachers() {
        let (pool, service) = setup().await;
        let guru = create_user(&pool, "Kim", UserRole::Guru).await;
        let other = create_user(&pool, "Lee", UserRole::Guru).await;
        let bank = service.create_collection(&guru, bank_input(true)).await.unwrap();
        service.add_question(&guru, bank.id, question("satu")).await.unwrap();

        assert!(matches!(
            service.get_collection(&other, bank.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.create_tryout(&other, tryout_input(bank.id)).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert_eq!(service.get_collection(&guru, bank.id).await.unwrap().questions.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_bank_cannot_back_tryout() {
        let (pool, service) = setup().await;
        let guru = create_user(&pool, "Kim", UserRole::Guru).await;
        let bank = service.create_collection(&guru, bank_input(false)).await.unwrap();

        assert!(matches!(
            service.create_tryout(&guru, tryout_input(bank.id)).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_attempt_grading_and_single_submit() {
        let (pool, service) = setup().await;
        let guru = create_user(&pool, "Kim", UserRole::Guru).await;
        let murid = create_user(&pool, "Budi", UserRole::Murid).await;
        let (tryout, questions) = seed(&service, &guru).await;

        let sheet = service.start_attempt(&murid, tryout.id).await.unwrap();
        assert_eq!(sheet.questions.len(), 2);

        // Resuming returns the same open attempt
        let again = service.start_attempt(&murid, tryout.id).await.unwrap();
        assert_eq!(again.attempt.id, sheet.attempt.id);

        let correct = questions[0].correct_option_ids()[0];
        // An option from another question does not count
        let foreign = questions[0].options[1].id;
        let answers = HashMap::from([(questions[0].id, correct), (questions[1].id, foreign)]);

        let result = service
            .submit(&murid, sheet.attempt.id, SubmitAnswersInput { answers })
            .await
            .unwrap();
        assert_eq!(result.attempt.correct_count, 1);
        assert_eq!(result.attempt.score, Some(50));
        assert!(!result.attempt.is_late);
        assert_eq!(result.review[1].chosen_option_id, None);

        let resubmit = service
            .submit(&murid, sheet.attempt.id, SubmitAnswersInput { answers: HashMap::new() })
            .await;
        assert!(matches!(resubmit, Err(ServiceError::Conflict(_))));

        // max_attempts is 1
        assert!(matches!(
            service.start_attempt(&murid, tryout.id).await,
            Err(ServiceError::Conflict(_))
        ));

        let user = SqlxUserRepository::new(pool.clone()).get_by_id(murid.id).await.unwrap().unwrap();
        assert_eq!(user.xp, tryout_xp(50));
    }

    #[tokio::test]
    async fn test_simultaneous_starts_share_one_attempt() {
        let (pool, service) = setup().await;
        let guru = create_user(&pool, "Kim", UserRole::Guru).await;
        let murid = create_user(&pool, "Budi", UserRole::Murid).await;
        let (tryout, _) = seed(&service, &guru).await;

        let (a, b) = tokio::join!(
            service.start_attempt(&murid, tryout.id),
            service.start_attempt(&murid, tryout.id),
        );
        assert_eq!(a.unwrap().attempt.id, b.unwrap().attempt.id);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tryout_attempts WHERE tryout_id = ? AND user_id = ?")
            .bind(tryout.id)
            .bind(murid.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_results_visible_to_owner_and_author_only() {
        let (pool, service) = setup().await;
        let guru = create_user(&pool, "Kim", UserRole::Guru).await;
        let murid = create_user(&pool, "Budi", UserRole::Murid).await;
        let other = create_user(&pool, "Tono", UserRole::Murid).await;
        let (tryout, _) = seed(&service, &guru).await;

        let sheet = service.start_attempt(&murid, tryout.id).await.unwrap();
        assert!(matches!(
            service.results(&murid, sheet.attempt.id).await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            service.submit(&other, sheet.attempt.id, SubmitAnswersInput { answers: HashMap::new() }).await,
            Err(ServiceError::Forbidden(_))
        ));

        service
            .submit(&murid, sheet.attempt.id, SubmitAnswersInput { answers: HashMap::new() })
            .await
            .unwrap();

        assert!(service.results(&murid, sheet.attempt.id).await.is_ok());
        assert!(service.results(&guru, sheet.attempt.id).await.is_ok());
        assert!(matches!(
            service.results(&other, sheet.attempt.id).await,
            Err(ServiceError::Forbidden(_))
        ));

        let board = service.leaderboard(tryout.id, 10).await.unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].best_score, 0);
    }

    #[tokio::test]
    async fn test_closed_tryout_rejects_start() {
        let (pool, service) = setup().await;
        let guru = create_user(&pool, "Kim", UserRole::Guru).await;
        let murid = create_user(&pool, "Budi", UserRole::Murid).await;
        let (tryout, _) = seed(&service, &guru).await;

        let mut input = tryout_input(tryout.collection_id);
        input.starts_at = Utc::now() + Duration::hours(1);
        input.ends_at = Utc::now() + Duration::hours(2);
        service.update_tryout(&guru, tryout.id, input).await.unwrap();

        assert!(matches!(
            service.start_attempt(&murid, tryout.id).await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[test]
    fn test_grade_ignores_unknown_questions() {
        let q = Question {
            id: 1,
            collection_id: 1,
            prompt: "?".into(),
            attachment_url: None,
            explanation: None,
            difficulty: Difficulty::Medium,
            position: 1,
            options: vec![crate::models::QuestionOption {
                id: 7,
                question_id: 1,
                text: "a".into(),
                is_correct: true,
            }],
        };
        let answers = grade(&[q], &HashMap::from([(1, 7), (99, 7)]));
        assert_eq!(answers.len(), 1);
        assert!(answers[0].is_correct);
    }
}
