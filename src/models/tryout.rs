//! Question banks (koleksi soal), questions (soal), options (opsi) and tryouts

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 6;

/// Extra time accepted after the tryout duration before a submission is late
pub const LATE_GRACE_SECONDS: i64 = 60;

/// Question bank ("koleksi soal")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionCollection {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub author_id: i64,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "EASY"),
            Difficulty::Medium => write!(f, "MEDIUM"),
            Difficulty::Hard => write!(f, "HARD"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "EASY" => Ok(Difficulty::Easy),
            "MEDIUM" => Ok(Difficulty::Medium),
            "HARD" => Ok(Difficulty::Hard),
            _ => Err(anyhow::anyhow!("Invalid difficulty: {}", s)),
        }
    }
}

/// Question ("soal")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub collection_id: i64,
    pub prompt: String,
    /// Image or audio URL
    pub attachment_url: Option<String>,
    pub explanation: Option<String>,
    pub difficulty: Difficulty,
    pub position: i64,
    pub options: Vec<QuestionOption>,
}

impl Question {
    pub fn correct_option_ids(&self) -> Vec<i64> {
        self.options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.id)
            .collect()
    }

    /// Copy suitable for a running attempt: no answers, no explanation
    pub fn to_public(&self) -> PublicQuestion {
        PublicQuestion {
            id: self.id,
            prompt: self.prompt.clone(),
            attachment_url: self.attachment_url.clone(),
            difficulty: self.difficulty,
            options: self
                .options
                .iter()
                .map(|o| PublicOption {
                    id: o.id,
                    text: o.text.clone(),
                })
                .collect(),
        }
    }
}

/// Answer option ("opsi")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub is_correct: bool,
}

/// Question bank with its questions, answers included
#[derive(Debug, Clone, Serialize)]
pub struct QuestionBank {
    #[serde(flatten)]
    pub collection: QuestionCollection,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub prompt: String,
    pub attachment_url: Option<String>,
    pub difficulty: Difficulty,
    pub options: Vec<PublicOption>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicOption {
    pub id: i64,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCollectionInput {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCollectionInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_private: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptionInput {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// Create or replace a question together with its options
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionInput {
    pub prompt: String,
    pub attachment_url: Option<String>,
    pub explanation: Option<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub options: Vec<OptionInput>,
}

impl QuestionInput {
    /// Returns a human readable reason when the question is malformed
    pub fn validate(&self) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("Question prompt cannot be empty".to_string());
        }
        if self.options.len() < MIN_OPTIONS || self.options.len() > MAX_OPTIONS {
            return Err(format!(
                "A question needs between {} and {} options",
                MIN_OPTIONS, MAX_OPTIONS
            ));
        }
        if self.options.iter().any(|o| o.text.trim().is_empty()) {
            return Err("Option text cannot be empty".to_string());
        }
        if !self.options.iter().any(|o| o.is_correct) {
            return Err("At least one option must be correct".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tryout {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub collection_id: i64,
    pub author_id: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub max_attempts: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tryout {
    /// Whether a new attempt may start at `now`
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now >= self.starts_at && now <= self.ends_at
    }

    /// Latest on-time submission for an attempt started at `started_at`
    pub fn deadline(&self, started_at: DateTime<Utc>) -> DateTime<Utc> {
        started_at + Duration::minutes(self.duration_minutes) + Duration::seconds(LATE_GRACE_SECONDS)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TryoutInput {
    pub name: String,
    pub description: Option<String>,
    pub collection_id: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub duration_minutes: i64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_max_attempts() -> i64 {
    1
}

fn default_true() -> bool {
    true
}

impl TryoutInput {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Tryout name cannot be empty".to_string());
        }
        if self.ends_at <= self.starts_at {
            return Err("Tryout must end after it starts".to_string());
        }
        if self.duration_minutes <= 0 {
            return Err("Duration must be positive".to_string());
        }
        if self.max_attempts < 1 {
            return Err("max_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TryoutAttempt {
    pub id: i64,
    pub tryout_id: i64,
    pub user_id: i64,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub score: Option<i64>,
    pub correct_count: i64,
    pub total_questions: i64,
    pub is_late: bool,
}

impl TryoutAttempt {
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }
}

/// Attempt handed to the student: the attempt plus its questions
#[derive(Debug, Clone, Serialize)]
pub struct AttemptSheet {
    pub attempt: TryoutAttempt,
    pub deadline: DateTime<Utc>,
    pub questions: Vec<PublicQuestion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitAnswersInput {
    /// question id -> chosen option id
    pub answers: HashMap<i64, i64>,
}

/// Stored answer
#[derive(Debug, Clone, Serialize)]
pub struct AttemptAnswer {
    pub question_id: i64,
    pub option_id: Option<i64>,
    pub is_correct: bool,
}

/// Per-question review once an attempt is submitted
#[derive(Debug, Clone, Serialize)]
pub struct AnswerReview {
    pub question_id: i64,
    pub prompt: String,
    pub chosen_option_id: Option<i64>,
    pub correct_option_ids: Vec<i64>,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptResult {
    pub attempt: TryoutAttempt,
    pub review: Vec<AnswerReview>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TryoutLeaderboardEntry {
    pub rank: u32,
    pub user_id: i64,
    pub name: String,
    pub best_score: i64,
    pub submitted_at: DateTime<Utc>,
}

/// Percentage score rounded to the nearest integer
pub fn score_percent(correct: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    ((correct.clamp(0, total) as f64 * 100.0) / total as f64).round() as i64
}
