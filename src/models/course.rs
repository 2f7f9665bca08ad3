//! Course and module models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A course authored by a GURU
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub level: CourseLevel,
    pub thumbnail: Option<String>,
    pub author_id: i64,
    pub is_published: bool,
    /// Only premium members (and staff) may join
    pub is_premium: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CourseLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for CourseLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CourseLevel::Beginner => write!(f, "BEGINNER"),
            CourseLevel::Intermediate => write!(f, "INTERMEDIATE"),
            CourseLevel::Advanced => write!(f, "ADVANCED"),
        }
    }
}

impl FromStr for CourseLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BEGINNER" => Ok(CourseLevel::Beginner),
            "INTERMEDIATE" => Ok(CourseLevel::Intermediate),
            "ADVANCED" => Ok(CourseLevel::Advanced),
            _ => Err(anyhow::anyhow!("Invalid course level: {}", s)),
        }
    }
}

/// A lesson inside a course, ordered by `position` (1-based)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub description: String,
    /// Markdown source
    pub content: String,
    pub content_html: String,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Course with its ordered modules
#[derive(Debug, Clone, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub modules: Vec<Module>,
    pub enrolled: bool,
    pub member_count: i64,
}

/// Catalogue row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseSummary {
    #[serde(flatten)]
    pub course: Course,
    pub author_name: String,
    pub module_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCourseInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub level: CourseLevel,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub is_premium: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCourseInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub level: Option<CourseLevel>,
    pub thumbnail: Option<String>,
    pub is_published: Option<bool>,
    pub is_premium: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateModuleInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateModuleInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
}

/// Completion progress of one learner in one course
#[derive(Debug, Clone, Serialize)]
pub struct CourseProgress {
    pub course_id: i64,
    pub completed_module_ids: Vec<i64>,
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
}

impl CourseProgress {
    pub fn new(course_id: i64, completed_module_ids: Vec<i64>, total: usize) -> Self {
        let completed = completed_module_ids.len().min(total);
        let percent = if total == 0 {
            0
        } else {
            ((completed * 100) / total) as u8
        };
        Self {
            course_id,
            completed_module_ids,
            completed,
            total,
            percent,
        }
    }
}
