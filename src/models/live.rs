//! Video rooms and scheduled live sessions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ad-hoc video room hosted by a GURU
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub course_id: Option<i64>,
    pub creator_id: i64,
    /// Room name on the video service
    pub video_room: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Course-bound live class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSession {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub course_id: i64,
    pub creator_id: i64,
    pub video_room: String,
    pub status: LiveSessionStatus,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LiveSessionStatus {
    #[default]
    Scheduled,
    Live,
    Ended,
}

impl fmt::Display for LiveSessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiveSessionStatus::Scheduled => write!(f, "SCHEDULED"),
            LiveSessionStatus::Live => write!(f, "LIVE"),
            LiveSessionStatus::Ended => write!(f, "ENDED"),
        }
    }
}

impl FromStr for LiveSessionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SCHEDULED" => Ok(LiveSessionStatus::Scheduled),
            "LIVE" => Ok(LiveSessionStatus::Live),
            "ENDED" => Ok(LiveSessionStatus::Ended),
            _ => Err(anyhow::anyhow!("Invalid live session status: {}", s)),
        }
    }
}

/// A user attached to a room or live session
#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub user_id: i64,
    pub name: String,
    pub image: Option<String>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveSessionDetail {
    #[serde(flatten)]
    pub session: LiveSession,
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomDetail {
    #[serde(flatten)]
    pub room: Room,
    pub members: Vec<Participant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoomInput {
    pub name: String,
    pub description: Option<String>,
    pub course_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLiveSessionInput {
    pub name: String,
    pub description: Option<String>,
    pub course_id: i64,
    pub scheduled_at: DateTime<Utc>,
}

/// Credentials handed to a client joining a video room
#[derive(Debug, Clone, Serialize)]
pub struct JoinToken {
    pub token: String,
    pub url: String,
    pub room: String,
    pub identity: String,
}
