//! User model
//!
//! Users carry a role (ADMIN, GURU, MURID), a plan and their learning
//! progress counters (XP and daily streak).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// XP needed per level
pub const XP_PER_LEVEL: i64 = 1000;

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    /// Email address (unique, stored lowercase)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub plan: UserPlan,
    /// Avatar URL
    pub image: Option<String>,
    pub bio: Option<String>,
    pub xp: i64,
    pub current_streak: i64,
    pub longest_streak: i64,
    /// Local date of the last recorded activity
    pub last_activity_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user; the password must already be hashed.
    pub fn new(name: String, email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name,
            email,
            password_hash,
            role,
            plan: UserPlan::Free,
            image: None,
            bio: None,
            xp: 0,
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// GURU or ADMIN: may author courses, articles, question banks and host sessions
    pub fn is_teacher(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Guru)
    }

    /// Owner-or-admin rule used for every authored resource
    pub fn can_edit(&self, owner_id: i64) -> bool {
        self.is_admin() || self.id == owner_id
    }

    /// Premium content is open to premium users and to staff
    pub fn has_premium_access(&self) -> bool {
        self.plan == UserPlan::Premium || self.is_teacher()
    }

    pub fn level(&self) -> i64 {
        self.xp.max(0) / XP_PER_LEVEL + 1
    }
}

/// User role for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Admin,
    /// Teacher
    Guru,
    /// Student
    #[default]
    Murid,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "ADMIN"),
            UserRole::Guru => write!(f, "GURU"),
            UserRole::Murid => write!(f, "MURID"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ADMIN" => Ok(UserRole::Admin),
            "GURU" => Ok(UserRole::Guru),
            "MURID" => Ok(UserRole::Murid),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Subscription plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserPlan {
    #[default]
    Free,
    Premium,
}

impl fmt::Display for UserPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserPlan::Free => write!(f, "FREE"),
            UserPlan::Premium => write!(f, "PREMIUM"),
        }
    }
}

impl FromStr for UserPlan {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FREE" => Ok(UserPlan::Free),
            "PREMIUM" => Ok(UserPlan::Premium),
            _ => Err(anyhow::anyhow!("Invalid plan: {}", s)),
        }
    }
}

/// Input for updating a user's own profile
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileInput {
    pub name: Option<String>,
    pub image: Option<String>,
    pub bio: Option<String>,
}

/// Admin-only changes to a user account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminUpdateUserInput {
    pub role: Option<UserRole>,
    pub plan: Option<UserPlan>,
}

/// Leaderboard row
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: i64,
    pub name: String,
    pub image: Option<String>,
    pub xp: i64,
    pub level: i64,
    pub current_streak: i64,
}
