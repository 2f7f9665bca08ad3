//! Activity log, XP awards and daily streak arithmetic

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One XP-earning event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: i64,
    pub user_id: i64,
    pub activity_type: ActivityType,
    pub xp_earned: i64,
    pub description: Option<String>,
    /// Entity the activity is about (module, article, tryout attempt, ...)
    pub reference_id: Option<i64>,
    /// Local date the activity counted for
    pub activity_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    Login,
    CompleteModule,
    SubmitTryout,
    AddVocabulary,
    ReadArticle,
    JoinLiveSession,
}

impl ActivityType {
    /// Fixed XP for the activity; tryout XP also depends on the score
    pub fn base_xp(&self) -> i64 {
        match self {
            ActivityType::Login => 5,
            ActivityType::CompleteModule => 50,
            ActivityType::SubmitTryout => 10,
            ActivityType::AddVocabulary => 2,
            ActivityType::ReadArticle => 5,
            ActivityType::JoinLiveSession => 20,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Login => "LOGIN",
            ActivityType::CompleteModule => "COMPLETE_MODULE",
            ActivityType::SubmitTryout => "SUBMIT_TRYOUT",
            ActivityType::AddVocabulary => "ADD_VOCABULARY",
            ActivityType::ReadArticle => "READ_ARTICLE",
            ActivityType::JoinLiveSession => "JOIN_LIVE_SESSION",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOGIN" => Ok(ActivityType::Login),
            "COMPLETE_MODULE" => Ok(ActivityType::CompleteModule),
            "SUBMIT_TRYOUT" => Ok(ActivityType::SubmitTryout),
            "ADD_VOCABULARY" => Ok(ActivityType::AddVocabulary),
            "READ_ARTICLE" => Ok(ActivityType::ReadArticle),
            "JOIN_LIVE_SESSION" => Ok(ActivityType::JoinLiveSession),
            _ => Err(anyhow::anyhow!("Invalid activity type: {}", s)),
        }
    }
}

/// XP for a submitted tryout with a 0..=100 score
pub fn tryout_xp(score: i64) -> i64 {
    ActivityType::SubmitTryout.base_xp() + score.clamp(0, 100) / 5
}

/// Local calendar date for a UTC instant
pub fn local_date(now: DateTime<Utc>, utc_offset_hours: i32) -> NaiveDate {
    match FixedOffset::east_opt(utc_offset_hours * 3600) {
        Some(offset) => now.with_timezone(&offset).date_naive(),
        None => now.date_naive(),
    }
}

/// Streak after an activity on `today`.
///
/// Same day keeps the streak, the following day extends it, any gap
/// restarts it at 1.
pub fn next_streak(last_active: Option<NaiveDate>, current: i64, today: NaiveDate) -> i64 {
    match last_active {
        Some(last) if last == today => current.max(1),
        Some(last) if last + Duration::days(1) == today => current + 1,
        _ => 1,
    }
}

/// Streak as shown to the user: broken streaks read as 0 before the next activity
pub fn effective_streak(last_active: Option<NaiveDate>, current: i64, today: NaiveDate) -> i64 {
    match last_active {
        Some(last) if last == today || last + Duration::days(1) == today => current,
        _ => 0,
    }
}

/// Streak summary for the mobile API
#[derive(Debug, Clone, Serialize)]
pub struct StreakInfo {
    pub current_streak: i64,
    pub longest_streak: i64,
    pub last_activity_date: Option<NaiveDate>,
    pub active_today: bool,
    pub xp: i64,
    pub level: i64,
}

/// XP and streak state written together with an activity log row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserProgress {
    pub total_xp: i64,
    pub current_streak: i64,
    pub longest_streak: i64,
}

/// Outcome of recording an activity
#[derive(Debug, Clone, Serialize)]
pub struct ActivityOutcome {
    /// False when the activity had already been rewarded
    pub recorded: bool,
    pub xp_earned: i64,
    pub total_xp: i64,
    pub current_streak: i64,
    pub longest_streak: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_streak_first_activity() {
        assert_eq!(next_streak(None, 0, date(2024, 5, 1)), 1);
    }

    #[test]
    fn test_streak_same_day_unchanged() {
        assert_eq!(next_streak(Some(date(2024, 5, 1)), 4, date(2024, 5, 1)), 4);
    }

    #[test]
    fn test_streak_next_day_increments() {
        assert_eq!(next_streak(Some(date(2024, 2, 29)), 4, date(2024, 3, 1)), 5);
    }

    #[test]
    fn test_streak_gap_resets() {
        assert_eq!(next_streak(Some(date(2024, 5, 1)), 9, date(2024, 5, 3)), 1);
    }

    #[test]
    fn test_effective_streak() {
        let today = date(2024, 5, 10);
        assert_eq!(effective_streak(Some(date(2024, 5, 10)), 3, today), 3);
        assert_eq!(effective_streak(Some(date(2024, 5, 9)), 3, today), 3);
        assert_eq!(effective_streak(Some(date(2024, 5, 8)), 3, today), 0);
        assert_eq!(effective_streak(None, 0, today), 0);
    }

    #[test]
    fn test_local_date_uses_offset() {
        // 20:00 UTC is already the next day in UTC+7
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap();
        assert_eq!(local_date(now, 7), date(2024, 5, 2));
        assert_eq!(local_date(now, 0), date(2024, 5, 1));
    }

    #[test]
    fn test_tryout_xp() {
        assert_eq!(tryout_xp(0), 10);
        assert_eq!(tryout_xp(100), 30);
        assert_eq!(tryout_xp(250), 30);
    }

    #[test]
    fn test_activity_type_roundtrip() {
        for t in [
            ActivityType::Login,
            ActivityType::CompleteModule,
            ActivityType::SubmitTryout,
            ActivityType::AddVocabulary,
            ActivityType::ReadArticle,
            ActivityType::JoinLiveSession,
        ] {
            assert_eq!(ActivityType::from_str(t.as_str()).unwrap(), t);
            assert_eq!(serde_json::to_string(&t).unwrap(), format!("\"{}\"", t));
        }
    }

    proptest! {
        #[test]
        fn streak_is_positive_and_bounded(
            offset in 0i64..10,
            current in 0i64..1000,
        ) {
            let today = date(2024, 6, 15);
            let last = today - Duration::days(offset);
            let next = next_streak(Some(last), current, today);

            prop_assert!(next >= 1);
            prop_assert!(next <= current.max(1) + 1);
            if offset >= 2 {
                prop_assert_eq!(next, 1);
            }
        }

        #[test]
        fn consecutive_days_count_up(days in 1i64..60) {
            let start = date(2024, 1, 1);
            let mut streak = 0;
            let mut last = None;
            for d in 0..days {
                let today = start + Duration::days(d);
                streak = next_streak(last, streak, today);
                last = Some(today);
            }
            prop_assert_eq!(streak, days);
        }
    }
}
