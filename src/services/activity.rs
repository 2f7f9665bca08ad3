//! Activity service
//!
//! Records XP-earning events and keeps the user's daily streak current.
//! A `LOGIN` counts once per local day; every other activity that names a
//! reference (module, article, attempt, session) counts once per reference.

use crate::db::repositories::{ActivityRepository, UserRepository};
use crate::models::{
    effective_streak, local_date, ActivityLog, ActivityOutcome, ActivityType, StreakInfo,
};
use crate::services::error::{ServiceError, ServiceResult};
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

const MAX_RECENT: i64 = 100;

pub struct ActivityService {
    user_repo: Arc<dyn UserRepository>,
    activity_repo: Arc<dyn ActivityRepository>,
    utc_offset_hours: i32,
}

impl ActivityService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        activity_repo: Arc<dyn ActivityRepository>,
        utc_offset_hours: i32,
    ) -> Self {
        Self {
            user_repo,
            activity_repo,
            utc_offset_hours,
        }
    }

    /// Local date used for streaks and the once-per-day login reward
    pub fn today(&self) -> NaiveDate {
        local_date(Utc::now(), self.utc_offset_hours)
    }

    /// Record an activity worth `xp` and advance the streak.
    ///
    /// Returns `recorded: false` without touching the user when the activity
    /// was already rewarded.
    pub async fn record(
        &self,
        user_id: i64,
        activity_type: ActivityType,
        xp: i64,
        reference_id: Option<i64>,
        description: Option<String>,
    ) -> ServiceResult<ActivityOutcome> {
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to load user")?
            .ok_or(ServiceError::NotFound("User"))?;

        let today = self.today();
        let log = ActivityLog {
            id: 0,
            user_id,
            activity_type,
            xp_earned: xp,
            description,
            reference_id,
            activity_date: today,
            created_at: Utc::now(),
        };

        let Some(progress) = self.activity_repo.record(&log).await? else {
            // Another request may have rewarded it first
            let user = self
                .user_repo
                .get_by_id(user_id)
                .await?
                .unwrap_or(user);
            return Ok(ActivityOutcome {
                recorded: false,
                xp_earned: 0,
                total_xp: user.xp,
                current_streak: effective_streak(user.last_activity_date, user.current_streak, today),
                longest_streak: user.longest_streak,
            });
        };

        tracing::debug!(
            user_id,
            activity = %activity_type,
            xp,
            streak = progress.current_streak,
            "Activity recorded"
        );

        Ok(ActivityOutcome {
            recorded: true,
            xp_earned: xp,
            total_xp: progress.total_xp,
            current_streak: progress.current_streak,
            longest_streak: progress.longest_streak,
        })
    }

    /// Record an activity with its fixed XP value
    pub async fn record_fixed(
        &self,
        user_id: i64,
        activity_type: ActivityType,
        reference_id: Option<i64>,
        description: Option<String>,
    ) -> ServiceResult<ActivityOutcome> {
        self.record(user_id, activity_type, activity_type.base_xp(), reference_id, description)
            .await
    }

    /// Streak as displayed: broken streaks read 0
    pub async fn streak_info(&self, user_id: i64) -> ServiceResult<StreakInfo> {
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        let today = self.today();
        Ok(StreakInfo {
            current_streak: effective_streak(user.last_activity_date, user.current_streak, today),
            longest_streak: user.longest_streak,
            last_activity_date: user.last_activity_date,
            active_today: user.last_activity_date == Some(today),
            xp: user.xp,
            level: user.level(),
        })
    }

    pub async fn recent(&self, user_id: i64, limit: i64) -> ServiceResult<Vec<ActivityLog>> {
        Ok(self
            .activity_repo
            .list_by_user(user_id, limit.clamp(1, MAX_RECENT))
            .await?)
    }
}
