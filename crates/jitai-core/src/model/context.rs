//! Per-call context snapshot supplied by the session detector.

use serde::{Deserialize, Serialize};

use crate::timing::hours::is_night_hour;

/// How hard the intervention is to get past.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrictionLevel {
    #[default]
    Gentle,
    Moderate,
    Firm,
    Locked,
}

/// Snapshot of the user's situation at the moment an app was opened.
///
/// Owned by the caller; the core only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterventionContext {
    /// Local hour of day (0-23)
    pub time_of_day: u8,

    /// Day of week (0-6, Sunday=0)
    pub day_of_week: u8,

    pub is_weekend: bool,

    pub target_app: String,

    pub current_session_minutes: u32,

    /// Sessions opened in the current usage bout
    pub session_count_this_bout: u32,

    /// Epoch ms when the previous session for this app ended
    pub last_session_end_time: Option<i64>,

    pub time_since_last_session_ms: Option<i64>,

    /// App reopened shortly after an intervention sent the user away
    pub quick_reopen_attempt: bool,

    pub total_usage_today_minutes: u32,

    pub total_usage_yesterday_minutes: u32,

    pub weekly_average_minutes: u32,

    pub goal_minutes: Option<u32>,

    pub is_over_goal: bool,

    pub streak_days: u32,

    pub friction_level: FrictionLevel,

    pub days_since_install: u32,

    pub best_session_minutes: Option<u32>,
}

impl Default for InterventionContext {
    fn default() -> Self {
        Self {
            time_of_day: 12,
            day_of_week: 1,
            is_weekend: false,
            target_app: String::new(),
            current_session_minutes: 0,
            session_count_this_bout: 1,
            last_session_end_time: None,
            time_since_last_session_ms: None,
            quick_reopen_attempt: false,
            total_usage_today_minutes: 0,
            total_usage_yesterday_minutes: 0,
            weekly_average_minutes: 0,
            goal_minutes: None,
            is_over_goal: false,
            streak_days: 0,
            friction_level: FrictionLevel::Gentle,
            days_since_install: 0,
            best_session_minutes: None,
        }
    }
}

impl InterventionContext {
    /// Context for `target_app` at a given local hour and weekday.
    pub fn new(target_app: impl Into<String>, time_of_day: u8, day_of_week: u8) -> Self {
        let day_of_week = day_of_week % 7;
        Self {
            target_app: target_app.into(),
            time_of_day: time_of_day % 24,
            day_of_week,
            is_weekend: day_of_week == 0 || day_of_week == 6,
            ..Self::default()
        }
    }

    /// 22:00-05:59.
    pub fn is_late_night(&self) -> bool {
        is_night_hour(self.time_of_day)
    }

    /// 06:00-08:59.
    pub fn is_early_morning(&self) -> bool {
        (6..=8).contains(&self.time_of_day)
    }

    /// No previous session has ever ended for this app.
    pub fn is_first_session(&self) -> bool {
        self.last_session_end_time.is_none() && self.time_since_last_session_ms.is_none()
    }
}
