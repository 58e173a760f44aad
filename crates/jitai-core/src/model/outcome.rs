//! Persisted intervention outcomes and the closed enums parsed at the boundary.

use chrono::{Datelike, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::content::{ContentType, InterventionType};
use crate::timing::hours::is_night_hour;

/// What the user did when the intervention was shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UserChoice {
    /// Left the monitored app
    GoBack,
    /// Dismissed the overlay and kept using the app
    Continue,
    /// Closed the overlay without choosing
    Dismiss,
    /// Overlay expired with no interaction
    Timeout,
    /// Anything else, including the empty string
    Unknown,
}

impl UserChoice {
    /// Exact-case parse. No case folding: `"go_back"` is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "GO_BACK" => UserChoice::GoBack,
            "CONTINUE" => UserChoice::Continue,
            "DISMISS" => UserChoice::Dismiss,
            "TIMEOUT" => UserChoice::Timeout,
            _ => UserChoice::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserChoice::GoBack => "GO_BACK",
            UserChoice::Continue => "CONTINUE",
            UserChoice::Dismiss => "DISMISS",
            UserChoice::Timeout => "TIMEOUT",
            UserChoice::Unknown => "UNKNOWN",
        }
    }
}

impl From<String> for UserChoice {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<UserChoice> for String {
    fn from(choice: UserChoice) -> Self {
        choice.as_str().to_string()
    }
}

/// Explicit feedback sentiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UserFeedback {
    Helpful,
    Disruptive,
    #[default]
    None,
}

impl UserFeedback {
    /// Exact-case parse; anything but `HELPFUL` / `DISRUPTIVE` is `None`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "HELPFUL" => UserFeedback::Helpful,
            "DISRUPTIVE" => UserFeedback::Disruptive,
            _ => UserFeedback::None,
        }
    }

    pub fn parse_opt(raw: Option<&str>) -> Self {
        raw.map(Self::parse).unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserFeedback::Helpful => "HELPFUL",
            UserFeedback::Disruptive => "DISRUPTIVE",
            UserFeedback::None => "NONE",
        }
    }

    pub fn is_explicit(self) -> bool {
        !matches!(self, UserFeedback::None)
    }
}

impl From<String> for UserFeedback {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<UserFeedback> for String {
    fn from(feedback: UserFeedback) -> Self {
        feedback.as_str().to_string()
    }
}

/// One row per shown intervention. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionOutcomeRecord {
    pub session_id: String,

    /// Package/bundle id of the monitored app
    pub target_app: String,

    pub intervention_type: InterventionType,

    /// Arm that was shown
    pub content_type: ContentType,

    /// Local hour of day (0-23)
    pub hour_of_day: u8,

    /// Day of week (0-6, Sunday=0)
    pub day_of_week: u8,

    pub is_weekend: bool,

    /// Derived: hour >= 22 or hour <= 5
    pub is_late_night: bool,

    #[serde(default)]
    pub session_count_this_bout: u32,

    #[serde(default)]
    pub quick_reopen_flag: bool,

    #[serde(default)]
    pub session_duration_at_show_ms: i64,

    pub user_choice: UserChoice,

    #[serde(default)]
    pub time_to_decision_ms: i64,

    #[serde(default)]
    pub user_feedback: UserFeedback,

    #[serde(default)]
    pub was_snoozed: bool,

    /// Epoch milliseconds
    pub timestamp: i64,

    #[serde(default)]
    pub session_ended_normally: bool,

    #[serde(default)]
    pub final_session_duration_ms: Option<i64>,
}

impl InterventionOutcomeRecord {
    /// Create a record whose calendar fields are derived from `timestamp` in UTC.
    ///
    /// Callers that know the user's local time should follow up with
    /// [`at_local_time`](Self::at_local_time).
    pub fn new(
        session_id: impl Into<String>,
        target_app: impl Into<String>,
        content_type: ContentType,
        user_choice: UserChoice,
        timestamp: i64,
    ) -> Self {
        let utc = Utc
            .timestamp_millis_opt(timestamp)
            .single()
            .unwrap_or_else(Utc::now);
        let record = Self {
            session_id: session_id.into(),
            target_app: target_app.into(),
            intervention_type: InterventionType::Reminder,
            content_type,
            hour_of_day: 0,
            day_of_week: 0,
            is_weekend: false,
            is_late_night: false,
            session_count_this_bout: 1,
            quick_reopen_flag: false,
            session_duration_at_show_ms: 0,
            user_choice,
            time_to_decision_ms: 0,
            user_feedback: UserFeedback::None,
            was_snoozed: false,
            timestamp,
            session_ended_normally: false,
            final_session_duration_ms: None,
        };
        record.at_local_time(utc.hour() as u8, utc.weekday().num_days_from_sunday() as u8)
    }

    /// Override hour/day with the user's local clock.
    pub fn at_local_time(mut self, hour_of_day: u8, day_of_week: u8) -> Self {
        self.hour_of_day = hour_of_day % 24;
        self.day_of_week = day_of_week % 7;
        self.is_weekend = self.day_of_week == 0 || self.day_of_week == 6;
        self.is_late_night = is_night_hour(self.hour_of_day);
        self
    }

    /// Wall time the session ran after the intervention was shown.
    pub fn session_duration_after_ms(&self) -> Option<i64> {
        self.final_session_duration_ms
            .map(|total| (total - self.session_duration_at_show_ms).max(0))
    }
}

impl Default for InterventionOutcomeRecord {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            target_app: String::new(),
            intervention_type: InterventionType::Reminder,
            content_type: ContentType::FALLBACK,
            hour_of_day: 0,
            day_of_week: 0,
            is_weekend: false,
            is_late_night: true,
            session_count_this_bout: 0,
            quick_reopen_flag: false,
            session_duration_at_show_ms: 0,
            user_choice: UserChoice::Unknown,
            time_to_decision_ms: 0,
            user_feedback: UserFeedback::None,
            was_snoozed: false,
            timestamp: 0,
            session_ended_normally: false,
            final_session_duration_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_parse_is_case_sensitive() {
        assert_eq!(UserChoice::parse("GO_BACK"), UserChoice::GoBack);
        assert_eq!(UserChoice::parse("go_back"), UserChoice::Unknown);
        assert_eq!(UserChoice::parse(""), UserChoice::Unknown);
    }

    #[test]
    fn test_feedback_parse_is_case_sensitive() {
        assert_eq!(UserFeedback::parse("HELPFUL"), UserFeedback::Helpful);
        assert_eq!(UserFeedback::parse("Helpful"), UserFeedback::None);
        assert_eq!(UserFeedback::parse_opt(None), UserFeedback::None);
    }

    #[test]
    fn test_lenient_deserialization_of_unknown_choice() {
        let choice: UserChoice = serde_json::from_str("\"SNOOZE\"").unwrap();
        assert_eq!(choice, UserChoice::Unknown);
        let json = serde_json::to_string(&UserChoice::Timeout).unwrap();
        assert_eq!(json, "\"TIMEOUT\"");
    }

    #[test]
    fn test_local_time_derives_weekend_and_late_night() {
        let record = InterventionOutcomeRecord::new(
            "s1",
            "com.example.feed",
            ContentType::Quote,
            UserChoice::GoBack,
            0,
        )
        .at_local_time(23, 6);
        assert!(record.is_weekend);
        assert!(record.is_late_night);

        let record = record.at_local_time(14, 3);
        assert!(!record.is_weekend);
        assert!(!record.is_late_night);
    }

    #[test]
    fn test_new_derives_calendar_from_timestamp() {
        // 2024-01-06T23:30:00Z is a Saturday
        let ts = Utc.with_ymd_and_hms(2024, 1, 6, 23, 30, 0).unwrap().timestamp_millis();
        let record = InterventionOutcomeRecord::new("s", "app", ContentType::Quote, UserChoice::Dismiss, ts);
        assert_eq!(record.hour_of_day, 23);
        assert_eq!(record.day_of_week, 6);
        assert!(record.is_weekend);
        assert!(record.is_late_night);
    }

    #[test]
    fn test_session_duration_after() {
        let mut record = InterventionOutcomeRecord::default();
        assert_eq!(record.session_duration_after_ms(), None);
        record.session_duration_at_show_ms = 60_000;
        record.final_session_duration_ms = Some(240_000);
        assert_eq!(record.session_duration_after_ms(), Some(180_000));
    }
}
