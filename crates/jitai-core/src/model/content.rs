//! Content arms and intervention types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// A selectable content variant. Every variant is one bandit arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    /// Open-ended reflection prompt. Also the fallback arm.
    Reflection,
    /// Guided breathing exercise
    BreathingExercise,
    /// Points, badges, streak challenge
    Gamification,
    /// Motivational quote
    Quote,
    /// Today's usage numbers vs. goal
    UsageStats,
    /// Appeal to the user's stated reasons for cutting down
    EmotionalAppeal,
    /// Suggest a better time to come back
    TimeAlternative,
    /// Suggest an offline activity instead
    ActivitySuggestion,
}

impl ContentType {
    /// Every arm, in canonical order.
    pub const ALL: [ContentType; 8] = [
        ContentType::Reflection,
        ContentType::BreathingExercise,
        ContentType::Gamification,
        ContentType::Quote,
        ContentType::UsageStats,
        ContentType::EmotionalAppeal,
        ContentType::TimeAlternative,
        ContentType::ActivitySuggestion,
    ];

    /// Arm returned when every arm is excluded.
    pub const FALLBACK: ContentType = ContentType::Reflection;

    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Reflection => "REFLECTION",
            ContentType::BreathingExercise => "BREATHING_EXERCISE",
            ContentType::Gamification => "GAMIFICATION",
            ContentType::Quote => "QUOTE",
            ContentType::UsageStats => "USAGE_STATS",
            ContentType::EmotionalAppeal => "EMOTIONAL_APPEAL",
            ContentType::TimeAlternative => "TIME_ALTERNATIVE",
            ContentType::ActivitySuggestion => "ACTIVITY_SUGGESTION",
        }
    }

    /// Parse a persisted arm id. Unknown ids are a caller bug.
    pub fn parse(arm_id: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .iter()
            .copied()
            .find(|arm| arm.as_str() == arm_id)
            .ok_or_else(|| ValidationError::UnknownArm {
                arm_id: arm_id.to_string(),
            })
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Kind of interruption, each with its own base cooldown clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterventionType {
    /// Overlay shown when the monitored app is opened
    Reminder,
    /// Interruption when a session timer runs out
    Timer,
}

impl InterventionType {
    pub const ALL: [InterventionType; 2] = [InterventionType::Reminder, InterventionType::Timer];

    pub fn as_str(self) -> &'static str {
        match self {
            InterventionType::Reminder => "REMINDER",
            InterventionType::Timer => "TIMER",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == value)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "intervention_type".to_string(),
                message: format!("unknown intervention type '{value}'"),
            })
    }
}

impl fmt::Display for InterventionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_matches_as_str_for_every_arm() {
        for arm in ContentType::ALL {
            assert_eq!(ContentType::parse(arm.as_str()).unwrap(), arm);
        }
    }

    #[test]
    fn test_parse_rejects_unknown_and_lowercase_ids() {
        assert!(matches!(
            ContentType::parse("reflection"),
            Err(ValidationError::UnknownArm { .. })
        ));
        assert!(ContentType::parse("").is_err());
    }

    #[test]
    fn test_serde_uses_screaming_case() {
        let json = serde_json::to_string(&ContentType::UsageStats).unwrap();
        assert_eq!(json, "\"USAGE_STATS\"");
        let parsed: InterventionType = serde_json::from_str("\"TIMER\"").unwrap();
        assert_eq!(parsed, InterventionType::Timer);
    }
}
