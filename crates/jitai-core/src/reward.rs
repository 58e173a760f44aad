//! Reward computation for intervention outcomes.
//!
//! Converts the facts observed after an intervention into a reward in
//! `[0.0, 1.0]`, used both as the bandit feedback signal and for analytics.
//!
//! # Reward Scale
//! - 1.0: user went back (left the app)
//! - 0.3: user continued
//! - 0.1: overlay timed out
//! - 0.0: overlay dismissed
//! - 0.5: unknown choice
//!
//! Modifiers are additive and the sum is clamped:
//! - HELPFUL feedback +0.2, DISRUPTIVE feedback -0.3
//! - session after the intervention <= 5 min +0.1, > 15 min -0.1
//! - session ended (did not continue) +0.1
//! - reopened in < 2 min -0.2, reopened after > 5 min +0.1
//!
//! A boolean quick-reopen flag and an explicit reopen delay are evaluated
//! independently, so both penalties apply when both are supplied.

use serde::{Deserialize, Serialize};

use crate::model::{InterventionOutcomeRecord, UserChoice, UserFeedback};

const MINUTE_MS: i64 = 60_000;

const SHORT_SESSION_MS: i64 = 5 * MINUTE_MS;
const EXTENDED_SESSION_MS: i64 = 15 * MINUTE_MS;
const QUICK_REOPEN_MS: i64 = 2 * MINUTE_MS;
const SLOW_REOPEN_MS: i64 = 5 * MINUTE_MS;

const HELPFUL_BONUS: f64 = 0.2;
const DISRUPTIVE_PENALTY: f64 = 0.3;
const SHORT_SESSION_BONUS: f64 = 0.1;
const EXTENDED_SESSION_PENALTY: f64 = 0.1;
const SESSION_ENDED_BONUS: f64 = 0.1;
const QUICK_REOPEN_PENALTY: f64 = 0.2;
const SLOW_REOPEN_BONUS: f64 = 0.1;

const EXPLORATION_BONUS_SCALE: f64 = 0.1;

/// Facts about one intervention outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardInput {
    pub choice: UserChoice,

    #[serde(default)]
    pub feedback: UserFeedback,

    /// `Some(false)` when the monitored session ended after the intervention
    #[serde(default)]
    pub session_continued: Option<bool>,

    /// How long the session lasted after the intervention was shown
    #[serde(default)]
    pub session_duration_after_ms: Option<i64>,

    /// Caller-detected quick reopen
    #[serde(default)]
    pub quick_reopen: Option<bool>,

    /// Measured delay until the app was opened again
    #[serde(default)]
    pub reopen_delay_ms: Option<i64>,
}

impl RewardInput {
    /// Input with only a choice and no modifiers.
    pub fn new(choice: UserChoice) -> Self {
        Self {
            choice,
            feedback: UserFeedback::None,
            session_continued: None,
            session_duration_after_ms: None,
            quick_reopen: None,
            reopen_delay_ms: None,
        }
    }

    /// Parse raw strings at the boundary.
    pub fn from_raw(choice: &str, feedback: Option<&str>) -> Self {
        Self {
            feedback: UserFeedback::parse_opt(feedback),
            ..Self::new(UserChoice::parse(choice))
        }
    }

    pub fn with_feedback(mut self, feedback: UserFeedback) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn with_session_continued(mut self, continued: bool) -> Self {
        self.session_continued = Some(continued);
        self
    }

    pub fn with_session_duration_after_ms(mut self, ms: i64) -> Self {
        self.session_duration_after_ms = Some(ms);
        self
    }

    pub fn with_quick_reopen(mut self, quick_reopen: bool) -> Self {
        self.quick_reopen = Some(quick_reopen);
        self
    }

    pub fn with_reopen_delay_ms(mut self, ms: i64) -> Self {
        self.reopen_delay_ms = Some(ms);
        self
    }

    /// Reward input reconstructed from a persisted outcome.
    pub fn from_record(record: &InterventionOutcomeRecord) -> Self {
        Self {
            choice: record.user_choice,
            feedback: record.user_feedback,
            session_continued: Some(!record.session_ended_normally),
            session_duration_after_ms: record.session_duration_after_ms(),
            quick_reopen: Some(record.quick_reopen_flag),
            reopen_delay_ms: None,
        }
    }
}

/// Base reward for a choice before modifiers.
pub fn base_reward(choice: UserChoice) -> f64 {
    match choice {
        UserChoice::GoBack => 1.0,
        UserChoice::Continue => 0.3,
        UserChoice::Timeout => 0.1,
        UserChoice::Dismiss => 0.0,
        UserChoice::Unknown => 0.5,
    }
}

/// Compute the clamped reward for an outcome.
pub fn calculate_reward(input: &RewardInput) -> f64 {
    let mut reward = base_reward(input.choice);

    match input.feedback {
        UserFeedback::Helpful => reward += HELPFUL_BONUS,
        UserFeedback::Disruptive => reward -= DISRUPTIVE_PENALTY,
        UserFeedback::None => {}
    }

    if let Some(after_ms) = input.session_duration_after_ms {
        if after_ms <= SHORT_SESSION_MS {
            reward += SHORT_SESSION_BONUS;
        } else if after_ms > EXTENDED_SESSION_MS {
            reward -= EXTENDED_SESSION_PENALTY;
        }
    }

    if input.session_continued == Some(false) {
        reward += SESSION_ENDED_BONUS;
    }

    // Known anomaly: flag and delay both penalize the same signal.
    if input.quick_reopen == Some(true) {
        reward -= QUICK_REOPEN_PENALTY;
    }
    if let Some(delay_ms) = input.reopen_delay_ms {
        if delay_ms < QUICK_REOPEN_MS {
            reward -= QUICK_REOPEN_PENALTY;
        } else if delay_ms > SLOW_REOPEN_MS {
            reward += SLOW_REOPEN_BONUS;
        }
    }

    clamp_unit(reward)
}

/// Bernoulli-only reward: 1.0 for GO_BACK, 0.0 otherwise.
pub fn calculate_binary_reward(choice: UserChoice) -> f64 {
    if choice == UserChoice::GoBack {
        1.0
    } else {
        0.0
    }
}

/// GO_BACK always succeeds; any other choice succeeds with HELPFUL feedback.
pub fn is_successful_outcome(choice: UserChoice, feedback: UserFeedback) -> bool {
    choice == UserChoice::GoBack || feedback == UserFeedback::Helpful
}

/// Add an exploration bonus of `(1 - confidence) * 0.1` for display.
///
/// Out-of-range inputs clamp instead of failing.
pub fn calculate_normalized_reward(base: f64, confidence: f64) -> f64 {
    let confidence = if confidence.is_nan() { 0.0 } else { confidence };
    clamp_unit(base + (1.0 - confidence) * EXPLORATION_BONUS_SCALE)
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
