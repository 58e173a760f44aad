//! Persona and opportunity signals consumed by selection and rate limiting.
//!
//! The decision core depends only on [`PersonaDetector`] and
//! [`OpportunityDetector`]. The heuristic implementations here are simple
//! context rules and can be swapped for a learned detector.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::model::InterventionContext;

/// Coarse behavior class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Persona {
    NewUser,
    CasualUser,
    ProblematicPattern,
    RegularUser,
}

impl Persona {
    pub fn as_str(self) -> &'static str {
        match self {
            Persona::NewUser => "NEW_USER",
            Persona::CasualUser => "CASUAL_USER",
            Persona::ProblematicPattern => "PROBLEMATIC_PATTERN",
            Persona::RegularUser => "REGULAR_USER",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersonaDetection {
    pub persona: Persona,
    pub confidence: f64,
}

/// Top-level verdict shared by opportunity assessments and the rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterventionDecision {
    InterveneNow,
    WaitForBetterOpportunity,
    SkipIntervention,
}

impl InterventionDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            InterventionDecision::InterveneNow => "INTERVENE_NOW",
            InterventionDecision::WaitForBetterOpportunity => "WAIT_FOR_BETTER_OPPORTUNITY",
            InterventionDecision::SkipIntervention => "SKIP_INTERVENTION",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpportunityLevel {
    Poor,
    Moderate,
    Good,
    Excellent,
}

impl OpportunityLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            75.. => OpportunityLevel::Excellent,
            55..=74 => OpportunityLevel::Good,
            35..=54 => OpportunityLevel::Moderate,
            _ => OpportunityLevel::Poor,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OpportunityLevel::Poor => "POOR",
            OpportunityLevel::Moderate => "MODERATE",
            OpportunityLevel::Good => "GOOD",
            OpportunityLevel::Excellent => "EXCELLENT",
        }
    }
}

/// How receptive the user likely is right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityAssessment {
    /// 0-100
    pub score: u8,
    pub level: OpportunityLevel,
    pub decision: InterventionDecision,
    /// Points contributed per factor
    pub breakdown: BTreeMap<String, i32>,
}

impl OpportunityAssessment {
    /// Assessment from a raw score; level and decision follow from it.
    pub fn from_score(score: u8, breakdown: BTreeMap<String, i32>) -> Self {
        let score = score.min(100);
        let level = OpportunityLevel::from_score(score);
        let decision = match level {
            OpportunityLevel::Poor => InterventionDecision::WaitForBetterOpportunity,
            _ => InterventionDecision::InterveneNow,
        };
        Self {
            score,
            level,
            decision,
            breakdown,
        }
    }
}

pub trait PersonaDetector: Send + Sync {
    fn detect_persona(&self, context: &InterventionContext) -> PersonaDetection;
}

pub trait OpportunityDetector: Send + Sync {
    fn detect_opportunity(&self, context: &InterventionContext) -> OpportunityAssessment;
}

/// Persona from install age, usage volume and goal overrun.
#[derive(Debug, Clone, Default)]
pub struct HeuristicPersonaDetector;

const NEW_USER_DAYS: u32 = 7;
const CASUAL_WEEKLY_AVERAGE_MINUTES: u32 = 30;

impl PersonaDetector for HeuristicPersonaDetector {
    fn detect_persona(&self, context: &InterventionContext) -> PersonaDetection {
        if context.days_since_install < NEW_USER_DAYS {
            let confidence = 0.9 - f64::from(context.days_since_install) * 0.05;
            return PersonaDetection {
                persona: Persona::NewUser,
                confidence,
            };
        }

        let binge_today = context.weekly_average_minutes > 0
            && f64::from(context.total_usage_today_minutes)
                > 1.5 * f64::from(context.weekly_average_minutes);
        let problem_signals = [
            context.is_over_goal,
            context.session_count_this_bout >= 3,
            context.quick_reopen_attempt,
            binge_today,
        ]
        .iter()
        .filter(|s| **s)
        .count();
        if problem_signals >= 2 {
            return PersonaDetection {
                persona: Persona::ProblematicPattern,
                confidence: (0.5 + 0.15 * problem_signals as f64).min(0.95),
            };
        }

        if context.weekly_average_minutes < CASUAL_WEEKLY_AVERAGE_MINUTES
            && context.total_usage_today_minutes < CASUAL_WEEKLY_AVERAGE_MINUTES
        {
            return PersonaDetection {
                persona: Persona::CasualUser,
                confidence: 0.7,
            };
        }

        PersonaDetection {
            persona: Persona::RegularUser,
            confidence: 0.6,
        }
    }
}

/// Additive 0-100 opportunity score from session state.
#[derive(Debug, Clone, Default)]
pub struct HeuristicOpportunityDetector;

const BASE_OPPORTUNITY: i32 = 50;

impl OpportunityDetector for HeuristicOpportunityDetector {
    fn detect_opportunity(&self, context: &InterventionContext) -> OpportunityAssessment {
        let mut breakdown = BTreeMap::new();

        let session = match context.current_session_minutes {
            0 => -10,
            1..=4 => 0,
            5..=14 => 5,
            _ => 15,
        };
        breakdown.insert("session_length".to_string(), session);

        if context.quick_reopen_attempt {
            breakdown.insert("quick_reopen".to_string(), 15);
        }
        if context.is_over_goal {
            breakdown.insert("over_goal".to_string(), 15);
        }
        if context.session_count_this_bout >= 3 {
            breakdown.insert("bout_length".to_string(), 10);
        }
        if context.is_early_morning() {
            breakdown.insert("early_morning".to_string(), -10);
        } else if context.is_late_night() {
            breakdown.insert("late_night".to_string(), 5);
        }

        let score = (BASE_OPPORTUNITY + breakdown.values().sum::<i32>()).clamp(0, 100);
        OpportunityAssessment::from_score(score as u8, breakdown)
    }
}
