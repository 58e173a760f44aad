//! The top-level intervention gate.
//!
//! Stages run in a fixed order and the first hard stop wins:
//!
//! 1. Persona and opportunity detection (diagnostics, never blocking)
//! 2. Reliable CRITICAL burden skips the intervention outright
//! 3. A HIGH-confidence timing delay waits for a better hour
//! 4. The base cooldown limiter, scaled by burden and content effectiveness
//! 5. Otherwise intervene now

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::base::BaseRateLimiter;
use crate::burden::{BurdenLevel, InterventionBurdenTracker};
use crate::model::{InterventionContext, InterventionType};
use crate::selector::AdaptiveContentSelector;
use crate::signals::{
    HeuristicOpportunityDetector, HeuristicPersonaDetector, InterventionDecision, OpportunityAssessment,
    OpportunityDetector, OpportunityLevel, Persona, PersonaDetection, PersonaDetector,
};
use crate::timing::{ContextualTimingOptimizer, TimingConfidence};

/// Stage that produced the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionSource {
    CriticalBurden,
    TimingOptimization,
    BaseRateLimiter,
    AllChecksPassed,
}

impl DecisionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionSource::CriticalBurden => "CRITICAL_BURDEN",
            DecisionSource::TimingOptimization => "TIMING_OPTIMIZATION",
            DecisionSource::BaseRateLimiter => "BASE_RATE_LIMITER",
            DecisionSource::AllChecksPassed => "ALL_CHECKS_PASSED",
        }
    }
}

/// Verdict plus every signal that fed it. Diagnostics are filled on every path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub decision: InterventionDecision,
    pub decision_source: DecisionSource,
    pub reason: String,
    pub cooldown_remaining_ms: i64,
    pub opportunity_score: u8,
    pub opportunity_level: OpportunityLevel,
    pub opportunity_decision: InterventionDecision,
    pub opportunity_breakdown: BTreeMap<String, i32>,
    pub persona: Persona,
    pub persona_confidence: f64,
    /// Level callers may act on (MODERATE when unreliable)
    pub burden_level: BurdenLevel,
    pub burden_score: i32,
    pub burden_reliable: bool,
    pub timing_confidence: TimingConfidence,
    /// Multiplier applied to the base cooldown
    pub cooldown_multiplier: f64,
    pub session_duration_ms: i64,
}

impl RateLimitResult {
    /// Persona exactly as the detector reported it.
    pub fn persona_detection(&self) -> PersonaDetection {
        PersonaDetection {
            persona: self.persona,
            confidence: self.persona_confidence,
        }
    }

    /// Opportunity exactly as the detector reported it.
    pub fn opportunity(&self) -> OpportunityAssessment {
        OpportunityAssessment {
            score: self.opportunity_score,
            level: self.opportunity_level,
            decision: self.opportunity_decision,
            breakdown: self.opportunity_breakdown.clone(),
        }
    }
}

pub struct AdaptiveInterventionRateLimiter {
    burden: Arc<InterventionBurdenTracker>,
    timing: Arc<ContextualTimingOptimizer>,
    base: Arc<dyn BaseRateLimiter>,
    persona: Arc<dyn PersonaDetector>,
    opportunity: Arc<dyn OpportunityDetector>,
    selector: Option<Arc<AdaptiveContentSelector>>,
}

impl AdaptiveInterventionRateLimiter {
    /// Gate with the heuristic persona and opportunity detectors.
    pub fn new(
        burden: Arc<InterventionBurdenTracker>,
        timing: Arc<ContextualTimingOptimizer>,
        base: Arc<dyn BaseRateLimiter>,
    ) -> Self {
        Self {
            burden,
            timing,
            base,
            persona: Arc::new(HeuristicPersonaDetector),
            opportunity: Arc::new(HeuristicOpportunityDetector),
            selector: None,
        }
    }

    pub fn with_detectors(
        mut self,
        persona: Arc<dyn PersonaDetector>,
        opportunity: Arc<dyn OpportunityDetector>,
    ) -> Self {
        self.persona = persona;
        self.opportunity = opportunity;
        self
    }

    /// Scale cooldowns by the selector's content frequency multiplier.
    pub fn with_selector(mut self, selector: Arc<AdaptiveContentSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    pub async fn can_show_intervention(
        &self,
        context: &InterventionContext,
        intervention_type: InterventionType,
        session_duration_ms: i64,
    ) -> RateLimitResult {
        self.can_show_intervention_at(context, intervention_type, session_duration_ms, Utc::now())
            .await
    }

    pub async fn can_show_intervention_at(
        &self,
        context: &InterventionContext,
        intervention_type: InterventionType,
        session_duration_ms: i64,
        now: DateTime<Utc>,
    ) -> RateLimitResult {
        let persona = self.persona.detect_persona(context);
        let opportunity = self.opportunity.detect_opportunity(context);
        let burden = self.burden.assess_at(now, false).await;

        let mut result = RateLimitResult {
            allowed: false,
            decision: InterventionDecision::SkipIntervention,
            decision_source: DecisionSource::CriticalBurden,
            reason: String::new(),
            cooldown_remaining_ms: 0,
            opportunity_score: opportunity.score,
            opportunity_level: opportunity.level,
            opportunity_decision: opportunity.decision,
            opportunity_breakdown: opportunity.breakdown.clone(),
            persona: persona.persona,
            persona_confidence: persona.confidence,
            burden_level: burden.effective_level(),
            burden_score: burden.score,
            burden_reliable: burden.reliable,
            timing_confidence: TimingConfidence::Low,
            cooldown_multiplier: 1.0,
            session_duration_ms,
        };

        if burden.is_critical() {
            result.reason = format!(
                "Critical intervention burden (score {}, {} samples)",
                burden.score, burden.metrics.sample_size
            );
            tracing::info!(
                app = %context.target_app,
                score = burden.score,
                "intervention skipped: critical burden"
            );
            return result;
        }

        let timing = self
            .timing
            .get_recommendation_at(
                &context.target_app,
                context.time_of_day,
                context.is_weekend,
                false,
                now,
            )
            .await;
        result.timing_confidence = timing.confidence;

        if timing.is_high_confidence_delay() {
            result.decision = InterventionDecision::WaitForBetterOpportunity;
            result.decision_source = DecisionSource::TimingOptimization;
            result.cooldown_remaining_ms = timing.recommended_delay_ms;
            result.reason = timing.reason;
            tracing::info!(
                app = %context.target_app,
                delay_ms = timing.recommended_delay_ms,
                "intervention delayed: poor timing"
            );
            return result;
        }

        let frequency = self
            .selector
            .as_ref()
            .map(|s| s.get_frequency_multiplier())
            .unwrap_or(1.0);
        let multiplier = burden.get_recommended_cooldown_multiplier() * frequency;
        result.cooldown_multiplier = multiplier;

        let verdict = self
            .base
            .can_show_intervention(intervention_type, context, multiplier, now);
        if !verdict.allowed {
            result.decision_source = DecisionSource::BaseRateLimiter;
            result.cooldown_remaining_ms = verdict.cooldown_remaining_ms;
            result.reason = verdict.reason;
            tracing::debug!(
                app = %context.target_app,
                remaining_ms = verdict.cooldown_remaining_ms,
                "intervention blocked by cooldown"
            );
            return result;
        }

        result.allowed = true;
        result.decision = InterventionDecision::InterveneNow;
        result.decision_source = DecisionSource::AllChecksPassed;
        result.reason = format!(
            "All checks passed ({} opportunity, {} burden)",
            opportunity.level.as_str(),
            result.burden_level.as_str()
        );
        tracing::debug!(app = %context.target_app, "intervention allowed");
        result
    }

    /// Restart the base cooldown clock. Outcome persistence is the caller's job.
    pub fn record_intervention(&self, intervention_type: InterventionType) {
        self.record_intervention_at(intervention_type, Utc::now());
    }

    pub fn record_intervention_at(&self, intervention_type: InterventionType, now: DateTime<Utc>) {
        self.base.record_intervention(intervention_type, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::CooldownRateLimiter;
    use crate::storage::{CooldownConfig, MemoryOutcomeStore};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn limiter() -> AdaptiveInterventionRateLimiter {
        let store = Arc::new(MemoryOutcomeStore::new());
        AdaptiveInterventionRateLimiter::new(
            Arc::new(InterventionBurdenTracker::new(store.clone())),
            Arc::new(ContextualTimingOptimizer::new(store)),
            Arc::new(CooldownRateLimiter::new(CooldownConfig::default())),
        )
    }

    #[tokio::test]
    async fn test_no_history_allows() {
        let result = limiter()
            .can_show_intervention_at(&InterventionContext::new("app", 14, 2), InterventionType::Reminder, 0, now())
            .await;
        assert!(result.allowed);
        assert_eq!(result.decision, InterventionDecision::InterveneNow);
        assert_eq!(result.decision_source, DecisionSource::AllChecksPassed);
        assert!(!result.burden_reliable);
        assert_eq!(result.timing_confidence, TimingConfidence::Low);
    }

    #[tokio::test]
    async fn test_recorded_intervention_blocks_until_cooldown() {
        let limiter = limiter();
        let ctx = InterventionContext::new("app", 14, 2);
        limiter.record_intervention_at(InterventionType::Reminder, now());

        let blocked = limiter
            .can_show_intervention_at(&ctx, InterventionType::Reminder, 60_000, now() + Duration::seconds(60))
            .await;
        assert!(!blocked.allowed);
        assert_eq!(blocked.decision_source, DecisionSource::BaseRateLimiter);
        assert_eq!(blocked.cooldown_remaining_ms, 540_000);
        assert_eq!(blocked.session_duration_ms, 60_000);
        assert!(!blocked.reason.is_empty());
    }
}
