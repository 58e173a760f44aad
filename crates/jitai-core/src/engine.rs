//! Wiring of every component behind one handle.
//!
//! Callers own the event loop: one [`InterventionEngine::decide`] per app-open
//! trigger, then [`InterventionEngine::record_outcome`] and
//! [`InterventionEngine::log_outcome`] once the user has responded.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::bandit::{ArmStats, ThompsonSamplingEngine};
use crate::burden::{BurdenReport, BurdenTrend, FatigueRecovery, InterventionBurdenTracker, RestRecoveryTracker};
use crate::error::Result;
use crate::limiter::{AdaptiveInterventionRateLimiter, CooldownRateLimiter, RateLimitResult};
use crate::model::{ContentType, InterventionContext, InterventionOutcomeRecord, InterventionType};
use crate::reward::{calculate_reward, RewardInput};
use crate::selector::{AdaptiveContentSelector, ContentSelection, RecordedOutcome};
use crate::signals::{
    OpportunityAssessment, OpportunityDetector, PersonaDetection, PersonaDetector,
};
use crate::storage::{Config, Database, KeyValueStore, MemoryKeyValueStore, MemoryOutcomeStore, OutcomeStore};
use crate::timing::{ContextualTimingOptimizer, TimingRecommendation};

/// Gate verdict and, when allowed, the content to show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub rate_limit: RateLimitResult,
    pub content: Option<ContentSelection>,
}

pub struct InterventionEngine {
    config: Config,
    store: Arc<dyn OutcomeStore>,
    bandit: Arc<ThompsonSamplingEngine>,
    selector: Arc<AdaptiveContentSelector>,
    burden: Arc<InterventionBurdenTracker>,
    timing: Arc<ContextualTimingOptimizer>,
    limiter: AdaptiveInterventionRateLimiter,
}

impl InterventionEngine {
    pub fn new(config: Config, store: Arc<dyn OutcomeStore>, kv: Arc<dyn KeyValueStore>) -> Self {
        let bandit = Arc::new(ThompsonSamplingEngine::with_config(
            kv.clone(),
            config.bandit.clone(),
        ));
        let selector = Arc::new(AdaptiveContentSelector::with_config(
            bandit.clone(),
            config.selector.clone(),
        ));
        let recovery: Arc<dyn FatigueRecovery> =
            Arc::new(RestRecoveryTracker::new(config.recovery.clone()));
        let burden = Arc::new(InterventionBurdenTracker::with_recovery(
            store.clone(),
            config.burden.clone(),
            Some(recovery),
        ));
        let timing = Arc::new(ContextualTimingOptimizer::with_config(
            store.clone(),
            config.timing.clone(),
        ));
        let base = Arc::new(CooldownRateLimiter::with_store(config.cooldown.clone(), kv));
        let limiter = AdaptiveInterventionRateLimiter::new(burden.clone(), timing.clone(), base)
            .with_selector(selector.clone());

        Self {
            config,
            store,
            bandit,
            selector,
            burden,
            timing,
            limiter,
        }
    }

    /// Engine backed by the SQLite database in the data directory.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub fn open(config: Config) -> Result<Self> {
        let db = Arc::new(Database::open()?);
        Ok(Self::new(config, db.clone(), db))
    }

    /// Engine backed by a given database handle.
    pub fn with_database(config: Config, db: Arc<Database>) -> Self {
        Self::new(config, db.clone(), db)
    }

    pub fn in_memory(config: Config) -> Self {
        Self::new(
            config,
            Arc::new(MemoryOutcomeStore::new()),
            Arc::new(MemoryKeyValueStore::new()),
        )
    }

    /// Replace the gate's persona and opportunity detectors.
    pub fn with_detectors(
        mut self,
        persona: Arc<dyn PersonaDetector>,
        opportunity: Arc<dyn OpportunityDetector>,
    ) -> Self {
        self.limiter = self.limiter.with_detectors(persona, opportunity);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bandit(&self) -> &ThompsonSamplingEngine {
        &self.bandit
    }

    pub fn selector(&self) -> &AdaptiveContentSelector {
        &self.selector
    }

    pub fn limiter(&self) -> &AdaptiveInterventionRateLimiter {
        &self.limiter
    }

    pub fn select_content_type(
        &self,
        context: &InterventionContext,
        persona: Option<&PersonaDetection>,
        opportunity: Option<&OpportunityAssessment>,
    ) -> ContentSelection {
        self.selector.select_content_type(context, persona, opportunity)
    }

    pub async fn can_show_intervention(
        &self,
        context: &InterventionContext,
        intervention_type: InterventionType,
        session_duration_ms: i64,
    ) -> RateLimitResult {
        self.limiter
            .can_show_intervention(context, intervention_type, session_duration_ms)
            .await
    }

    /// Gate, then select content with the persona and opportunity the gate saw.
    pub async fn decide(
        &self,
        context: &InterventionContext,
        intervention_type: InterventionType,
        session_duration_ms: i64,
    ) -> Decision {
        let rate_limit = self
            .can_show_intervention(context, intervention_type, session_duration_ms)
            .await;
        let content = rate_limit.allowed.then(|| {
            let persona = rate_limit.persona_detection();
            let opportunity = rate_limit.opportunity();
            self.select_content_type(context, Some(&persona), Some(&opportunity))
        });
        Decision { rate_limit, content }
    }

    pub fn record_intervention(&self, intervention_type: InterventionType) {
        self.limiter.record_intervention(intervention_type);
    }

    /// Reward the arm shown for `intervention_id`; a repeat id is a no-op.
    ///
    /// # Errors
    /// Propagates bandit validation errors.
    pub fn record_outcome(
        &self,
        intervention_id: &str,
        input: &RewardInput,
    ) -> Result<Option<RecordedOutcome>> {
        self.selector.record_outcome(intervention_id, input)
    }

    /// Reward an arm directly, for callers that track attribution themselves.
    ///
    /// # Errors
    /// Propagates bandit validation errors.
    pub fn record_arm_outcome(&self, arm: ContentType, input: &RewardInput) -> Result<f64> {
        let reward = calculate_reward(input);
        self.bandit.update_arm(arm, reward)?;
        Ok(reward)
    }

    /// Append an outcome to the history and drop stale analyses.
    ///
    /// # Errors
    /// Returns an error if the store rejects the write.
    pub async fn log_outcome(&self, record: &InterventionOutcomeRecord) -> Result<i64> {
        let id = self.store.append(record).await?;
        self.invalidate_caches();
        Ok(id)
    }

    pub fn get_content_effectiveness(&self) -> Vec<ArmStats> {
        self.selector.get_content_effectiveness()
    }

    pub fn get_frequency_multiplier(&self) -> f64 {
        self.selector.get_frequency_multiplier()
    }

    pub fn get_burden_trend(&self) -> BurdenTrend {
        self.burden.burden_trend()
    }

    pub async fn burden_report(&self, refresh: bool) -> BurdenReport {
        self.burden.assess(refresh).await
    }

    pub async fn timing_recommendation(
        &self,
        target_app: &str,
        hour: u8,
        is_weekend: bool,
        refresh: bool,
    ) -> TimingRecommendation {
        self.timing
            .get_recommendation(target_app, hour, is_weekend, refresh)
            .await
    }

    pub fn timing(&self) -> &ContextualTimingOptimizer {
        &self.timing
    }

    pub fn invalidate_caches(&self) {
        self.burden.invalidate_cache();
        self.timing.invalidate_cache();
    }

    pub fn reset_bandit(&self) {
        self.bandit.reset_all_arms();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserChoice;
    use crate::signals::{InterventionDecision, OpportunityLevel, Persona};
    use std::collections::BTreeMap;

    struct FixedPersona;

    impl PersonaDetector for FixedPersona {
        fn detect_persona(&self, _context: &InterventionContext) -> PersonaDetection {
            PersonaDetection {
                persona: Persona::RegularUser,
                confidence: 1.0,
            }
        }
    }

    /// Reports POOR regardless of its score.
    struct StrictOpportunity;

    impl OpportunityDetector for StrictOpportunity {
        fn detect_opportunity(&self, _context: &InterventionContext) -> OpportunityAssessment {
            OpportunityAssessment {
                score: 60,
                level: OpportunityLevel::Poor,
                decision: InterventionDecision::WaitForBetterOpportunity,
                breakdown: BTreeMap::from([("calendar_busy".to_string(), -40)]),
            }
        }
    }

    #[tokio::test]
    async fn test_decide_then_record_closes_loop() {
        let engine = InterventionEngine::in_memory(Config::default());
        let ctx = InterventionContext {
            last_session_end_time: Some(1),
            ..InterventionContext::new("com.example.feed", 14, 2)
        };

        let decision = engine.decide(&ctx, InterventionType::Reminder, 0).await;
        assert!(decision.rate_limit.allowed);
        let content = decision.content.expect("allowed decision selects content");
        engine.record_intervention(InterventionType::Reminder);

        let recorded = engine
            .record_outcome(&content.intervention_id, &RewardInput::new(UserChoice::GoBack))
            .unwrap()
            .unwrap();
        assert_eq!(recorded.content_type, content.content_type);
        assert_eq!(engine.bandit().total_pulls(), 1);

        let again = engine.decide(&ctx, InterventionType::Reminder, 0).await;
        assert!(!again.rate_limit.allowed);
        assert!(again.content.is_none());
    }

    #[tokio::test]
    async fn test_selection_uses_detector_assessment() {
        let engine = InterventionEngine::in_memory(Config::default())
            .with_detectors(Arc::new(FixedPersona), Arc::new(StrictOpportunity));
        let ctx = InterventionContext {
            last_session_end_time: Some(1),
            ..InterventionContext::new("com.example.feed", 14, 2)
        };

        let decision = engine.decide(&ctx, InterventionType::Reminder, 0).await;
        assert!(decision.rate_limit.allowed);
        assert_eq!(decision.rate_limit.persona, Persona::RegularUser);
        assert_eq!(decision.rate_limit.opportunity_score, 60);
        assert_eq!(decision.rate_limit.opportunity_level, OpportunityLevel::Poor);
        assert_eq!(
            decision.rate_limit.opportunity_breakdown.get("calendar_busy"),
            Some(&-40)
        );

        let content = decision.content.expect("allowed decision selects content");
        assert_eq!(content.excluded, vec![ContentType::EmotionalAppeal]);
        assert_ne!(content.content_type, ContentType::EmotionalAppeal);
    }

    #[tokio::test]
    async fn test_log_outcome_invalidates_burden_cache() {
        let engine = InterventionEngine::in_memory(Config::default());
        assert_eq!(engine.burden_report(false).await.metrics.sample_size, 0);

        let record = InterventionOutcomeRecord::new(
            "s",
            "app",
            ContentType::Quote,
            UserChoice::Dismiss,
            chrono::Utc::now().timestamp_millis() - 1_000,
        );
        engine.log_outcome(&record).await.unwrap();
        assert_eq!(engine.burden_report(false).await.metrics.sample_size, 1);
    }
}
