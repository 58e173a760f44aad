//! Context-aware content selection on top of the bandit.
//!
//! Situational rules build an exclusion set (union of every rule that applies)
//! before the bandit samples. The selector remembers which arm was shown for
//! each intervention id so the delayed outcome rewards the right arm exactly once.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::bandit::{ArmSelection, ArmStats, ThompsonSamplingEngine};
use crate::error::Result;
use crate::model::{ContentType, InterventionContext};
use crate::reward::{calculate_reward, RewardInput};
use crate::signals::{OpportunityAssessment, OpportunityLevel, Persona, PersonaDetection};
use crate::storage::SelectorConfig;

/// Arm chosen for one intervention, with the id used to report its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSelection {
    pub intervention_id: String,
    pub content_type: ContentType,
    pub selection: ArmSelection,
    pub excluded: Vec<ContentType>,
}

/// Reward applied by [`AdaptiveContentSelector::record_outcome`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedOutcome {
    pub intervention_id: String,
    pub content_type: ContentType,
    pub reward: f64,
}

/// Arms excluded for this context, persona and opportunity.
pub fn excluded_arms(
    context: &InterventionContext,
    persona: Option<&PersonaDetection>,
    opportunity: Option<&OpportunityAssessment>,
) -> HashSet<ContentType> {
    let mut excluded = HashSet::new();

    if context.is_late_night() {
        excluded.extend([ContentType::BreathingExercise, ContentType::Gamification]);
    }
    if context.is_early_morning() {
        excluded.extend([ContentType::UsageStats, ContentType::EmotionalAppeal]);
    }

    match persona.map(|p| p.persona) {
        Some(Persona::ProblematicPattern) => {
            excluded.extend([ContentType::Quote, ContentType::Gamification]);
        }
        Some(Persona::CasualUser) => {
            excluded.insert(ContentType::EmotionalAppeal);
        }
        Some(Persona::NewUser) => {
            excluded.extend([ContentType::EmotionalAppeal, ContentType::UsageStats]);
        }
        Some(Persona::RegularUser) | None => {}
    }

    if context.is_first_session() {
        excluded.insert(ContentType::UsageStats);
    }
    if context.quick_reopen_attempt {
        excluded.extend([ContentType::Quote, ContentType::Gamification]);
    }
    if opportunity.is_some_and(|o| o.level == OpportunityLevel::Poor) {
        excluded.insert(ContentType::EmotionalAppeal);
    }

    excluded
}

#[derive(Debug, Clone, Copy)]
struct PendingSelection {
    arm: ContentType,
    selected_at: DateTime<Utc>,
}

type PendingMap = HashMap<String, PendingSelection>;

pub struct AdaptiveContentSelector {
    engine: Arc<ThompsonSamplingEngine>,
    config: SelectorConfig,
    pending: Mutex<PendingMap>,
}

impl AdaptiveContentSelector {
    pub fn new(engine: Arc<ThompsonSamplingEngine>) -> Self {
        Self::with_config(engine, SelectorConfig::default())
    }

    pub fn with_config(engine: Arc<ThompsonSamplingEngine>, config: SelectorConfig) -> Self {
        Self {
            engine,
            config,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &Arc<ThompsonSamplingEngine> {
        &self.engine
    }

    fn pending(&self) -> MutexGuard<'_, PendingMap> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop expired ids, then evict the oldest until one more fits.
    fn make_room(&self, pending: &mut PendingMap, now: DateTime<Utc>) {
        let ttl = Duration::milliseconds((self.config.pending_ttl_hours * 3_600_000.0) as i64);
        let before = pending.len();
        pending.retain(|_, p| now - p.selected_at < ttl);

        while !pending.is_empty() && pending.len() >= self.config.max_pending {
            let oldest = pending
                .iter()
                .min_by_key(|(_, p)| p.selected_at)
                .map(|(id, _)| id.clone());
            let Some(id) = oldest else { break };
            pending.remove(&id);
        }

        let dropped = before - pending.len();
        if dropped > 0 {
            tracing::debug!(dropped, "forgot unreported interventions");
        }
    }

    /// Pick an arm and register a fresh intervention id for it.
    pub fn select_content_type(
        &self,
        context: &InterventionContext,
        persona: Option<&PersonaDetection>,
        opportunity: Option<&OpportunityAssessment>,
    ) -> ContentSelection {
        self.select_content_type_at(context, persona, opportunity, Utc::now())
    }

    /// [`select_content_type`](Self::select_content_type) with an explicit clock.
    ///
    /// Ids older than `pending_ttl_hours` are forgotten, and at most
    /// `max_pending` ids are kept, oldest evicted first.
    pub fn select_content_type_at(
        &self,
        context: &InterventionContext,
        persona: Option<&PersonaDetection>,
        opportunity: Option<&OpportunityAssessment>,
        now: DateTime<Utc>,
    ) -> ContentSelection {
        let excluded = excluded_arms(context, persona, opportunity);
        let selection = self.engine.select_arm(&excluded);
        let intervention_id = uuid::Uuid::new_v4().to_string();

        {
            let mut pending = self.pending();
            self.make_room(&mut pending, now);
            pending.insert(
                intervention_id.clone(),
                PendingSelection {
                    arm: selection.arm,
                    selected_at: now,
                },
            );
        }

        let mut excluded: Vec<ContentType> = excluded.into_iter().collect();
        excluded.sort();
        tracing::debug!(
            intervention_id = %intervention_id,
            arm = %selection.arm,
            excluded = excluded.len(),
            fallback = selection.is_fallback,
            "content selected"
        );

        ContentSelection {
            intervention_id,
            content_type: selection.arm,
            selection,
            excluded,
        }
    }

    /// Arm shown for an intervention that has not reported yet.
    pub fn pending_arm(&self, intervention_id: &str) -> Option<ContentType> {
        self.pending().get(intervention_id).map(|p| p.arm)
    }

    /// Interventions still waiting for an outcome.
    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    /// Reward the arm shown for `intervention_id` and forget the id.
    ///
    /// Returns `Ok(None)` for an unknown or already-recorded id.
    ///
    /// # Errors
    /// Propagates a bandit validation error.
    pub fn record_outcome(
        &self,
        intervention_id: &str,
        input: &RewardInput,
    ) -> Result<Option<RecordedOutcome>> {
        let Some(PendingSelection {
            arm: content_type, ..
        }) = self.pending().remove(intervention_id)
        else {
            tracing::debug!(intervention_id, "outcome for unknown intervention ignored");
            return Ok(None);
        };

        let reward = calculate_reward(input);
        self.engine.update_arm(content_type, reward)?;
        Ok(Some(RecordedOutcome {
            intervention_id: intervention_id.to_string(),
            content_type,
            reward,
        }))
    }

    /// Cooldown multiplier from pull-weighted effectiveness across all arms.
    pub fn get_frequency_multiplier(&self) -> f64 {
        if !self.engine.has_sufficient_data() {
            return 1.0;
        }

        let stats = self.engine.get_all_arm_stats();
        let pulls: u64 = stats.iter().map(|s| s.total_pulls).sum();
        if pulls == 0 {
            return 1.0;
        }
        let weighted = stats
            .iter()
            .map(|s| s.estimated_success_rate * s.total_pulls as f64)
            .sum::<f64>()
            / pulls as f64;

        let c = &self.config;
        if weighted >= c.high_effectiveness {
            c.high_effectiveness_multiplier
        } else if weighted >= c.good_effectiveness {
            c.good_effectiveness_multiplier
        } else if weighted <= c.very_low_effectiveness {
            c.very_low_effectiveness_multiplier
        } else if weighted <= c.low_effectiveness {
            c.low_effectiveness_multiplier
        } else {
            1.0
        }
    }

    /// Every arm's stats, best estimate first.
    pub fn get_content_effectiveness(&self) -> Vec<ArmStats> {
        let mut stats = self.engine.get_all_arm_stats();
        stats.sort_by(|a, b| {
            b.estimated_success_rate
                .partial_cmp(&a.estimated_success_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        stats
    }
}
