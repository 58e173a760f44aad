//! Thompson sampling over the closed content-arm set.

use rand::Rng;
use rand_distr::{Beta, Distribution};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::arm::{ArmState, ArmStats};
use crate::error::{Result, ValidationError};
use crate::model::ContentType;
use crate::storage::{BanditConfig, KeyValueStore};

/// Current serialization version of [`BanditSnapshot`].
pub const SNAPSHOT_VERSION: u32 = 1;

/// Persisted posterior for every arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanditSnapshot {
    pub version: u32,
    pub arms: Vec<ArmState>,
}

impl BanditSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Result of [`ThompsonSamplingEngine::select_arm`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmSelection {
    pub arm: ContentType,
    /// Confidence in the chosen arm's posterior, in `[0, 1]`
    pub confidence: f64,
    /// The winning Beta draw; `None` for the fallback
    pub sampled_value: Option<f64>,
    /// Every arm was excluded and [`ContentType::FALLBACK`] was returned
    pub is_fallback: bool,
}

/// Beta-Bernoulli bandit with write-through persistence.
///
/// All mutation goes through [`update_arm`](Self::update_arm) and
/// [`reset_all_arms`](Self::reset_all_arms); both hold the state lock across
/// the persisted write so concurrent updates never lose a pull.
pub struct ThompsonSamplingEngine {
    arms: Mutex<BTreeMap<ContentType, ArmState>>,
    kv: Arc<dyn KeyValueStore>,
    config: BanditConfig,
}

impl ThompsonSamplingEngine {
    /// Engine with default config, loading any persisted posterior.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(kv, BanditConfig::default())
    }

    pub fn with_config(kv: Arc<dyn KeyValueStore>, config: BanditConfig) -> Self {
        let arms = load_arms(kv.as_ref(), &config.state_key);
        Self {
            arms: Mutex::new(arms),
            kv,
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ContentType, ArmState>> {
        self.arms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sample every non-excluded arm and return the highest draw.
    pub fn select_arm(&self, excluded: &HashSet<ContentType>) -> ArmSelection {
        self.select_arm_with_rng(excluded, &mut rand::thread_rng())
    }

    /// [`select_arm`](Self::select_arm) with a caller-supplied RNG.
    pub fn select_arm_with_rng<R: Rng + ?Sized>(
        &self,
        excluded: &HashSet<ContentType>,
        rng: &mut R,
    ) -> ArmSelection {
        let arms = self.lock();

        let mut best: Option<(&ArmState, f64)> = None;
        for state in arms.values().filter(|s| !excluded.contains(&s.arm)) {
            let sample = sample_posterior(state, rng);
            if best.map_or(true, |(_, top)| sample > top) {
                best = Some((state, sample));
            }
        }

        match best {
            Some((state, sample)) => {
                tracing::debug!(arm = %state.arm, sample, "arm selected");
                ArmSelection {
                    arm: state.arm,
                    confidence: state.confidence(),
                    sampled_value: Some(sample),
                    is_fallback: false,
                }
            }
            None => {
                tracing::debug!(excluded = excluded.len(), "all arms excluded; using fallback");
                let confidence = arms
                    .get(&ContentType::FALLBACK)
                    .map(ArmState::confidence)
                    .unwrap_or(0.0);
                ArmSelection {
                    arm: ContentType::FALLBACK,
                    confidence,
                    sampled_value: None,
                    is_fallback: true,
                }
            }
        }
    }

    /// Apply `alpha += reward`, `beta += 1 - reward` and persist.
    ///
    /// # Errors
    /// Returns [`ValidationError::RewardOutOfRange`] unless `0 <= reward <= 1`.
    pub fn update_arm(&self, arm: ContentType, reward: f64) -> Result<ArmState> {
        if !(0.0..=1.0).contains(&reward) {
            return Err(ValidationError::RewardOutOfRange { reward }.into());
        }

        let mut arms = self.lock();
        let state = arms.entry(arm).or_insert_with(|| ArmState::prior(arm));
        state.apply_reward(reward);
        let updated = state.clone();
        self.persist(&arms);

        tracing::debug!(
            arm = %arm,
            reward,
            alpha = updated.alpha,
            beta = updated.beta,
            "arm updated"
        );
        Ok(updated)
    }

    /// [`update_arm`](Self::update_arm) for a raw arm id.
    ///
    /// # Errors
    /// Returns [`ValidationError::UnknownArm`] for ids outside the arm set.
    pub fn update_arm_by_id(&self, arm_id: &str, reward: f64) -> Result<ArmState> {
        let arm = ContentType::parse(arm_id)?;
        self.update_arm(arm, reward)
    }

    pub fn get_arm_stats(&self, arm: ContentType) -> ArmStats {
        self.lock()
            .get(&arm)
            .cloned()
            .unwrap_or_else(|| ArmState::prior(arm))
            .stats()
    }

    /// # Errors
    /// Returns [`ValidationError::UnknownArm`] for ids outside the arm set.
    pub fn get_arm_stats_by_id(&self, arm_id: &str) -> Result<ArmStats> {
        Ok(self.get_arm_stats(ContentType::parse(arm_id)?))
    }

    /// Stats for every arm in canonical order.
    pub fn get_all_arm_stats(&self) -> Vec<ArmStats> {
        let arms = self.lock();
        ContentType::ALL
            .iter()
            .map(|arm| {
                arms.get(arm)
                    .cloned()
                    .unwrap_or_else(|| ArmState::prior(*arm))
                    .stats()
            })
            .collect()
    }

    pub fn total_pulls(&self) -> u64 {
        self.lock().values().map(|s| s.total_pulls).sum()
    }

    /// Enough pulls across all arms for callers to trust the estimates.
    pub fn has_sufficient_data(&self) -> bool {
        self.total_pulls() >= self.config.min_total_pulls
    }

    /// Restore every arm to Beta(1, 1) and persist.
    pub fn reset_all_arms(&self) {
        let mut arms = self.lock();
        *arms = prior_arms();
        self.persist(&arms);
        tracing::info!("bandit reset to prior");
    }

    pub fn snapshot(&self) -> BanditSnapshot {
        snapshot_of(&self.lock())
    }

    /// Write-through; a failed write keeps the in-memory posterior authoritative.
    fn persist(&self, arms: &BTreeMap<ContentType, ArmState>) {
        let result = snapshot_of(arms)
            .to_json()
            .and_then(|json| self.kv.set(&self.config.state_key, &json));
        if let Err(e) = result {
            tracing::warn!(error = %e, key = %self.config.state_key, "failed to persist bandit state");
        }
    }
}

fn sample_posterior<R: Rng + ?Sized>(state: &ArmState, rng: &mut R) -> f64 {
    match Beta::new(state.alpha, state.beta) {
        Ok(dist) => dist.sample(rng),
        Err(_) => state.estimated_success_rate(),
    }
}

fn prior_arms() -> BTreeMap<ContentType, ArmState> {
    ContentType::ALL
        .iter()
        .map(|arm| (*arm, ArmState::prior(*arm)))
        .collect()
}

fn snapshot_of(arms: &BTreeMap<ContentType, ArmState>) -> BanditSnapshot {
    BanditSnapshot {
        version: SNAPSHOT_VERSION,
        arms: arms.values().cloned().collect(),
    }
}

fn load_arms(kv: &dyn KeyValueStore, key: &str) -> BTreeMap<ContentType, ArmState> {
    let mut arms = prior_arms();

    let raw = match kv.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return arms,
        Err(e) => {
            tracing::warn!(error = %e, key, "failed to read bandit state; starting from prior");
            return arms;
        }
    };

    let snapshot = match BanditSnapshot::from_json(&raw) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!(error = %e, key, "corrupt bandit state; starting from prior");
            return arms;
        }
    };

    for state in snapshot.arms {
        if state.is_valid() {
            arms.insert(state.arm, state);
        } else {
            tracing::warn!(arm = %state.arm, "invalid persisted arm; reset to prior");
        }
    }
    arms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKeyValueStore;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn engine() -> (ThompsonSamplingEngine, Arc<MemoryKeyValueStore>) {
        let kv = Arc::new(MemoryKeyValueStore::new());
        (ThompsonSamplingEngine::new(kv.clone()), kv)
    }

    #[test]
    fn test_fresh_engine_is_uninformed() {
        let (engine, _) = engine();
        let selection = engine.select_arm(&HashSet::new());
        assert!(selection.confidence < 0.5);
        assert!(!selection.is_fallback);
        assert!(!engine.has_sufficient_data());
        assert_eq!(engine.get_all_arm_stats().len(), ContentType::ALL.len());
    }

    #[test]
    fn test_update_rejects_out_of_range_reward() {
        let (engine, _) = engine();
        for reward in [-0.01, 1.01, f64::NAN] {
            let err = engine.update_arm(ContentType::Quote, reward).unwrap_err();
            assert!(matches!(
                err,
                crate::error::CoreError::Validation(ValidationError::RewardOutOfRange { .. })
            ));
        }
        assert_eq!(engine.total_pulls(), 0);
    }

    #[test]
    fn test_update_by_unknown_id_fails() {
        let (engine, _) = engine();
        assert!(engine.update_arm_by_id("CAT_VIDEO", 1.0).is_err());
        assert!(engine.update_arm_by_id("QUOTE", 1.0).is_ok());
    }

    #[test]
    fn test_state_survives_reload() {
        let (engine, kv) = engine();
        engine.update_arm(ContentType::UsageStats, 0.7).unwrap();
        engine.update_arm(ContentType::UsageStats, 1.0).unwrap();

        let reloaded = ThompsonSamplingEngine::new(kv);
        let stats = reloaded.get_arm_stats(ContentType::UsageStats);
        assert_eq!(stats.total_pulls, 2);
        assert!((stats.alpha - 2.7).abs() < 1e-12);
        assert!((stats.beta - 1.3).abs() < 1e-12);
    }

    #[test]
    fn test_corrupt_state_falls_back_to_prior() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        kv.set("thompson_sampling.arms", "{not json").unwrap();
        let engine = ThompsonSamplingEngine::new(kv);
        assert_eq!(engine.total_pulls(), 0);
    }

    #[test]
    fn test_inconsistent_pull_count_resets_arm() {
        let (engine, kv) = engine();
        engine.update_arm(ContentType::Quote, 1.0).unwrap();
        engine.update_arm(ContentType::TimeAlternative, 0.0).unwrap();

        let mut snapshot = engine.snapshot();
        for state in &mut snapshot.arms {
            if state.arm == ContentType::Quote {
                state.total_pulls = 40;
            }
        }
        kv.set("thompson_sampling.arms", &snapshot.to_json().unwrap())
            .unwrap();

        let reloaded = ThompsonSamplingEngine::new(kv);
        assert_eq!(
            reloaded.get_arm_stats(ContentType::Quote),
            ArmState::prior(ContentType::Quote).stats()
        );
        assert_eq!(reloaded.get_arm_stats(ContentType::TimeAlternative).total_pulls, 1);
    }

    #[test]
    fn test_all_excluded_returns_fallback() {
        let (engine, _) = engine();
        let excluded: HashSet<ContentType> = ContentType::ALL.into_iter().collect();
        let selection = engine.select_arm(&excluded);
        assert!(selection.is_fallback);
        assert_eq!(selection.arm, ContentType::Reflection);
        assert!(selection.sampled_value.is_none());
    }

    #[test]
    fn test_reset_restores_prior() {
        let (engine, kv) = engine();
        for _ in 0..25 {
            engine.update_arm(ContentType::Quote, 1.0).unwrap();
        }
        assert!(engine.has_sufficient_data());
        engine.reset_all_arms();
        assert_eq!(engine.total_pulls(), 0);
        assert_eq!(ThompsonSamplingEngine::new(kv).total_pulls(), 0);
    }

    #[test]
    fn test_seeded_selection_prefers_winning_arm() {
        let (engine, _) = engine();
        for _ in 0..100 {
            engine.update_arm(ContentType::BreathingExercise, 1.0).unwrap();
        }
        let mut rng = Pcg64::seed_from_u64(7);
        let wins = (0..50)
            .filter(|_| {
                engine.select_arm_with_rng(&HashSet::new(), &mut rng).arm
                    == ContentType::BreathingExercise
            })
            .count();
        assert!(wins > 35);
    }
}
