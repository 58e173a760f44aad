//! Intervention burden assessment.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

use super::metrics::{compute_metrics, score_metrics, BurdenFactor, BurdenMetrics};
use super::recovery::{FatigueRecovery, RestRecoveryTracker};
use super::trend::{BurdenTrend, BurdenTrendMonitor};
use crate::cache::TtlCache;
use crate::storage::{read_range_paged, BurdenConfig, OutcomeStore, RecoveryConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BurdenLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl BurdenLevel {
    pub fn from_score(score: i32, config: &BurdenConfig) -> Self {
        if score >= config.critical_score {
            BurdenLevel::Critical
        } else if score >= config.high_score {
            BurdenLevel::High
        } else if score >= config.moderate_score {
            BurdenLevel::Moderate
        } else {
            BurdenLevel::Low
        }
    }

    pub fn cooldown_multiplier(self, config: &BurdenConfig) -> f64 {
        match self {
            BurdenLevel::Low => config.low_multiplier,
            BurdenLevel::Moderate => config.moderate_multiplier,
            BurdenLevel::High => config.high_multiplier,
            BurdenLevel::Critical => config.critical_multiplier,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BurdenLevel::Low => "LOW",
            BurdenLevel::Moderate => "MODERATE",
            BurdenLevel::High => "HIGH",
            BurdenLevel::Critical => "CRITICAL",
        }
    }
}

/// One burden assessment. Cached by the tracker for `cache_ttl_secs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurdenReport {
    pub metrics: BurdenMetrics,
    /// Sum of fired rule weights, before recovery
    pub raw_score: i32,
    pub recovery_credit: i32,
    pub score: i32,
    /// Level of `score`
    pub level: BurdenLevel,
    pub reliable: bool,
    pub factors: Vec<BurdenFactor>,
    /// Recommended scale for the base cooldown
    pub cooldown_multiplier: f64,
}

impl BurdenReport {
    pub fn is_reliable(&self) -> bool {
        self.reliable
    }

    /// Level callers may act on: unreliable assessments read as MODERATE.
    pub fn effective_level(&self) -> BurdenLevel {
        if self.reliable {
            self.level
        } else {
            BurdenLevel::Moderate
        }
    }

    pub fn is_critical(&self) -> bool {
        self.reliable && self.level == BurdenLevel::Critical
    }

    pub fn get_recommended_cooldown_multiplier(&self) -> f64 {
        self.cooldown_multiplier
    }
}

/// Windowed burden scoring with recovery credit and trend tracking.
pub struct InterventionBurdenTracker {
    store: Arc<dyn OutcomeStore>,
    config: BurdenConfig,
    recovery: Option<Arc<dyn FatigueRecovery>>,
    trend: Mutex<BurdenTrendMonitor>,
    cache: TtlCache<(), BurdenReport>,
}

impl InterventionBurdenTracker {
    pub fn new(store: Arc<dyn OutcomeStore>) -> Self {
        Self::with_config(store, BurdenConfig::default())
    }

    /// Tracker with the default rest-based recovery.
    pub fn with_config(store: Arc<dyn OutcomeStore>, config: BurdenConfig) -> Self {
        let recovery: Arc<dyn FatigueRecovery> =
            Arc::new(RestRecoveryTracker::new(RecoveryConfig::default()));
        Self::with_recovery(store, config, Some(recovery))
    }

    pub fn with_recovery(
        store: Arc<dyn OutcomeStore>,
        config: BurdenConfig,
        recovery: Option<Arc<dyn FatigueRecovery>>,
    ) -> Self {
        let cache = TtlCache::with_ttl_secs(config.cache_ttl_secs);
        Self {
            store,
            config,
            recovery,
            trend: Mutex::new(BurdenTrendMonitor::default()),
            cache,
        }
    }

    pub fn config(&self) -> &BurdenConfig {
        &self.config
    }

    pub async fn assess(&self, refresh: bool) -> BurdenReport {
        self.assess_at(Utc::now(), refresh).await
    }

    /// Assessment as of `now`. `refresh` recomputes and replaces the cached report.
    pub async fn assess_at(&self, now: DateTime<Utc>, refresh: bool) -> BurdenReport {
        if !refresh {
            if let Some(cached) = self.cache.get(&(), now) {
                tracing::debug!(score = cached.score, "burden cache hit");
                return cached;
            }
        }

        let end_ms = now.timestamp_millis();
        let start_ms = (now - Duration::days(self.config.window_days)).timestamp_millis();
        let records =
            match read_range_paged(self.store.as_ref(), start_ms, end_ms, self.config.page_size).await {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(error = %e, "burden history read failed; assuming no data");
                    return self.build_report(BurdenMetrics::empty(now), now);
                }
            };

        let report = self.build_report(compute_metrics(&records, now, &self.config), now);
        self.trend
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(end_ms, report.score);
        self.cache.insert((), report.clone(), now);

        tracing::debug!(
            score = report.score,
            raw_score = report.raw_score,
            level = report.level.as_str(),
            reliable = report.reliable,
            samples = report.metrics.sample_size,
            "burden assessed"
        );
        report
    }

    pub async fn get_burden_metrics(&self, refresh: bool) -> BurdenMetrics {
        self.assess(refresh).await.metrics
    }

    /// Score, level and multiplier for already-computed metrics.
    pub fn build_report(&self, metrics: BurdenMetrics, now: DateTime<Utc>) -> BurdenReport {
        let (raw_score, factors) = score_metrics(&metrics, &self.config.rules);
        let recovery_credit = self
            .recovery
            .as_ref()
            .map(|r| r.recovery_credit(&metrics, raw_score, now).clamp(0, raw_score.max(0)))
            .unwrap_or(0);
        let score = (raw_score - recovery_credit).max(0);
        let level = BurdenLevel::from_score(score, &self.config);
        let reliable = metrics.sample_size >= self.config.min_reliable_samples;
        let cooldown_multiplier = if reliable {
            level.cooldown_multiplier(&self.config)
        } else {
            1.0
        };

        BurdenReport {
            metrics,
            raw_score,
            recovery_credit,
            score,
            level,
            reliable,
            factors,
            cooldown_multiplier,
        }
    }

    pub fn burden_trend(&self) -> BurdenTrend {
        self.trend
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .trend()
    }

    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }
}
