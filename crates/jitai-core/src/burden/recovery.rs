//! Fatigue recovery credit.
//!
//! Time away from interventions earns credit that is subtracted from the raw
//! burden score. Credit is never larger than the score it offsets.

use chrono::{DateTime, Utc};

use super::metrics::BurdenMetrics;
use crate::storage::RecoveryConfig;

/// Awards recovery credit against an elevated burden score.
pub trait FatigueRecovery: Send + Sync {
    /// Points to subtract from `raw_score`, in `0..=raw_score`.
    fn recovery_credit(&self, metrics: &BurdenMetrics, raw_score: i32, now: DateTime<Utc>) -> i32;
}

/// Credit of one point per `hours_per_credit` hours since the last intervention.
#[derive(Debug, Clone, Default)]
pub struct RestRecoveryTracker {
    config: RecoveryConfig,
}

impl RestRecoveryTracker {
    pub fn new(config: RecoveryConfig) -> Self {
        Self { config }
    }

    /// Hours since the newest record, if any.
    pub fn hours_rested(metrics: &BurdenMetrics, now: DateTime<Utc>) -> Option<f64> {
        let last = metrics.last_intervention_at?;
        let elapsed_ms = (now.timestamp_millis() - last).max(0);
        Some(elapsed_ms as f64 / 3_600_000.0)
    }
}

impl FatigueRecovery for RestRecoveryTracker {
    fn recovery_credit(&self, metrics: &BurdenMetrics, raw_score: i32, now: DateTime<Utc>) -> i32 {
        if !self.config.enabled || raw_score <= 0 || self.config.hours_per_credit <= 0.0 {
            return 0;
        }
        let Some(rested) = Self::hours_rested(metrics, now) else {
            return 0;
        };
        if rested < self.config.min_rest_hours {
            return 0;
        }
        let earned = (rested / self.config.hours_per_credit).floor() as i32;
        earned.clamp(0, self.config.max_credit.max(0)).min(raw_score)
    }
}
