//! Per-arm Beta posterior and its derived statistics.

use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta as BetaDist, ContinuousCDF};
use std::f64::consts::E;

use crate::model::ContentType;

/// Beta(1, 1): uniform prior, no history.
pub const PRIOR_ALPHA: f64 = 1.0;
pub const PRIOR_BETA: f64 = 1.0;

/// Two-sided 95% credible interval.
const CI_LOWER_Q: f64 = 0.025;
const CI_UPPER_Q: f64 = 0.975;
const Z_95: f64 = 1.96;

/// Tolerated float drift in `alpha + beta - 2` per recorded pull.
const PULL_DRIFT_PER_PULL: f64 = 1e-6;

/// Posterior for one content arm.
///
/// Invariant: `alpha >= 1`, `beta >= 1`, `alpha + beta - 2 == total_pulls`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmState {
    pub arm: ContentType,
    pub alpha: f64,
    pub beta: f64,
    pub total_pulls: u64,
}

impl ArmState {
    pub fn prior(arm: ContentType) -> Self {
        Self {
            arm,
            alpha: PRIOR_ALPHA,
            beta: PRIOR_BETA,
            total_pulls: 0,
        }
    }

    /// Conjugate update with a fractional reward in `[0, 1]`.
    ///
    /// Range checking is the caller's job; see
    /// [`ThompsonSamplingEngine::update_arm`](super::ThompsonSamplingEngine::update_arm).
    pub(crate) fn apply_reward(&mut self, reward: f64) {
        self.alpha += reward;
        self.beta += 1.0 - reward;
        self.total_pulls += 1;
    }

    /// State loaded from storage is only trusted if the shape invariants hold,
    /// including `alpha + beta - 2 == total_pulls` up to accumulated float drift.
    pub fn is_valid(&self) -> bool {
        if !(self.alpha.is_finite()
            && self.beta.is_finite()
            && self.alpha >= PRIOR_ALPHA
            && self.beta >= PRIOR_BETA)
        {
            return false;
        }
        let pulls = self.total_pulls as f64;
        let drift = (self.alpha + self.beta - PRIOR_ALPHA - PRIOR_BETA - pulls).abs();
        drift <= PULL_DRIFT_PER_PULL * pulls.max(1.0)
    }

    /// Posterior mean `alpha / (alpha + beta)`.
    pub fn estimated_success_rate(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    pub fn variance(&self) -> f64 {
        let sum = self.alpha + self.beta;
        (self.alpha * self.beta) / (sum * sum * (sum + 1.0))
    }

    /// Largest posterior standard deviation possible after `total_pulls`.
    ///
    /// Depends on the pull count only, so it shrinks monotonically as pulls grow.
    pub fn uncertainty(&self) -> f64 {
        0.5 / ((self.total_pulls as f64) + PRIOR_ALPHA + PRIOR_BETA + 1.0).sqrt()
    }

    /// Confidence from sample count and posterior spread; 0.0 with no pulls.
    pub fn confidence(&self) -> f64 {
        if self.total_pulls == 0 {
            return 0.0;
        }

        // Diminishing returns in sample count
        let count_factor = 1.0 - E.powf(-(self.total_pulls as f64) / 10.0);

        let variance_penalty = (self.variance() * 2.0).min(0.5);

        (count_factor - variance_penalty).clamp(0.0, 1.0)
    }

    /// 95% interval from Beta quantiles, widened if needed so it contains the mean.
    pub fn confidence_interval(&self) -> (f64, f64) {
        let mean = self.estimated_success_rate();
        let (lower, upper) = match BetaDist::new(self.alpha, self.beta) {
            Ok(dist) => (dist.inverse_cdf(CI_LOWER_Q), dist.inverse_cdf(CI_UPPER_Q)),
            Err(_) => {
                let half_width = Z_95 * self.variance().sqrt();
                (mean - half_width, mean + half_width)
            }
        };
        let lower = if lower.is_finite() { lower } else { 0.0 };
        let upper = if upper.is_finite() { upper } else { 1.0 };
        (lower.clamp(0.0, 1.0).min(mean), upper.clamp(0.0, 1.0).max(mean))
    }

    pub fn stats(&self) -> ArmStats {
        let (ci_lower, ci_upper) = self.confidence_interval();
        ArmStats {
            arm: self.arm,
            alpha: self.alpha,
            beta: self.beta,
            total_pulls: self.total_pulls,
            estimated_success_rate: self.estimated_success_rate(),
            uncertainty: self.uncertainty(),
            confidence: self.confidence(),
            confidence_interval_lower: ci_lower,
            confidence_interval_upper: ci_upper,
        }
    }
}

/// Read-only view of an arm for analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmStats {
    pub arm: ContentType,
    pub alpha: f64,
    pub beta: f64,
    pub total_pulls: u64,
    pub estimated_success_rate: f64,
    pub uncertainty: f64,
    pub confidence: f64,
    pub confidence_interval_lower: f64,
    pub confidence_interval_upper: f64,
}
