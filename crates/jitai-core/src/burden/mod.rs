//! Intervention burden: how much recent interventions are wearing the user down.
//!
//! - [`compute_metrics`] / [`score_metrics`]: window aggregation and the additive rule set
//! - [`InterventionBurdenTracker`]: cached assessments with recovery and trend
//! - [`FatigueRecovery`]: credit that offsets an elevated score after rest
//! - [`BurdenTrendMonitor`]: score deltas across assessments

mod metrics;
mod recovery;
mod tracker;
mod trend;

pub use metrics::{compute_metrics, score_metrics, BurdenFactor, BurdenMetrics, Trend};
pub use recovery::{FatigueRecovery, RestRecoveryTracker};
pub use tracker::{BurdenLevel, BurdenReport, InterventionBurdenTracker};
pub use trend::{BurdenTrend, BurdenTrendMonitor, TrendDirection};
