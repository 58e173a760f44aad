//! # jitai Core Library
//!
//! Decision core for just-in-time adaptive interventions: whether, when and
//! with what content to interrupt a user inside a monitored app.
//!
//! ## Architecture
//!
//! - **Reward**: pure mapping from the user's response to a reward in `[0, 1]`
//! - **Bandit**: Beta-Bernoulli Thompson sampling over eight content arms,
//!   persisted through a key-value store after every update
//! - **Timing**: hour-of-day success analysis with wraparound-aware delays
//! - **Burden**: windowed fatigue scoring with recovery credit and trend
//! - **Selector / Limiter**: exclusion rules around the bandit, and the gate
//!   that fuses burden, timing, opportunity and cooldown into one verdict
//! - **Storage**: SQLite outcome history and TOML configuration
//!
//! ## Key Components
//!
//! - [`InterventionEngine`]: every component wired from a [`Config`]
//! - [`ThompsonSamplingEngine`]: arm selection and reward updates
//! - [`InterventionBurdenTracker`]: burden level and cooldown multiplier
//! - [`ContextualTimingOptimizer`]: per-hour timing recommendations
//! - [`AdaptiveInterventionRateLimiter`]: the top-level gate

pub mod bandit;
pub mod burden;
pub mod cache;
pub mod engine;
pub mod error;
pub mod limiter;
pub mod model;
pub mod reward;
pub mod selector;
pub mod signals;
pub mod storage;
pub mod timing;

pub use bandit::{ArmSelection, ArmState, ArmStats, BanditSnapshot, ThompsonSamplingEngine};
pub use burden::{
    BurdenLevel, BurdenMetrics, BurdenReport, BurdenTrend, BurdenTrendMonitor, FatigueRecovery,
    InterventionBurdenTracker, RestRecoveryTracker, Trend, TrendDirection,
};
pub use engine::{Decision, InterventionEngine};
pub use error::{ConfigError, CoreError, DatabaseError, Result, ValidationError};
pub use limiter::{
    AdaptiveInterventionRateLimiter, BaseLimitVerdict, BaseRateLimiter, CooldownRateLimiter,
    DecisionSource, RateLimitResult,
};
pub use model::{
    ContentType, FrictionLevel, InterventionContext, InterventionOutcomeRecord, InterventionType,
    UserChoice, UserFeedback,
};
pub use reward::RewardInput;
pub use selector::{AdaptiveContentSelector, ContentSelection, RecordedOutcome};
pub use signals::{
    HeuristicOpportunityDetector, HeuristicPersonaDetector, InterventionDecision,
    OpportunityAssessment, OpportunityDetector, OpportunityLevel, Persona, PersonaDetection,
    PersonaDetector,
};
pub use storage::{Config, Database, KeyValueStore, MemoryKeyValueStore, MemoryOutcomeStore, OutcomeStore};
pub use timing::{ContextualTimingOptimizer, TimingConfidence, TimingRecommendation};
