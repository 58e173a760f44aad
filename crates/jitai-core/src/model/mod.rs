//! Domain types shared by every component of the decision core.
//!
//! - [`ContentType`]: the closed set of bandit arms
//! - [`InterventionOutcomeRecord`]: one persisted row per shown intervention
//! - [`InterventionContext`]: the per-call snapshot supplied by the caller

mod content;
mod context;
mod outcome;

pub use content::{ContentType, InterventionType};
pub use context::{FrictionLevel, InterventionContext};
pub use outcome::{InterventionOutcomeRecord, UserChoice, UserFeedback};
