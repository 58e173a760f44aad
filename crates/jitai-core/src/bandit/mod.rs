//! Beta-Bernoulli Thompson sampling over content arms.
//!
//! - [`ArmState`]: `(alpha, beta, total_pulls)` per arm, prior Beta(1, 1)
//! - [`ThompsonSamplingEngine`]: selection with exclusions, reward updates,
//!   persistence through a [`KeyValueStore`](crate::storage::KeyValueStore)

mod arm;
mod engine;

pub use arm::{ArmState, ArmStats, PRIOR_ALPHA, PRIOR_BETA};
pub use engine::{ArmSelection, BanditSnapshot, ThompsonSamplingEngine, SNAPSHOT_VERSION};
