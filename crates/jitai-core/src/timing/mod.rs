//! Time-of-day effectiveness.
//!
//! - [`hours`]: wraparound-aware hour arithmetic
//! - [`ContextualTimingOptimizer`]: per-hour success analysis with a TTL cache

pub mod hours;
mod optimizer;

pub use optimizer::{
    analyze, bucket_by_hour, ContextualTimingOptimizer, HourStats, TimingConfidence,
    TimingRecommendation,
};
