//! Rate limiting: the fixed cooldown limiter and the adaptive gate around it.

mod adaptive;
mod base;

pub use adaptive::{AdaptiveInterventionRateLimiter, DecisionSource, RateLimitResult};
pub use base::{BaseLimitVerdict, BaseRateLimiter, CooldownRateLimiter};
