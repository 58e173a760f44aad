//! Fixed-cooldown limiter: elapsed time since the last intervention of a type.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::model::{InterventionContext, InterventionType};
use crate::storage::{CooldownConfig, KeyValueStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseLimitVerdict {
    pub allowed: bool,
    pub reason: String,
    pub cooldown_remaining_ms: i64,
    /// Effective cooldown after the multiplier
    pub cooldown_ms: i64,
}

/// The base limiter consulted last by the adaptive gate.
pub trait BaseRateLimiter: Send + Sync {
    /// `multiplier` scales the base cooldown for this check only.
    fn can_show_intervention(
        &self,
        intervention_type: InterventionType,
        context: &InterventionContext,
        multiplier: f64,
        now: DateTime<Utc>,
    ) -> BaseLimitVerdict;

    /// Restart the cooldown clock for `intervention_type`.
    fn record_intervention(&self, intervention_type: InterventionType, now: DateTime<Utc>);
}

/// Per-type last-shown clocks, optionally persisted.
pub struct CooldownRateLimiter {
    config: CooldownConfig,
    last_shown: Mutex<HashMap<InterventionType, DateTime<Utc>>>,
    kv: Option<Arc<dyn KeyValueStore>>,
}

impl CooldownRateLimiter {
    /// In-memory clocks only.
    pub fn new(config: CooldownConfig) -> Self {
        Self {
            config,
            last_shown: Mutex::new(HashMap::new()),
            kv: None,
        }
    }

    /// Clocks loaded from and written back to `kv` when `config.persist` is set.
    pub fn with_store(config: CooldownConfig, kv: Arc<dyn KeyValueStore>) -> Self {
        if !config.persist {
            return Self::new(config);
        }
        let last_shown = load_clocks(kv.as_ref(), &config.state_key);
        Self {
            config,
            last_shown: Mutex::new(last_shown),
            kv: Some(kv),
        }
    }

    fn clocks(&self) -> MutexGuard<'_, HashMap<InterventionType, DateTime<Utc>>> {
        self.last_shown.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn last_shown(&self, intervention_type: InterventionType) -> Option<DateTime<Utc>> {
        self.clocks().get(&intervention_type).copied()
    }

    fn persist(&self, clocks: &HashMap<InterventionType, DateTime<Utc>>) {
        let Some(kv) = &self.kv else {
            return;
        };
        let encoded: BTreeMap<&str, i64> = clocks
            .iter()
            .map(|(t, at)| (t.as_str(), at.timestamp_millis()))
            .collect();
        let result = serde_json::to_string(&encoded)
            .map_err(crate::error::CoreError::from)
            .and_then(|json| kv.set(&self.config.state_key, &json));
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to persist cooldown clocks");
        }
    }
}

fn effective_multiplier(multiplier: f64) -> f64 {
    if multiplier.is_finite() && multiplier > 0.0 {
        multiplier
    } else {
        1.0
    }
}

fn load_clocks(kv: &dyn KeyValueStore, key: &str) -> HashMap<InterventionType, DateTime<Utc>> {
    let raw = match kv.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return HashMap::new(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read cooldown clocks");
            return HashMap::new();
        }
    };
    let decoded: BTreeMap<String, i64> = match serde_json::from_str(&raw) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!(error = %e, "corrupt cooldown clocks ignored");
            return HashMap::new();
        }
    };
    decoded
        .into_iter()
        .filter_map(|(t, ms)| {
            let t = InterventionType::parse(&t).ok()?;
            let at = Utc.timestamp_millis_opt(ms).single()?;
            Some((t, at))
        })
        .collect()
}

impl BaseRateLimiter for CooldownRateLimiter {
    fn can_show_intervention(
        &self,
        intervention_type: InterventionType,
        _context: &InterventionContext,
        multiplier: f64,
        now: DateTime<Utc>,
    ) -> BaseLimitVerdict {
        let base_ms = self.config.base_cooldown_ms(intervention_type);
        let cooldown_ms = (base_ms as f64 * effective_multiplier(multiplier)).round() as i64;

        let Some(last) = self.last_shown(intervention_type) else {
            return BaseLimitVerdict {
                allowed: true,
                reason: format!("No previous {intervention_type} intervention"),
                cooldown_remaining_ms: 0,
                cooldown_ms,
            };
        };

        let elapsed_ms = (now - last).num_milliseconds().max(0);
        if elapsed_ms >= cooldown_ms {
            BaseLimitVerdict {
                allowed: true,
                reason: format!("{intervention_type} cooldown elapsed"),
                cooldown_remaining_ms: 0,
                cooldown_ms,
            }
        } else {
            let remaining = cooldown_ms - elapsed_ms;
            BaseLimitVerdict {
                allowed: false,
                reason: format!(
                    "{intervention_type} cooldown active: {}s remaining of {}s",
                    (remaining + 999) / 1000,
                    cooldown_ms / 1000
                ),
                cooldown_remaining_ms: remaining,
                cooldown_ms,
            }
        }
    }

    fn record_intervention(&self, intervention_type: InterventionType, now: DateTime<Utc>) {
        let mut clocks = self.clocks();
        clocks.insert(intervention_type, now);
        self.persist(&clocks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKeyValueStore;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_first_intervention_allowed() {
        let limiter = CooldownRateLimiter::new(CooldownConfig::default());
        let ctx = InterventionContext::default();
        assert!(limiter
            .can_show_intervention(InterventionType::Reminder, &ctx, 1.0, now())
            .allowed);
    }

    #[test]
    fn test_cooldown_blocks_then_expires() {
        let limiter = CooldownRateLimiter::new(CooldownConfig::default());
        let ctx = InterventionContext::default();
        limiter.record_intervention(InterventionType::Reminder, now());

        let blocked = limiter.can_show_intervention(
            InterventionType::Reminder,
            &ctx,
            1.0,
            now() + Duration::seconds(100),
        );
        assert!(!blocked.allowed);
        assert_eq!(blocked.cooldown_remaining_ms, 500_000);

        let other_type =
            limiter.can_show_intervention(InterventionType::Timer, &ctx, 1.0, now() + Duration::seconds(100));
        assert!(other_type.allowed);

        let later = limiter.can_show_intervention(
            InterventionType::Reminder,
            &ctx,
            1.0,
            now() + Duration::seconds(600),
        );
        assert!(later.allowed);
    }

    #[test]
    fn test_multiplier_scales_cooldown() {
        let limiter = CooldownRateLimiter::new(CooldownConfig::default());
        let ctx = InterventionContext::default();
        limiter.record_intervention(InterventionType::Timer, now());
        let at = now() + Duration::seconds(400);
        assert!(limiter.can_show_intervention(InterventionType::Timer, &ctx, 1.0, at).allowed);
        let doubled = limiter.can_show_intervention(InterventionType::Timer, &ctx, 2.0, at);
        assert!(!doubled.allowed);
        assert_eq!(doubled.cooldown_ms, 600_000);
        assert_eq!(
            limiter.can_show_intervention(InterventionType::Timer, &ctx, f64::NAN, at).cooldown_ms,
            300_000
        );
    }

    #[test]
    fn test_clocks_persist_through_store() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let limiter = CooldownRateLimiter::with_store(CooldownConfig::default(), kv.clone());
        limiter.record_intervention(InterventionType::Reminder, now());

        let reloaded = CooldownRateLimiter::with_store(CooldownConfig::default(), kv);
        assert_eq!(reloaded.last_shown(InterventionType::Reminder), Some(now()));
        assert!(reloaded.last_shown(InterventionType::Timer).is_none());
    }
}
