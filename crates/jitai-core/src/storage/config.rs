//! TOML-based engine configuration.
//!
//! Stores tuning parameters for:
//! - The Thompson sampling bandit
//! - Burden scoring rules, level thresholds and cooldown multipliers
//! - Timing optimizer reliability policy and cache TTL
//! - Base cooldowns per intervention type
//! - Fatigue recovery credit
//!
//! Configuration is stored at `~/.config/jitai/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::{ConfigError, Result};
use crate::model::InterventionType;

/// Bandit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanditConfig {
    /// Total pulls across all arms before the engine's estimates are trusted
    #[serde(default = "default_min_total_pulls")]
    pub min_total_pulls: u64,
    /// Key used for the serialized arm posteriors
    #[serde(default = "default_bandit_state_key")]
    pub state_key: String,
}

/// Additive burden rule set. Each rule adds its weight when its threshold is crossed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BurdenRuleConfig {
    pub dismiss_rate_threshold: f64,
    pub dismiss_rate_weight: i32,
    pub timeout_rate_threshold: f64,
    pub timeout_rate_weight: i32,
    pub snooze_frequency_threshold: u32,
    pub snooze_frequency_weight: i32,
    pub declining_engagement_weight: i32,
    pub interventions_24h_threshold: u32,
    pub interventions_24h_weight: i32,
    pub effectiveness_threshold: f64,
    pub effectiveness_weight: i32,
    pub declining_effectiveness_weight: i32,
    pub helpfulness_threshold: f64,
    pub helpfulness_min_feedback: u32,
    pub helpfulness_weight: i32,
    pub avg_spacing_minutes_threshold: f64,
    pub avg_spacing_weight: i32,
    pub min_spacing_minutes_threshold: f64,
    pub min_spacing_weight: i32,
}

/// Burden tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BurdenConfig {
    /// Read window in days
    pub window_days: i64,
    /// Minimum sample size before the burden level may be acted on
    pub min_reliable_samples: usize,
    pub cache_ttl_secs: i64,
    pub page_size: usize,
    /// Records at the tail of the window used for `recent_go_back_rate`
    pub recent_sample_size: usize,
    /// Minimum records before a half-over-half trend is computed
    pub min_trend_samples: usize,
    /// Rate difference between window halves that counts as a trend
    pub trend_delta: f64,
    /// Score at or above which the level is MODERATE
    pub moderate_score: i32,
    pub high_score: i32,
    pub critical_score: i32,
    pub low_multiplier: f64,
    pub moderate_multiplier: f64,
    pub high_multiplier: f64,
    pub critical_multiplier: f64,
    pub rules: BurdenRuleConfig,
}

/// Timing optimizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub window_days: i64,
    /// Below this many records overall confidence is LOW
    pub min_total_samples: usize,
    /// Below this many records an hour is unreliable
    pub min_hour_samples: usize,
    pub high_confidence_total_samples: usize,
    pub high_confidence_hour_samples: usize,
    /// Success-rate gap from the overall rate that marks a bad (or better) hour
    pub bad_hour_margin: f64,
    pub max_alternatives: usize,
    pub cache_ttl_secs: i64,
    pub page_size: usize,
}

/// Base cooldowns per intervention type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    pub reminder_secs: i64,
    pub timer_secs: i64,
    /// Persist last-shown clocks through the key-value store
    pub persist: bool,
    pub state_key: String,
}

/// Fatigue recovery credit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub enabled: bool,
    /// Rest required before any credit is awarded
    pub min_rest_hours: f64,
    pub hours_per_credit: f64,
    pub max_credit: i32,
}

/// Content-driven cooldown multiplier bands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub high_effectiveness: f64,
    pub high_effectiveness_multiplier: f64,
    pub good_effectiveness: f64,
    pub good_effectiveness_multiplier: f64,
    pub low_effectiveness: f64,
    pub low_effectiveness_multiplier: f64,
    pub very_low_effectiveness: f64,
    pub very_low_effectiveness_multiplier: f64,
    /// Unreported interventions older than this are forgotten
    pub pending_ttl_hours: f64,
    pub max_pending: usize,
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/jitai/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bandit: BanditConfig,
    #[serde(default)]
    pub burden: BurdenConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub cooldown: CooldownConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub selector: SelectorConfig,
}

fn default_min_total_pulls() -> u64 {
    20
}
fn default_bandit_state_key() -> String {
    "thompson_sampling.arms".into()
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            min_total_pulls: default_min_total_pulls(),
            state_key: default_bandit_state_key(),
        }
    }
}

impl Default for BurdenRuleConfig {
    fn default() -> Self {
        Self {
            dismiss_rate_threshold: 0.40,
            dismiss_rate_weight: 3,
            timeout_rate_threshold: 0.30,
            timeout_rate_weight: 3,
            snooze_frequency_threshold: 5,
            snooze_frequency_weight: 2,
            declining_engagement_weight: 4,
            interventions_24h_threshold: 15,
            interventions_24h_weight: 2,
            effectiveness_threshold: 0.35,
            effectiveness_weight: 3,
            declining_effectiveness_weight: 4,
            helpfulness_threshold: 0.30,
            helpfulness_min_feedback: 5,
            helpfulness_weight: 5,
            avg_spacing_minutes_threshold: 10.0,
            avg_spacing_weight: 2,
            min_spacing_minutes_threshold: 3.0,
            min_spacing_weight: 3,
        }
    }
}

impl Default for BurdenConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            min_reliable_samples: 10,
            cache_ttl_secs: 300,
            page_size: 500,
            recent_sample_size: 10,
            min_trend_samples: 6,
            trend_delta: 0.10,
            moderate_score: 4,
            high_score: 8,
            critical_score: 12,
            low_multiplier: 1.0,
            moderate_multiplier: 1.25,
            high_multiplier: 1.5,
            critical_multiplier: 2.0,
            rules: BurdenRuleConfig::default(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            min_total_samples: 20,
            min_hour_samples: 5,
            high_confidence_total_samples: 50,
            high_confidence_hour_samples: 10,
            bad_hour_margin: 0.15,
            max_alternatives: 3,
            cache_ttl_secs: 600,
            page_size: 500,
        }
    }
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            reminder_secs: 600,
            timer_secs: 300,
            persist: true,
            state_key: "rate_limiter.last_shown".into(),
        }
    }
}

impl CooldownConfig {
    /// Base cooldown for a type, before any multiplier.
    pub fn base_cooldown_ms(&self, intervention_type: InterventionType) -> i64 {
        let secs = match intervention_type {
            InterventionType::Reminder => self.reminder_secs,
            InterventionType::Timer => self.timer_secs,
        };
        secs.max(0) * 1000
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_rest_hours: 1.0,
            hours_per_credit: 2.0,
            max_credit: 6,
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            high_effectiveness: 0.60,
            high_effectiveness_multiplier: 0.8,
            good_effectiveness: 0.45,
            good_effectiveness_multiplier: 0.9,
            low_effectiveness: 0.25,
            low_effectiveness_multiplier: 1.25,
            very_low_effectiveness: 0.15,
            very_low_effectiveness_multiplier: 1.5,
            pending_ttl_hours: 24.0,
            max_pending: 1000,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(n) => {
                        if n.is_f64() {
                            let parsed = value.parse::<f64>().map_err(|e| invalid(e.to_string()))?;
                            serde_json::Number::from_f64(parsed)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else if let Ok(i) = value.parse::<i64>() {
                            serde_json::Value::Number(i.into())
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as integer")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default config path inside the data directory.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default path or create it with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults if the file is absent.
    ///
    /// # Errors
    /// Returns an error if the file cannot be parsed or the default cannot be written.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to the default path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.burden.min_reliable_samples, 10);
        assert_eq!(parsed.timing.min_hour_samples, 5);
        assert_eq!(parsed.bandit.state_key, "thompson_sampling.arms");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let parsed: Config = toml::from_str("[burden]\ncritical_score = 20\n").unwrap();
        assert_eq!(parsed.burden.critical_score, 20);
        assert_eq!(parsed.burden.high_score, 8);
        assert_eq!(parsed.burden.rules.helpfulness_weight, 5);
        assert_eq!(parsed.timing.cache_ttl_secs, 600);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("burden.window_days").as_deref(), Some("7"));
        assert_eq!(cfg.get("recovery.enabled").as_deref(), Some("true"));
        assert_eq!(
            cfg.get("cooldown.state_key").as_deref(),
            Some("rate_limiter.last_shown")
        );
        assert!(cfg.get("burden.missing_key").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("burden.rules.dismiss_rate_threshold", "0.5").unwrap();
        cfg.set("timing.max_alternatives", "5").unwrap();
        cfg.set("recovery.enabled", "false").unwrap();
        assert_eq!(cfg.burden.rules.dismiss_rate_threshold, 0.5);
        assert_eq!(cfg.timing.max_alternatives, 5);
        assert!(!cfg.recovery.enabled);
    }

    #[test]
    fn set_rejects_unknown_keys_and_bad_values() {
        let mut cfg = Config::default();
        assert!(cfg.set("timing.nope", "1").is_err());
        assert!(cfg.set("", "1").is_err());
        assert!(cfg.set("timing.max_alternatives", "three").is_err());
    }

    #[test]
    fn load_from_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.cooldown.reminder_secs, 600);

        let mut changed = cfg.clone();
        changed.cooldown.reminder_secs = 42;
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().cooldown.reminder_secs, 42);
    }

    #[test]
    fn base_cooldown_per_type() {
        let cfg = CooldownConfig::default();
        assert_eq!(cfg.base_cooldown_ms(InterventionType::Reminder), 600_000);
        assert_eq!(cfg.base_cooldown_ms(InterventionType::Timer), 300_000);
    }
}
