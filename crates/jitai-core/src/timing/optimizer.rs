//! Hour-of-day effectiveness analysis over the outcome history.
//!
//! Records for one app and one weekday/weekend class are bucketed by local
//! hour. A bucket is trusted only once it holds `min_hour_samples` records;
//! untrusted buckets never become a best, worst or alternative hour.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

use super::hours::{forward_delay_ms, forward_distance, HOURS_PER_DAY};
use crate::cache::TtlCache;
use crate::model::InterventionOutcomeRecord;
use crate::reward::is_successful_outcome;
use crate::storage::{read_range_paged, OutcomeStore, TimingConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimingConfidence {
    Low,
    Medium,
    High,
}

impl TimingConfidence {
    pub fn as_str(self) -> &'static str {
        match self {
            TimingConfidence::Low => "LOW",
            TimingConfidence::Medium => "MEDIUM",
            TimingConfidence::High => "HIGH",
        }
    }
}

/// Success statistics for one hour bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourStats {
    pub hour: u8,
    pub samples: usize,
    pub successes: usize,
    pub success_rate: f64,
    pub reliable: bool,
}

/// Whether now is a good moment for `target_app`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingRecommendation {
    pub should_intervene_now: bool,
    pub should_delay: bool,
    pub confidence: TimingConfidence,
    /// Milliseconds until the nearest better hour; 0 unless delaying
    pub recommended_delay_ms: i64,
    pub reason: String,
    /// Reliable better hours, best first
    pub alternative_hours: Vec<u8>,
    pub current_hour: u8,
    pub current_hour_success_rate: Option<f64>,
    pub overall_success_rate: Option<f64>,
    pub best_hour: Option<u8>,
    pub worst_hour: Option<u8>,
    pub sample_size: usize,
}

impl TimingRecommendation {
    /// Permissive default with no usable history.
    pub fn no_data(current_hour: u8, reason: impl Into<String>) -> Self {
        Self {
            should_intervene_now: true,
            should_delay: false,
            confidence: TimingConfidence::Low,
            recommended_delay_ms: 0,
            reason: reason.into(),
            alternative_hours: Vec::new(),
            current_hour,
            current_hour_success_rate: None,
            overall_success_rate: None,
            best_hour: None,
            worst_hour: None,
            sample_size: 0,
        }
    }

    pub fn is_high_confidence_delay(&self) -> bool {
        self.should_delay && self.confidence == TimingConfidence::High
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TimingKey {
    target_app: String,
    hour: u8,
    is_weekend: bool,
}

/// Cached per-(app, hour, weekend) timing analysis.
pub struct ContextualTimingOptimizer {
    store: Arc<dyn OutcomeStore>,
    config: TimingConfig,
    cache: TtlCache<TimingKey, TimingRecommendation>,
}

impl ContextualTimingOptimizer {
    pub fn new(store: Arc<dyn OutcomeStore>) -> Self {
        Self::with_config(store, TimingConfig::default())
    }

    pub fn with_config(store: Arc<dyn OutcomeStore>, config: TimingConfig) -> Self {
        let cache = TtlCache::with_ttl_secs(config.cache_ttl_secs);
        Self {
            store,
            config,
            cache,
        }
    }

    pub fn config(&self) -> &TimingConfig {
        &self.config
    }

    pub async fn get_recommendation(
        &self,
        target_app: &str,
        current_hour: u8,
        is_weekend: bool,
        refresh: bool,
    ) -> TimingRecommendation {
        self.get_recommendation_at(target_app, current_hour, is_weekend, refresh, Utc::now())
            .await
    }

    /// Recommendation as of `now`.
    ///
    /// With `refresh` the cache lookup is skipped and the freshly computed
    /// value replaces this key's cached entry. Other keys keep theirs.
    pub async fn get_recommendation_at(
        &self,
        target_app: &str,
        current_hour: u8,
        is_weekend: bool,
        refresh: bool,
        now: DateTime<Utc>,
    ) -> TimingRecommendation {
        let current_hour = current_hour % HOURS_PER_DAY;
        let key = TimingKey {
            target_app: target_app.to_string(),
            hour: current_hour,
            is_weekend,
        };

        if !refresh {
            if let Some(cached) = self.cache.get(&key, now) {
                tracing::debug!(app = target_app, hour = current_hour, "timing cache hit");
                return cached;
            }
        }

        let records = match self.load_records(target_app, is_weekend, now).await {
            Some(records) => records,
            None => {
                return TimingRecommendation::no_data(
                    current_hour,
                    "Outcome history unavailable; allowing",
                )
            }
        };

        let recommendation = analyze(&records, current_hour, &self.config);
        self.cache.insert(key, recommendation.clone(), now);
        recommendation
    }

    /// Per-hour buckets for one app and weekday class, as of `now`.
    pub async fn hour_profile_at(
        &self,
        target_app: &str,
        is_weekend: bool,
        now: DateTime<Utc>,
    ) -> Vec<HourStats> {
        let records = self
            .load_records(target_app, is_weekend, now)
            .await
            .unwrap_or_default();
        bucket_by_hour(&records, self.config.min_hour_samples).to_vec()
    }

    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }

    /// `None` when the store fails; the caller falls back to no-data.
    async fn load_records(
        &self,
        target_app: &str,
        is_weekend: bool,
        now: DateTime<Utc>,
    ) -> Option<Vec<InterventionOutcomeRecord>> {
        let end_ms = now.timestamp_millis();
        let start_ms = (now - Duration::days(self.config.window_days)).timestamp_millis();

        match read_range_paged(self.store.as_ref(), start_ms, end_ms, self.config.page_size).await {
            Ok(records) => Some(
                records
                    .into_iter()
                    .filter(|r| r.target_app == target_app && r.is_weekend == is_weekend)
                    .collect(),
            ),
            Err(e) => {
                tracing::warn!(error = %e, app = target_app, "timing history read failed");
                None
            }
        }
    }
}

/// Bucket records by `hour_of_day`.
pub fn bucket_by_hour(
    records: &[InterventionOutcomeRecord],
    min_hour_samples: usize,
) -> [HourStats; 24] {
    let mut counts = [(0usize, 0usize); 24];
    for record in records {
        let slot = &mut counts[usize::from(record.hour_of_day % HOURS_PER_DAY)];
        slot.0 += 1;
        if is_successful_outcome(record.user_choice, record.user_feedback) {
            slot.1 += 1;
        }
    }

    std::array::from_fn(|h| {
        let (samples, successes) = counts[h];
        HourStats {
            hour: h as u8,
            samples,
            successes,
            success_rate: if samples == 0 {
                0.0
            } else {
                successes as f64 / samples as f64
            },
            reliable: samples >= min_hour_samples,
        }
    })
}

/// Higher rate first; equal rates prefer the hour reached sooner from `from`.
fn rank_desc(from: u8, a: &HourStats, b: &HourStats) -> Ordering {
    b.success_rate
        .partial_cmp(&a.success_rate)
        .unwrap_or(Ordering::Equal)
        .then_with(|| forward_distance(from, a.hour).cmp(&forward_distance(from, b.hour)))
}

/// Lower rate first, same tie-break.
fn rank_asc(from: u8, a: &HourStats, b: &HourStats) -> Ordering {
    a.success_rate
        .partial_cmp(&b.success_rate)
        .unwrap_or(Ordering::Equal)
        .then_with(|| forward_distance(from, a.hour).cmp(&forward_distance(from, b.hour)))
}

/// Pure analysis step: records already filtered to one app and weekday class.
pub fn analyze(
    records: &[InterventionOutcomeRecord],
    current_hour: u8,
    config: &TimingConfig,
) -> TimingRecommendation {
    let current_hour = current_hour % HOURS_PER_DAY;
    let total = records.len();
    if total == 0 {
        return TimingRecommendation::no_data(current_hour, "No timing history; allowing");
    }

    let buckets = bucket_by_hour(records, config.min_hour_samples);
    let overall_rate =
        buckets.iter().map(|b| b.successes).sum::<usize>() as f64 / total as f64;
    let current = &buckets[usize::from(current_hour)];

    let confidence = if total < config.min_total_samples || !current.reliable {
        TimingConfidence::Low
    } else if total >= config.high_confidence_total_samples
        && current.samples >= config.high_confidence_hour_samples
    {
        TimingConfidence::High
    } else {
        TimingConfidence::Medium
    };

    let reliable: Vec<&HourStats> = buckets.iter().filter(|b| b.reliable).collect();

    let best_hour = reliable
        .iter()
        .min_by(|a, b| rank_desc(current_hour, a, b))
        .map(|b| b.hour);
    let worst_hour = reliable
        .iter()
        .min_by(|a, b| rank_asc(current_hour, a, b))
        .map(|b| b.hour);

    let is_bad_hour = current.reliable && current.success_rate < overall_rate - config.bad_hour_margin;

    let floor = if current.reliable {
        overall_rate.max(current.success_rate + config.bad_hour_margin)
    } else {
        overall_rate
    };
    let mut better: Vec<&HourStats> = reliable
        .iter()
        .copied()
        .filter(|b| b.hour != current_hour && b.success_rate >= floor && b.success_rate > current.success_rate)
        .collect();
    better.sort_by(|a, b| rank_desc(current_hour, a, b));

    let alternative_hours: Vec<u8> = better
        .iter()
        .take(config.max_alternatives)
        .map(|b| b.hour)
        .collect();

    let nearest_better = better
        .iter()
        .map(|b| b.hour)
        .min_by_key(|h| forward_distance(current_hour, *h));

    let should_delay = is_bad_hour && nearest_better.is_some() && confidence != TimingConfidence::Low;
    let recommended_delay_ms = match (should_delay, nearest_better) {
        (true, Some(target)) => forward_delay_ms(current_hour, target),
        _ => 0,
    };
    let should_intervene_now = !(is_bad_hour && confidence == TimingConfidence::High);

    let reason = if confidence == TimingConfidence::Low && !current.reliable {
        format!(
            "Hour {current_hour} has {} samples (need {}); allowing",
            current.samples, config.min_hour_samples
        )
    } else if confidence == TimingConfidence::Low {
        format!(
            "Only {total} samples overall (need {}); allowing",
            config.min_total_samples
        )
    } else if is_bad_hour {
        match nearest_better {
            Some(target) => format!(
                "Hour {current_hour} success {:.0}% vs {:.0}% overall; hour {target} is better",
                current.success_rate * 100.0,
                overall_rate * 100.0
            ),
            None => format!(
                "Hour {current_hour} success {:.0}% vs {:.0}% overall; no better hour known",
                current.success_rate * 100.0,
                overall_rate * 100.0
            ),
        }
    } else {
        format!(
            "Hour {current_hour} success {:.0}% is in line with {:.0}% overall",
            current.success_rate * 100.0,
            overall_rate * 100.0
        )
    };

    TimingRecommendation {
        should_intervene_now,
        should_delay,
        confidence,
        recommended_delay_ms,
        reason,
        alternative_hours,
        current_hour,
        current_hour_success_rate: (current.samples > 0).then_some(current.success_rate),
        overall_success_rate: Some(overall_rate),
        best_hour,
        worst_hour,
        sample_size: total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentType, UserChoice};
    use crate::storage::MemoryOutcomeStore;
    use chrono::TimeZone;

    fn records_at(hour: u8, go_back: usize, dismiss: usize) -> Vec<InterventionOutcomeRecord> {
        let mut out = Vec::new();
        for i in 0..(go_back + dismiss) {
            let choice = if i < go_back {
                UserChoice::GoBack
            } else {
                UserChoice::Dismiss
            };
            out.push(
                InterventionOutcomeRecord::new("s", "app", ContentType::Quote, choice, 1_000 + i as i64)
                    .at_local_time(hour, 2),
            );
        }
        out
    }

    #[test]
    fn test_empty_history_allows_with_low_confidence() {
        let rec = analyze(&[], 23, &TimingConfig::default());
        assert!(rec.should_intervene_now);
        assert!(!rec.should_delay);
        assert_eq!(rec.confidence, TimingConfidence::Low);
    }

    #[test]
    fn test_bad_hour_with_high_confidence_delays_across_midnight() {
        let mut records = records_at(23, 1, 11);
        records.extend(records_at(2, 18, 2));
        records.extend(records_at(14, 18, 2));
        let rec = analyze(&records, 23, &TimingConfig::default());

        assert_eq!(rec.confidence, TimingConfidence::High);
        assert!(!rec.should_intervene_now);
        assert!(rec.should_delay);
        assert_eq!(rec.recommended_delay_ms, 3 * 3_600_000);
        assert_eq!(rec.alternative_hours, vec![2, 14]);
        assert_eq!(rec.best_hour, Some(2));
        assert_eq!(rec.worst_hour, Some(23));
    }

    #[test]
    fn test_unreliable_hours_never_alternatives() {
        let mut records = records_at(9, 2, 10);
        records.extend(records_at(10, 4, 0));
        records.extend(records_at(15, 10, 2));
        let rec = analyze(&records, 9, &TimingConfig::default());
        assert!(!rec.alternative_hours.contains(&10));
        assert_eq!(rec.alternative_hours, vec![15]);
    }

    #[test]
    fn test_unreliable_current_hour_is_low_confidence() {
        let mut records = records_at(8, 1, 3);
        records.extend(records_at(12, 20, 5));
        let rec = analyze(&records, 8, &TimingConfig::default());
        assert_eq!(rec.confidence, TimingConfidence::Low);
        assert!(rec.should_intervene_now);
        assert!(!rec.should_delay);
    }

    #[test]
    fn test_medium_confidence_delays_but_still_intervenes() {
        let mut records = records_at(20, 1, 6);
        records.extend(records_at(21, 12, 3));
        let rec = analyze(&records, 20, &TimingConfig::default());
        assert_eq!(rec.confidence, TimingConfidence::Medium);
        assert!(rec.should_delay);
        assert!(rec.should_intervene_now);
        assert_eq!(rec.recommended_delay_ms, 3_600_000);
    }

    #[tokio::test]
    async fn test_refresh_replaces_cached_entry() {
        let store = Arc::new(MemoryOutcomeStore::new());
        let optimizer = ContextualTimingOptimizer::new(store.clone());
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

        let first = optimizer.get_recommendation_at("app", 10, false, false, now).await;
        assert_eq!(first.sample_size, 0);
        let neighbour = optimizer.get_recommendation_at("app", 11, false, false, now).await;
        assert_eq!(neighbour.sample_size, 0);

        let record = InterventionOutcomeRecord::new(
            "s",
            "app",
            ContentType::Quote,
            UserChoice::GoBack,
            now.timestamp_millis() - 1_000,
        )
        .at_local_time(10, 3);
        store.append(&record).await.unwrap();

        let cached = optimizer.get_recommendation_at("app", 10, false, false, now).await;
        assert_eq!(cached.sample_size, 0);

        let fresh = optimizer.get_recommendation_at("app", 10, false, true, now).await;
        assert_eq!(fresh.sample_size, 1);

        let after = optimizer.get_recommendation_at("app", 10, false, false, now).await;
        assert_eq!(after.sample_size, 1);

        let neighbour = optimizer.get_recommendation_at("app", 11, false, false, now).await;
        assert_eq!(neighbour.sample_size, 0);

        optimizer.invalidate_cache();
        let other_app = optimizer.get_recommendation_at("other", 10, false, false, now).await;
        assert_eq!(other_app.sample_size, 0);
    }
}
