//! Windowed burden metrics and the additive score rule set.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{InterventionOutcomeRecord, UserChoice, UserFeedback};
use crate::reward::{calculate_reward, RewardInput};
use crate::storage::{BurdenConfig, BurdenRuleConfig};

/// Direction of a half-over-half comparison within the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Improving,
    #[default]
    Stable,
    Declining,
}

/// Aggregates over one read window. Recomputed on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurdenMetrics {
    pub dismiss_rate: f64,
    pub timeout_rate: f64,
    /// Snoozes in the last 24h
    pub snooze_frequency: u32,
    /// GO_BACK share of the most recent records
    pub recent_go_back_rate: f64,
    pub helpful_feedback_count: u32,
    pub disruptive_feedback_count: u32,
    /// helpful / (helpful + disruptive); 0.5 with no explicit feedback
    pub helpfulness_ratio: f64,
    pub engagement_trend: Trend,
    /// Mean reward across the window
    pub effectiveness_rolling_7d: f64,
    pub effectiveness_trend: Trend,
    pub interventions_last_24h: u32,
    pub interventions_last_7d: u32,
    pub avg_intervention_spacing_minutes: Option<f64>,
    pub min_intervention_spacing_minutes: Option<f64>,
    pub sample_size: usize,
    pub calculated_at: DateTime<Utc>,
    /// Epoch ms of the newest record
    pub last_intervention_at: Option<i64>,
}

impl BurdenMetrics {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            dismiss_rate: 0.0,
            timeout_rate: 0.0,
            snooze_frequency: 0,
            recent_go_back_rate: 0.0,
            helpful_feedback_count: 0,
            disruptive_feedback_count: 0,
            helpfulness_ratio: 0.5,
            engagement_trend: Trend::Stable,
            effectiveness_rolling_7d: 0.5,
            effectiveness_trend: Trend::Stable,
            interventions_last_24h: 0,
            interventions_last_7d: 0,
            avg_intervention_spacing_minutes: None,
            min_intervention_spacing_minutes: None,
            sample_size: 0,
            calculated_at: now,
            last_intervention_at: None,
        }
    }

    pub fn feedback_count(&self) -> u32 {
        self.helpful_feedback_count + self.disruptive_feedback_count
    }
}

fn rate(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Compare the mean of `value` over the older and newer halves of `records`.
fn half_trend(
    records: &[InterventionOutcomeRecord],
    min_samples: usize,
    delta: f64,
    value: impl Fn(&InterventionOutcomeRecord) -> f64,
) -> Trend {
    if records.len() < min_samples.max(2) {
        return Trend::Stable;
    }
    let (older, newer) = records.split_at(records.len() / 2);
    let (Some(older), Some(newer)) = (mean(older.iter().map(&value)), mean(newer.iter().map(&value)))
    else {
        return Trend::Stable;
    };
    if newer - older > delta {
        Trend::Improving
    } else if older - newer > delta {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

fn record_reward(record: &InterventionOutcomeRecord) -> f64 {
    calculate_reward(&RewardInput::from_record(record))
}

fn engaged(record: &InterventionOutcomeRecord) -> f64 {
    match record.user_choice {
        UserChoice::Dismiss | UserChoice::Timeout => 0.0,
        _ => 1.0,
    }
}

/// Aggregate `records` (oldest first) as of `now`.
pub fn compute_metrics(
    records: &[InterventionOutcomeRecord],
    now: DateTime<Utc>,
    config: &BurdenConfig,
) -> BurdenMetrics {
    if records.is_empty() {
        return BurdenMetrics::empty(now);
    }

    let now_ms = now.timestamp_millis();
    let day_ago_ms = (now - Duration::hours(24)).timestamp_millis();
    let week_ago_ms = (now - Duration::days(7)).timestamp_millis();
    let total = records.len();

    let count_choice = |choice: UserChoice| records.iter().filter(|r| r.user_choice == choice).count();
    let helpful = records
        .iter()
        .filter(|r| r.user_feedback == UserFeedback::Helpful)
        .count() as u32;
    let disruptive = records
        .iter()
        .filter(|r| r.user_feedback == UserFeedback::Disruptive)
        .count() as u32;
    let helpfulness_ratio = if helpful + disruptive == 0 {
        0.5
    } else {
        f64::from(helpful) / f64::from(helpful + disruptive)
    };

    let last_day: Vec<&InterventionOutcomeRecord> = records
        .iter()
        .filter(|r| r.timestamp >= day_ago_ms && r.timestamp <= now_ms)
        .collect();
    let last_week = records
        .iter()
        .filter(|r| r.timestamp >= week_ago_ms && r.timestamp <= now_ms)
        .count() as u32;

    let recent_start = total.saturating_sub(config.recent_sample_size.max(1));
    let recent = &records[recent_start..];
    let recent_go_back_rate = rate(
        recent.iter().filter(|r| r.user_choice == UserChoice::GoBack).count(),
        recent.len(),
    );

    let mut day_stamps: Vec<i64> = last_day.iter().map(|r| r.timestamp).collect();
    day_stamps.sort_unstable();
    let gaps: Vec<f64> = day_stamps
        .windows(2)
        .map(|w| (w[1] - w[0]) as f64 / 60_000.0)
        .collect();
    let avg_spacing = mean(gaps.iter().copied());
    let min_spacing = gaps.iter().copied().reduce(f64::min);

    BurdenMetrics {
        dismiss_rate: rate(count_choice(UserChoice::Dismiss), total),
        timeout_rate: rate(count_choice(UserChoice::Timeout), total),
        snooze_frequency: last_day.iter().filter(|r| r.was_snoozed).count() as u32,
        recent_go_back_rate,
        helpful_feedback_count: helpful,
        disruptive_feedback_count: disruptive,
        helpfulness_ratio,
        engagement_trend: half_trend(records, config.min_trend_samples, config.trend_delta, engaged),
        effectiveness_rolling_7d: mean(records.iter().map(record_reward)).unwrap_or(0.5),
        effectiveness_trend: half_trend(
            records,
            config.min_trend_samples,
            config.trend_delta,
            record_reward,
        ),
        interventions_last_24h: last_day.len() as u32,
        interventions_last_7d: last_week,
        avg_intervention_spacing_minutes: avg_spacing,
        min_intervention_spacing_minutes: min_spacing,
        sample_size: total,
        calculated_at: now,
        last_intervention_at: records.iter().map(|r| r.timestamp).max(),
    }
}

/// One rule that fired, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurdenFactor {
    pub rule: String,
    pub weight: i32,
}

/// Sum the weights of every rule whose threshold `metrics` crosses.
///
/// Each rule is a one-sided threshold on a single metric, so raising any
/// negative-signal input can only add weight.
pub fn score_metrics(metrics: &BurdenMetrics, rules: &BurdenRuleConfig) -> (i32, Vec<BurdenFactor>) {
    let checks = [
        (
            "high_dismiss_rate",
            metrics.dismiss_rate > rules.dismiss_rate_threshold,
            rules.dismiss_rate_weight,
        ),
        (
            "high_timeout_rate",
            metrics.timeout_rate > rules.timeout_rate_threshold,
            rules.timeout_rate_weight,
        ),
        (
            "frequent_snoozing",
            metrics.snooze_frequency > rules.snooze_frequency_threshold,
            rules.snooze_frequency_weight,
        ),
        (
            "declining_engagement",
            metrics.engagement_trend == Trend::Declining,
            rules.declining_engagement_weight,
        ),
        (
            "high_daily_volume",
            metrics.interventions_last_24h > rules.interventions_24h_threshold,
            rules.interventions_24h_weight,
        ),
        (
            "low_effectiveness",
            metrics.effectiveness_rolling_7d < rules.effectiveness_threshold,
            rules.effectiveness_weight,
        ),
        (
            "declining_effectiveness",
            metrics.effectiveness_trend == Trend::Declining,
            rules.declining_effectiveness_weight,
        ),
        (
            "low_helpfulness",
            metrics.feedback_count() >= rules.helpfulness_min_feedback
                && metrics.helpfulness_ratio < rules.helpfulness_threshold,
            rules.helpfulness_weight,
        ),
        (
            "tight_average_spacing",
            metrics
                .avg_intervention_spacing_minutes
                .is_some_and(|m| m < rules.avg_spacing_minutes_threshold),
            rules.avg_spacing_weight,
        ),
        (
            "tight_minimum_spacing",
            metrics
                .min_intervention_spacing_minutes
                .is_some_and(|m| m < rules.min_spacing_minutes_threshold),
            rules.min_spacing_weight,
        ),
    ];

    let factors: Vec<BurdenFactor> = checks
        .into_iter()
        .filter(|(_, fired, _)| *fired)
        .map(|(rule, _, weight)| BurdenFactor {
            rule: rule.to_string(),
            weight,
        })
        .collect();
    let score = factors.iter().map(|f| f.weight.max(0)).sum();
    (score, factors)
}
