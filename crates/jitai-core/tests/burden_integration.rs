//! Integration tests for burden assessment against stored outcomes.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jitai_core::{
    BurdenLevel, ContentType, Database, InterventionBurdenTracker, InterventionOutcomeRecord,
    MemoryOutcomeStore, OutcomeStore, TrendDirection, UserChoice, UserFeedback,
};

fn now() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_750_000_000_000).unwrap()
}

fn hostile_record(at: DateTime<Utc>) -> InterventionOutcomeRecord {
    let mut record = InterventionOutcomeRecord::new(
        "session",
        "com.example.feed",
        ContentType::UsageStats,
        UserChoice::Dismiss,
        at.timestamp_millis(),
    );
    record.user_feedback = UserFeedback::Disruptive;
    record.was_snoozed = true;
    record.time_to_decision_ms = 30_000;
    record
}

/// 50 hostile outcomes, 20 minutes apart, the newest one minute ago.
fn hostile_day() -> Vec<InterventionOutcomeRecord> {
    (0..50)
        .map(|i| hostile_record(now() - Duration::minutes(1 + 20 * i)))
        .collect()
}

#[tokio::test]
async fn test_hostile_day_is_critical_and_reliable() {
    let tracker =
        InterventionBurdenTracker::new(Arc::new(MemoryOutcomeStore::with_records(hostile_day())));
    let report = tracker.assess_at(now(), false).await;

    assert!(report.is_reliable());
    assert_eq!(report.level, BurdenLevel::Critical);
    assert_eq!(report.effective_level(), BurdenLevel::Critical);
    assert!(report.is_critical());
    assert!(report.get_recommended_cooldown_multiplier() > 1.5);
    assert_eq!(report.metrics.interventions_last_24h, 50);
    assert_eq!(report.metrics.dismiss_rate, 1.0);
    assert_eq!(report.metrics.helpfulness_ratio, 0.0);
}

#[tokio::test]
async fn test_hostile_day_from_sqlite() {
    let db = Arc::new(Database::open_memory().unwrap());
    for record in hostile_day() {
        db.append(&record).await.unwrap();
    }
    let tracker = InterventionBurdenTracker::new(db);
    let report = tracker.assess_at(now(), false).await;
    assert_eq!(report.metrics.sample_size, 50);
    assert_eq!(report.level, BurdenLevel::Critical);
}

#[tokio::test]
async fn test_engaged_user_is_low_burden() {
    let records: Vec<_> = (0..30)
        .map(|i| {
            let mut record = InterventionOutcomeRecord::new(
                "session",
                "com.example.feed",
                ContentType::Reflection,
                UserChoice::GoBack,
                (now() - Duration::hours(2 + 4 * i)).timestamp_millis(),
            );
            record.user_feedback = UserFeedback::Helpful;
            record
        })
        .collect();
    let tracker = InterventionBurdenTracker::new(Arc::new(MemoryOutcomeStore::with_records(records)));
    let report = tracker.assess_at(now(), false).await;
    assert!(report.is_reliable());
    assert_eq!(report.level, BurdenLevel::Low);
    assert_eq!(report.score, 0);
    assert_eq!(report.get_recommended_cooldown_multiplier(), 1.0);
}

#[tokio::test]
async fn test_records_outside_window_are_ignored() {
    let old: Vec<_> = (0..20)
        .map(|i| hostile_record(now() - Duration::days(8) - Duration::minutes(i)))
        .collect();
    let tracker = InterventionBurdenTracker::new(Arc::new(MemoryOutcomeStore::with_records(old)));
    let report = tracker.assess_at(now(), false).await;
    assert_eq!(report.metrics.sample_size, 0);
    assert!(!report.is_reliable());
}

#[tokio::test]
async fn test_trend_escalates_as_burden_builds() {
    let store = Arc::new(MemoryOutcomeStore::new());
    let tracker = InterventionBurdenTracker::new(store.clone());

    tracker.assess_at(now(), true).await;
    for record in hostile_day() {
        store.append(&record).await.unwrap();
    }
    tracker.assess_at(now(), true).await;

    let trend = tracker.burden_trend();
    assert_eq!(trend.samples, 2);
    assert_eq!(trend.direction, TrendDirection::Escalating);
    assert!(trend.last_delta.unwrap_or_default() >= 12);
}
