//! Integration tests for bandit learning, persistence and content selection.

use std::collections::HashSet;
use std::sync::Arc;

use jitai_core::reward::calculate_reward;
use jitai_core::{
    AdaptiveContentSelector, ContentType, Database, InterventionContext, KeyValueStore,
    MemoryKeyValueStore, RewardInput, ThompsonSamplingEngine, UserChoice, UserFeedback,
};
use rand::SeedableRng;
use rand_pcg::Pcg64;

#[test]
fn test_fresh_engine_selection_is_uncertain() {
    let engine = ThompsonSamplingEngine::new(Arc::new(MemoryKeyValueStore::new()));
    let selection = engine.select_arm(&HashSet::new());
    assert!(ContentType::ALL.contains(&selection.arm));
    assert!(selection.confidence < 0.5);
    assert!(!engine.has_sufficient_data());
}

#[test]
fn test_winning_arm_chosen_twice_as_often_as_losing_arm() {
    let engine = ThompsonSamplingEngine::new(Arc::new(MemoryKeyValueStore::new()));
    for _ in 0..100 {
        engine.update_arm(ContentType::TimeAlternative, 1.0).unwrap();
        engine.update_arm(ContentType::Gamification, 0.0).unwrap();
    }

    let mut rng = Pcg64::seed_from_u64(42);
    let mut winner = 0;
    let mut loser = 0;
    for _ in 0..100 {
        match engine.select_arm_with_rng(&HashSet::new(), &mut rng).arm {
            ContentType::TimeAlternative => winner += 1,
            ContentType::Gamification => loser += 1,
            _ => {}
        }
    }
    assert!(winner >= 2 * loser, "winner={winner} loser={loser}");
    assert!(winner > 50);
    assert!(engine.has_sufficient_data());
}

#[test]
fn test_posterior_survives_database_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jitai.db");

    {
        let db = Arc::new(Database::open_at(&path).unwrap());
        let engine = ThompsonSamplingEngine::new(db);
        engine.update_arm(ContentType::Reflection, 0.8).unwrap();
        engine.update_arm(ContentType::Reflection, 0.2).unwrap();
        engine.update_arm(ContentType::Quote, 1.0).unwrap();
    }

    let db = Arc::new(Database::open_at(&path).unwrap());
    assert!(db.get("thompson_sampling.arms").unwrap().is_some());
    let engine = ThompsonSamplingEngine::new(db);
    let reflection = engine.get_arm_stats(ContentType::Reflection);
    assert_eq!(reflection.total_pulls, 2);
    assert!((reflection.alpha - 2.0).abs() < 1e-9);
    assert!((reflection.beta - 2.0).abs() < 1e-9);
    assert_eq!(engine.total_pulls(), 3);
}

#[test]
fn test_concurrent_updates_on_one_arm_lose_nothing() {
    const THREADS: usize = 8;
    const UPDATES: usize = 250;

    let kv = Arc::new(MemoryKeyValueStore::new());
    let engine = ThompsonSamplingEngine::new(kv.clone());

    std::thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                for _ in 0..UPDATES {
                    engine.update_arm(ContentType::Quote, 0.5).unwrap();
                }
            });
        }
    });

    let expected_pulls = (THREADS * UPDATES) as u64;
    let expected_param = 1.0 + 0.5 * expected_pulls as f64;

    let check = |engine: &ThompsonSamplingEngine| {
        let quote = engine.get_arm_stats(ContentType::Quote);
        assert_eq!(quote.total_pulls, expected_pulls);
        assert!((quote.alpha - expected_param).abs() < 1e-9, "alpha={}", quote.alpha);
        assert!((quote.beta - expected_param).abs() < 1e-9, "beta={}", quote.beta);
        assert_eq!(engine.total_pulls(), expected_pulls);
    };

    check(&engine);
    // The last persisted snapshot must carry every update
    check(&ThompsonSamplingEngine::new(kv));
}

#[test]
fn test_reward_clamps_to_one() {
    let input = RewardInput::from_raw("GO_BACK", Some("HELPFUL"))
        .with_session_continued(false)
        .with_session_duration_after_ms(3 * 60_000)
        .with_reopen_delay_ms(10 * 60_000);
    assert_eq!(calculate_reward(&input), 1.0);
}

#[test]
fn test_outcome_loop_rewards_the_shown_arm() {
    let engine = Arc::new(ThompsonSamplingEngine::new(Arc::new(MemoryKeyValueStore::new())));
    let selector = AdaptiveContentSelector::new(engine.clone());
    let ctx = InterventionContext {
        last_session_end_time: Some(1_000),
        ..InterventionContext::new("com.example.video", 15, 3)
    };

    let shown = selector.select_content_type(&ctx, None, None);
    let before = engine.get_arm_stats(shown.content_type);

    let input = RewardInput::new(UserChoice::Dismiss).with_feedback(UserFeedback::Disruptive);
    let recorded = selector
        .record_outcome(&shown.intervention_id, &input)
        .unwrap()
        .unwrap();
    assert_eq!(recorded.reward, 0.0);

    let after = engine.get_arm_stats(shown.content_type);
    assert_eq!(after.total_pulls, before.total_pulls + 1);
    assert_eq!(after.alpha, before.alpha);
    assert_eq!(after.beta, before.beta + 1.0);

    assert!(selector
        .record_outcome(&shown.intervention_id, &input)
        .unwrap()
        .is_none());
    assert_eq!(engine.total_pulls(), 1);
}
