//! qroute Core Integration Tests

use std::sync::Arc;

use qroute_core::routing::{
    PersistedTable, QTableStore, Route, Router, RouterConfig, SharedRouter, from_json, to_json,
};
use tempfile::tempdir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("qroute_core=debug")
        .with_test_writer()
        .try_init();
}

fn seeded(config: RouterConfig) -> Router {
    Router::with_seed(config, 2024).unwrap()
}

const CONTEXTS: &[&str] = &[
    "write unit tests",
    "refactor the storage layer",
    "investigate memory leak in worker",
    "document the public API",
    "",
    "日本語のタスク",
    "rm -rf /tmp/* && echo $PATH | tee log",
];

#[test]
fn test_write_unit_tests_scenario() {
    init_tracing();
    let mut router = seeded(RouterConfig::default());

    for _ in 0..50 {
        router.update("write unit tests", "tester", 10.0, None);
    }
    for _ in 0..20 {
        router.update("write unit tests", "coder", -5.0, None);
    }

    let decision = router.route("write unit tests", false);
    assert_eq!(decision.route, Route::Tester);
    assert!(!decision.explored);
    assert!(decision.confidence > 0.9);
}

#[test]
fn test_fresh_empty_context() {
    let mut router = seeded(RouterConfig::default());
    let decision = router.route("", true);

    assert!(Route::ALL.contains(&decision.route));
    assert!(decision.q_values.iter().all(|&q| q == 0.0));
    assert_eq!(decision.q_values.len(), 8);
}

#[test]
fn test_vector_length_for_all_contexts() {
    for num_actions in [1, 3, 8] {
        let mut router = seeded(RouterConfig {
            num_actions,
            ..Default::default()
        });
        for context in CONTEXTS {
            let decision = router.route(context, true);
            assert_eq!(decision.q_values.len(), num_actions);
            assert!(decision.route.index() < num_actions);
            assert!((0.0..=1.0).contains(&decision.confidence));
        }
    }
}

#[test]
fn test_repeated_exploit_is_stable() {
    let mut router = seeded(RouterConfig::default());
    router.update("stable", "researcher", 2.0, None);
    router.update("stable", "reviewer", 1.0, None);

    let first = router.route("stable", false);
    for _ in 0..20 {
        let again = router.route("stable", false);
        assert_eq!(again.route, first.route);
        assert_eq!(again.q_values, first.q_values);
        assert!(!again.explored);
    }
}

#[test]
fn test_policy_converges_to_reinforced_action() {
    let mut router = seeded(RouterConfig::default());
    for route in Route::ALL {
        let context = format!("context for {}", route);
        for _ in 0..100 {
            router.update(&context, route.as_str(), 5.0, None);
        }
        assert_eq!(router.route(&context, false).route, route);
    }
}

#[test]
fn test_negative_action_avoided() {
    let mut router = seeded(RouterConfig::default());
    router.update("mixed", "architect", 10.0, None);
    for _ in 0..50 {
        router.update("mixed", "coder", -10.0, None);
    }

    let decision = router.route("mixed", false);
    assert_ne!(decision.route, Route::Coder);
    assert_eq!(decision.route, Route::Architect);
}

#[test]
fn test_epsilon_never_increases() {
    let config = RouterConfig {
        exploration_initial: 0.8,
        exploration_decay: 0.05,
        exploration_floor: 0.1,
        ..Default::default()
    };
    let mut router = seeded(config);
    let mut epsilon = router.stats().epsilon;
    assert_eq!(epsilon, 0.8);

    for (i, context) in CONTEXTS.iter().cycle().take(200).enumerate() {
        router.route(context, true);
        router.update(context, Route::ALL[i % 8].as_str(), 1.0, Some("next"));
        let now = router.stats().epsilon;
        assert!(now <= epsilon);
        assert!(now >= 0.1);
        epsilon = now;
    }
}

#[test]
fn test_capacity_evicts_exactly_one() {
    let config = RouterConfig {
        max_states: 5,
        ..Default::default()
    };
    let mut router = seeded(config);
    for i in 0..5 {
        router.update(&format!("state {}", i), "coder", 1.0, None);
    }
    assert_eq!(router.stats().q_table_size, 5);

    router.update("state 5", "tester", 1.0, None);
    assert_eq!(router.stats().q_table_size, 5);
    assert!(router.peek("state 5").is_some());

    let survivors = (0..5)
        .filter(|i| router.peek(&format!("state {}", i)).is_some())
        .count();
    assert_eq!(survivors, 4);

    for i in 6..50 {
        router.route(&format!("state {}", i), true);
        assert!(router.stats().q_table_size <= 5);
    }
}

#[test]
fn test_unknown_action_changes_nothing() {
    let mut router = seeded(RouterConfig::default());
    router.update("known", "coder", 1.0, None);
    let before = router.stats();
    let snapshot = router.export();

    assert_eq!(router.update("known", "janitor", 100.0, None), 0.0);
    assert_eq!(router.update("unseen", "CODER", 100.0, None), 0.0);

    let after = router.stats();
    assert_eq!(after.update_count, before.update_count);
    assert_eq!(after.q_table_size, before.q_table_size);
    assert_eq!(router.export(), snapshot);
}

#[test]
fn test_export_reset_import_round_trip() {
    init_tracing();
    let mut router = seeded(RouterConfig::default());
    for (i, context) in CONTEXTS.iter().enumerate() {
        let route = Route::ALL[(i * 3) % 8];
        for _ in 0..10 {
            router.update(context, route.as_str(), 3.0, None);
        }
        router.update(context, "documenter", 0.5, Some(CONTEXTS[0]));
    }

    let before: Vec<_> = CONTEXTS
        .iter()
        .map(|c| router.route(c, false))
        .collect();

    let exported = router.export();
    router.reset();
    assert_eq!(router.stats().q_table_size, 0);

    let report = router.import(exported);
    assert_eq!(report.imported, CONTEXTS.len());
    assert_eq!(report.skipped, 0);

    for (context, expected) in CONTEXTS.iter().zip(before) {
        let decision = router.route(context, false);
        assert_eq!(decision.route, expected.route);
        assert_eq!(decision.q_values, expected.q_values);
    }
}

#[test]
fn test_json_round_trip_into_new_router() {
    let mut trained = seeded(RouterConfig::default());
    for _ in 0..30 {
        trained.update("triage crash report", "debugger", 4.0, None);
    }
    let json = to_json(&trained.export()).unwrap();
    assert!(json.contains("\"qValues\""));

    let mut fresh = seeded(RouterConfig::default());
    let report = fresh.import(from_json(&json).unwrap());
    assert_eq!(report.imported, 1);
    assert_eq!(fresh.route("triage crash report", false).route, Route::Debugger);
}

#[test]
fn test_import_into_smaller_router_respects_capacity() {
    let mut large = seeded(RouterConfig::default());
    for i in 0..20 {
        for _ in 0..=i {
            large.update(&format!("job {}", i), "coder", 1.0, None);
        }
    }

    let mut small = seeded(RouterConfig {
        max_states: 5,
        ..Default::default()
    });
    let report = small.import(large.export());
    assert_eq!(report.imported, 5);
    assert_eq!(report.evicted, 15);
    assert_eq!(small.stats().q_table_size, 5);
    for i in 15..20 {
        assert!(small.peek(&format!("job {}", i)).is_some());
    }
}

#[test]
fn test_import_rejects_foreign_action_count() {
    let mut eight = seeded(RouterConfig::default());
    eight.update("task", "coder", 1.0, None);

    let mut four = seeded(RouterConfig {
        num_actions: 4,
        ..Default::default()
    });
    let report = four.import(eight.export());
    assert_eq!(report.imported, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(four.stats().q_table_size, 0);
}

#[test]
fn test_import_empty_table_clears() {
    let mut router = seeded(RouterConfig::default());
    router.update("task", "coder", 1.0, None);
    router.import(PersistedTable::new());
    assert_eq!(router.stats().q_table_size, 0);
}

#[tokio::test]
async fn test_shared_router_survives_restart() {
    init_tracing();
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("qroute.db");

    let store = QTableStore::connect(&db_path).await.unwrap();
    store.init().await.unwrap();
    let shared =
        SharedRouter::new(seeded(RouterConfig::default())).with_store(Arc::new(store));

    for _ in 0..40 {
        shared
            .update_route("benchmark the hot path", Route::Optimizer, 3.0, None)
            .await
            .unwrap();
    }
    shared.save_table().await.unwrap();
    drop(shared);

    let store = QTableStore::connect(&db_path).await.unwrap();
    let summary = store.summary().await.unwrap();
    assert_eq!(summary.state_count, 1);
    assert_eq!(summary.total_visits, 40);

    let restored = SharedRouter::new(seeded(RouterConfig::default()))
        .with_store(Arc::new(store))
        .with_persist_on_update(true);
    restored.load_table().await.unwrap();

    let decision = restored.route("benchmark the hot path", false).await.unwrap();
    assert_eq!(decision.route, Route::Optimizer);
}
