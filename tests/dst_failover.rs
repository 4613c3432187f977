//! DST Failover Tests
//!
//! Seeded fault injection against the full orchestration stack.
//!
//! Determinism contract: same seed + same fault configuration = same
//! per-backend results, same failover decisions, every run. A failing
//! seed from CI reproduces locally with `TUNESTORE_SIM_SEED`.

use std::sync::Arc;
use std::time::Duration;

use tunestore::{
    BackendAdapter, BackendId, DatabaseManager, FailoverState, FaultConfig, FaultType,
    ListeningEvent, ManagerConfig, RecommendationQuery, SimBackend, SimConfig, StoreError,
    UserRecord, WriteOutcome,
};

/// Build a manager whose every backend fails `filter` ops with the given
/// probability, deterministically from `seed`.
fn faulty_manager(seed: u64, fault_type: FaultType, probability: f64, filter: &str) -> DatabaseManager {
    let mut builder = DatabaseManager::builder();
    for (i, id) in BackendId::all().into_iter().enumerate() {
        let backend = SimBackend::new(id, SimConfig::with_seed(seed + i as u64)).with_faults(
            FaultConfig::new(fault_type, probability).with_filter(filter),
        );
        builder = builder.with_backend(Arc::new(backend));
    }
    builder.build()
}

async fn run_upserts(manager: &DatabaseManager, count: usize) -> Vec<WriteOutcome> {
    let mut outcomes = Vec::with_capacity(count);
    for i in 0..count {
        let user = UserRecord::new(format!("u{i}")).unwrap();
        outcomes.push(manager.upsert_user(&user).await.unwrap());
    }
    outcomes
}

// =============================================================================
// Determinism
// =============================================================================

#[tokio::test]
async fn test_same_seed_same_fault_sequence() {
    let a = faulty_manager(42, FaultType::BackendWriteFail, 0.5, "upsert");
    let b = faulty_manager(42, FaultType::BackendWriteFail, 0.5, "upsert");
    a.connect().await.unwrap();
    b.connect().await.unwrap();

    let outcomes_a = run_upserts(&a, 20).await;
    let outcomes_b = run_upserts(&b, 20).await;

    for (left, right) in outcomes_a.iter().zip(&outcomes_b) {
        assert_eq!(left, right, "same seed must reproduce identical outcomes");
    }
}

#[tokio::test]
async fn test_different_seeds_diverge() {
    let a = faulty_manager(42, FaultType::BackendWriteFail, 0.5, "upsert");
    let b = faulty_manager(777, FaultType::BackendWriteFail, 0.5, "upsert");
    a.connect().await.unwrap();
    b.connect().await.unwrap();

    let outcomes_a = run_upserts(&a, 20).await;
    let outcomes_b = run_upserts(&b, 20).await;

    // Not a hard guarantee for every pair, but 20 rounds of 3 coin flips
    // matching across two seeds would mean the RNG is broken.
    assert_ne!(outcomes_a, outcomes_b);
}

// =============================================================================
// Invariants Under Fault Injection
// =============================================================================

#[tokio::test]
async fn test_write_invariants_hold_across_seeds() {
    for seed in 1..=10 {
        let manager = faulty_manager(seed, FaultType::BackendWriteFail, 0.3, "upsert");
        manager.connect().await.unwrap();

        for outcome in run_upserts(&manager, 10).await {
            // success tracks per-backend results exactly
            assert_eq!(
                outcome.success,
                outcome.results.iter().any(|r| r.success),
                "seed {seed}: aggregate verdict out of sync"
            );
            // primary is the first success in precedence order
            assert_eq!(
                outcome.primary,
                outcome.results.iter().find(|r| r.success).map(|r| r.backend),
                "seed {seed}: wrong primary"
            );
            // results stay in precedence order regardless of completion
            let order: Vec<BackendId> = outcome.results.iter().map(|r| r.backend).collect();
            assert_eq!(
                order,
                vec![BackendId::Primary, BackendId::Secondary, BackendId::Fallback],
                "seed {seed}: result order broken"
            );
            // failed legs carry an error message
            for result in &outcome.results {
                assert_eq!(result.error.is_some(), !result.success, "seed {seed}");
            }
        }
    }
}

#[tokio::test]
async fn test_read_faults_never_mask_later_answers() {
    for seed in 1..=10 {
        let primary = SimBackend::new(BackendId::Primary, SimConfig::with_seed(seed)).with_faults(
            FaultConfig::new(FaultType::BackendReadFail, 0.5).with_filter("recommend"),
        );
        let fallback = SimBackend::new(BackendId::Fallback, SimConfig::with_seed(seed + 100));
        fallback.seed_recommendations(
            "u1",
            vec![tunestore::Recommendation::new("t-f", 0.7)],
        );

        let manager = DatabaseManager::builder()
            .with_backend(Arc::new(primary))
            .with_backend(Arc::new(fallback))
            .build();
        manager.connect().await.unwrap();

        // Whatever the primary does (errors, or NotFound since it holds
        // nothing), the fallback's answer must come through.
        for _ in 0..10 {
            let outcome = manager
                .recommendations("u1", &RecommendationQuery::new())
                .await
                .unwrap();
            assert_eq!(outcome.source, BackendId::Fallback, "seed {seed}");
        }
    }
}

#[tokio::test]
async fn test_injection_counts_are_reproducible() {
    let make = || {
        SimBackend::new(BackendId::Primary, SimConfig::with_seed(42)).with_faults(
            FaultConfig::new(FaultType::BackendWriteFail, 0.5).with_filter("upsert"),
        )
    };
    let a = make();
    let b = make();

    let run = |backend: SimBackend| async move {
        for i in 0..50 {
            let user = UserRecord::new(format!("u{i}")).unwrap();
            let _ = backend.upsert_user(&user).await;
        }
        backend.fault_injector().total_injections()
    };

    assert_eq!(run(a).await, run(b).await);
}

// =============================================================================
// Probe Faults and Failover Decisions
// =============================================================================

#[tokio::test]
async fn test_slow_probe_excludes_backend_from_active_set() {
    let primary = SimBackend::new(BackendId::Primary, SimConfig::with_seed(42));
    let secondary = SimBackend::new(BackendId::Secondary, SimConfig::with_seed(43));
    primary.set_probe_delay_ms(5_000);

    let manager = DatabaseManager::builder()
        .with_backend(Arc::new(primary.clone()))
        .with_backend(Arc::new(secondary.clone()))
        .with_config(ManagerConfig::new().with_probe_timeout(Duration::from_millis(50)))
        .build();
    manager.connect().await.unwrap();

    // The hung primary is excluded, not waited on
    let info = manager.info().await;
    assert_eq!(info.state, FailoverState::Degraded);
    assert_eq!(info.active, vec![BackendId::Secondary]);

    let outcome = manager
        .upsert_user(&UserRecord::new("u1").unwrap())
        .await
        .unwrap();
    assert_eq!(outcome.primary, Some(BackendId::Secondary));
    assert_eq!(primary.user_count(), 0);
    assert_eq!(secondary.user_count(), 1);
}

#[tokio::test]
async fn test_connect_faults_still_initialize() {
    let manager = faulty_manager(42, FaultType::BackendConnectFail, 1.0, "connect");

    // Connect attempts fail but the manager comes up; probes are a
    // separate operation and still see the backends.
    let decision = manager.connect().await.unwrap();
    assert!(!decision.active.is_empty());
}

#[tokio::test]
async fn test_total_write_fault_is_failed_outcome_not_error() {
    let manager = faulty_manager(42, FaultType::BackendWriteFail, 1.0, "append");
    manager.connect().await.unwrap();

    let events = vec![ListeningEvent::new("u1", "t1").unwrap()];
    let outcome = manager
        .append_listening_history("u1", &events)
        .await
        .unwrap();

    // Every leg failed, but that is data, not an Err
    assert!(!outcome.success);
    assert!(outcome.primary.is_none());
    assert_eq!(outcome.results.len(), 3);
    assert!(outcome.results.iter().all(|r| !r.success));
}

#[tokio::test]
async fn test_all_backends_exhausted_surfaces_cleanly() {
    let (a, b, c) = (
        SimBackend::new(BackendId::Primary, SimConfig::with_seed(1)),
        SimBackend::new(BackendId::Secondary, SimConfig::with_seed(2)),
        SimBackend::new(BackendId::Fallback, SimConfig::with_seed(3)),
    );
    a.set_reachable(false);
    b.set_reachable(false);
    c.set_reachable(false);

    let manager = DatabaseManager::builder()
        .with_backend(Arc::new(a))
        .with_backend(Arc::new(b))
        .with_backend(Arc::new(c))
        .build();
    manager.connect().await.unwrap();

    assert_eq!(manager.info().await.state, FailoverState::Unavailable);

    let err = manager
        .upsert_user(&UserRecord::new("u1").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::BackendsExhausted));

    let err = manager
        .recommendations("u1", &RecommendationQuery::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::BackendsExhausted));
}
