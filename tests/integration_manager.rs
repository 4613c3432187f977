//! Integration Tests for DatabaseManager
//!
//! End-to-end workflow validation for production readiness.
//!
//! These tests validate key orchestration workflows:
//! - Full write -> read -> analytics lifecycle across three backends
//! - Degradation and recovery with the fallback-mode latch
//! - Forced fallback initialization
//! - Recommendation pipeline from model output to routed read
//! - Status route JSON contracts

use std::sync::Arc;

use tunestore::{
    BackendId, DatabaseManager, DateRange, FailoverState, ListeningEvent, Recommendation,
    RecommendationEngine, RecommendationQuery, SimBackend, SimConfig, SimLanguageModel,
    StoreError, UserRecord,
};

/// Manager over hand-held sim backends so tests can flip reachability.
fn rigged(seed: u64) -> (DatabaseManager, SimBackend, SimBackend, SimBackend) {
    let primary = SimBackend::new(BackendId::Primary, SimConfig::with_seed(seed));
    let secondary = SimBackend::new(BackendId::Secondary, SimConfig::with_seed(seed + 1));
    let fallback = SimBackend::new(BackendId::Fallback, SimConfig::with_seed(seed + 2));

    let manager = DatabaseManager::builder()
        .with_backend(Arc::new(primary.clone()))
        .with_backend(Arc::new(secondary.clone()))
        .with_backend(Arc::new(fallback.clone()))
        .build();

    (manager, primary, secondary, fallback)
}

// =============================================================================
// Full Lifecycle
// =============================================================================

#[tokio::test]
async fn test_full_write_read_analytics_workflow() -> anyhow::Result<()> {
    let (manager, primary, secondary, fallback) = rigged(42);
    manager.connect().await?;

    // Step 1: profile lands on every backend
    let user = UserRecord::new("u1")?.with_field("displayName", serde_json::json!("Jae"));
    let outcome = manager.upsert_user(&user).await?;
    assert!(outcome.success);
    assert_eq!(outcome.results.len(), 3);
    assert_eq!(primary.user_count(), 1);
    assert_eq!(secondary.user_count(), 1);
    assert_eq!(fallback.user_count(), 1);

    // Step 2: listening history fans out the same way
    let plays = vec![
        ListeningEvent::new("u1", "track-a")?,
        ListeningEvent::new("u1", "track-b")?,
        ListeningEvent::new("u1", "track-a")?,
    ];
    let outcome = manager.append_listening_history("u1", &plays).await?;
    assert!(outcome.success);
    assert_eq!(primary.event_count(), 3);

    // Step 3: per-user analytics come from the primary, with provenance
    let analytics = manager.user_analytics("u1", &DateRange::all()).await?;
    assert_eq!(analytics.source, BackendId::Primary);
    assert_eq!(analytics.data.total_plays, 3);
    assert_eq!(analytics.data.unique_tracks, 2);

    // Step 4: the overview counts what was written
    let overview = manager.analytics_overview().await;
    assert_eq!(overview.source, "primary");
    assert_eq!(overview.users_count, 1);
    assert_eq!(overview.listening_history_count, 3);
    assert_eq!(overview.total_documents, 4);
    Ok(())
}

#[tokio::test]
async fn test_recommendation_pipeline() {
    let (manager, primary, _, _) = rigged(42);
    manager.connect().await.unwrap();

    // Model output feeds the primary store
    let engine = RecommendationEngine::new(SimLanguageModel::with_seed(42));
    let history = vec![ListeningEvent::new("u1", "track-a").unwrap()];
    let generated = engine.generate("u1", &history, 10).await.unwrap();
    assert!(!generated.is_empty());

    primary.seed_recommendations("u1", generated.clone());

    // The routed read serves them back, best first, with provenance
    let outcome = manager
        .recommendations("u1", &RecommendationQuery::new())
        .await
        .unwrap();

    assert_eq!(outcome.source, BackendId::Primary);
    assert_eq!(outcome.data.len(), generated.len());
    for pair in outcome.data.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

// =============================================================================
// Degradation and Recovery
// =============================================================================

#[tokio::test]
async fn test_degradation_recovery_and_latch() {
    let (manager, primary, secondary, fallback) = rigged(42);
    manager.connect().await.unwrap();

    // Nominal
    assert_eq!(manager.info().await.state, FailoverState::Nominal);

    // Primary lost: degraded, writes keep landing on survivors
    primary.set_reachable(false);
    let info = manager.info().await;
    assert_eq!(info.state, FailoverState::Degraded);
    assert!(!info.fallback_mode);

    let outcome = manager
        .upsert_user(&UserRecord::new("u1").unwrap())
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.primary, Some(BackendId::Secondary));
    assert_eq!(primary.user_count(), 0);

    // Secondary also lost: fallback, latch arms
    secondary.set_reachable(false);
    let info = manager.info().await;
    assert_eq!(info.state, FailoverState::Fallback);
    assert!(info.fallback_mode);

    // Everything lost: unavailable, operations fail cleanly
    fallback.set_reachable(false);
    let err = manager
        .upsert_user(&UserRecord::new("u2").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::BackendsExhausted));

    // Full recovery: state returns to nominal, the latch does not clear
    primary.set_reachable(true);
    secondary.set_reachable(true);
    fallback.set_reachable(true);
    let info = manager.info().await;
    assert_eq!(info.state, FailoverState::Nominal);
    assert!(info.fallback_mode, "latch must survive recovery");
}

#[tokio::test]
async fn test_forced_fallback_isolates_managed_backends() {
    let (manager, primary, secondary, fallback) = rigged(42);
    manager.init_fallback().await.unwrap();

    let outcome = manager
        .upsert_user(&UserRecord::new("u1").unwrap())
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.primary, Some(BackendId::Fallback));
    assert_eq!(fallback.user_count(), 1);
    assert_eq!(primary.user_count(), 0);
    assert_eq!(secondary.user_count(), 0);

    // Overview degrades rather than consulting the primary
    let overview = manager.analytics_overview().await;
    assert_eq!(overview.source, "fallback");
    assert!(overview.error.is_some());
}

// =============================================================================
// Read Semantics
// =============================================================================

#[tokio::test]
async fn test_reads_fall_through_and_never_mask() {
    let (manager, primary, secondary, fallback) = rigged(42);
    manager.connect().await.unwrap();

    // Only the lowest-precedence backend has data, and the primary errors
    // mid-walk; the answer must still come back.
    fallback.seed_recommendations("u1", vec![Recommendation::new("t-f", 0.7)]);
    primary.set_reachable(false);

    let outcome = manager
        .recommendations("u1", &RecommendationQuery::new())
        .await
        .unwrap();
    assert_eq!(outcome.source, BackendId::Fallback);

    // Nothing anywhere for another user: NotFound, not the earlier error
    let err = manager
        .recommendations("u2", &RecommendationQuery::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    let _ = secondary;
}

#[tokio::test]
async fn test_read_limit_applied() {
    let (manager, primary, _, _) = rigged(42);
    manager.connect().await.unwrap();

    primary.seed_recommendations(
        "u1",
        (0..20)
            .map(|i| Recommendation::new(format!("t-{i:02}"), 0.5 + f64::from(i) * 0.01))
            .collect(),
    );

    let outcome = manager
        .recommendations("u1", &RecommendationQuery::new().with_limit(5))
        .await
        .unwrap();

    assert_eq!(outcome.data.len(), 5);
    assert_eq!(outcome.data[0].track_id, "t-19", "best score first");
}

// =============================================================================
// Status Contracts
// =============================================================================

#[tokio::test]
async fn test_health_snapshot_json_contract() {
    let (manager, primary, _, _) = rigged(42);
    primary.set_reachable(false);

    let snapshot = manager.health_check().await;
    let json = serde_json::to_value(&snapshot).unwrap();

    // Connections keyed by backend name, in precedence order
    assert_eq!(json["healthy"], true);
    assert_eq!(json["connections"]["primary"]["connected"], false);
    assert_eq!(
        json["connections"]["primary"]["last_error"],
        "connection refused"
    );
    assert_eq!(json["connections"]["secondary"]["connected"], true);
    assert_eq!(json["connections"]["fallback"]["connected"], true);
}

#[tokio::test]
async fn test_info_json_contract() {
    let (manager, _, _, _) = rigged(42);
    manager.connect().await.unwrap();

    let json = serde_json::to_value(&manager.info().await).unwrap();

    assert_eq!(json["state"], "nominal");
    assert_eq!(json["active"][0], "primary");
    assert_eq!(json["configured"], serde_json::json!(["primary", "secondary", "fallback"]));
    assert_eq!(json["fallback_mode"], false);
    assert_eq!(json["initialized"], true);
}

#[tokio::test]
async fn test_probe_routes_validation_before_io() {
    let (manager, _, _, _) = rigged(42);

    // Unknown names are rejected without touching any backend
    let err = manager.probe("cassette-deck").await.unwrap_err();
    assert!(matches!(err, StoreError::Validation { .. }));

    // Known names answer even before connect()
    let record = manager.probe("fallback").await.unwrap();
    assert_eq!(record.backend, BackendId::Fallback);
    assert!(record.connected);
}

#[tokio::test]
async fn test_write_outcome_json_contract() {
    use tunestore::{FaultConfig, FaultType};

    // Secondary probes fine but fails its write leg, so the failure shows
    // up as data in the results array.
    let primary = SimBackend::new(BackendId::Primary, SimConfig::with_seed(42));
    let secondary = SimBackend::new(BackendId::Secondary, SimConfig::with_seed(43))
        .with_faults(FaultConfig::new(FaultType::BackendWriteFail, 1.0).with_filter("upsert"));
    let fallback = SimBackend::new(BackendId::Fallback, SimConfig::with_seed(44));

    let manager = DatabaseManager::builder()
        .with_backend(Arc::new(primary))
        .with_backend(Arc::new(secondary))
        .with_backend(Arc::new(fallback))
        .build();
    manager.connect().await.unwrap();

    let outcome = manager
        .upsert_user(&UserRecord::new("u1").unwrap())
        .await
        .unwrap();
    let json = serde_json::to_value(&outcome).unwrap();

    assert_eq!(json["success"], true);
    assert_eq!(json["primary"], "primary");
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["backend"], "primary");
    assert_eq!(results[1]["backend"], "secondary");
    assert_eq!(results[1]["success"], false);
    assert_eq!(results[2]["success"], true);
}
