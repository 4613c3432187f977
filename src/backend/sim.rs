//! `SimBackend` - In-Memory Store for Testing
//!
//! `TigerStyle`: Deterministic testing with fault injection.
//!
//! # Simulation-First
//!
//! This file follows simulation-first development:
//! 1. Tests are written FIRST (below)
//! 2. Implementation follows to make tests pass
//! 3. DST integration enables fault injection
//!
//! Beyond faults, `SimBackend` can be flipped unreachable at runtime and can
//! delay its health probe, which is how failover and probe-timeout paths are
//! exercised without real infrastructure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::dst::{DeterministicRng, FaultConfig, FaultInjector, SimConfig};

use super::error::{StoreError, StoreResult};
use super::record::{
    BackendAnalytics, CollectionStats, DateRange, ListeningEvent, Recommendation,
    RecommendationQuery, UserRecord,
};
use super::{BackendAdapter, BackendId, ProbeResult};

// =============================================================================
// SimBackend
// =============================================================================

#[derive(Debug, Default)]
struct SimState {
    users: HashMap<String, UserRecord>,
    history: HashMap<String, Vec<ListeningEvent>>,
    recommendations: HashMap<String, Vec<Recommendation>>,
}

/// In-memory backend adapter for testing.
///
/// `TigerStyle`:
/// - Deterministic via `DeterministicRng`
/// - Fault injection via `FaultInjector`
/// - Thread-safe with `RwLock`
#[derive(Debug, Clone)]
pub struct SimBackend {
    /// Which role this instance plays in the adapter set
    id: BackendId,
    /// Stored records
    state: Arc<RwLock<SimState>>,
    /// Fault injector for simulating failures
    fault_injector: Arc<FaultInjector>,
    /// Deterministic RNG for probe latencies
    rng: Arc<RwLock<DeterministicRng>>,
    /// Reachability toggle for failover tests
    reachable: Arc<AtomicBool>,
    /// Artificial probe delay for timeout tests
    probe_delay_ms: Arc<AtomicU64>,
}

impl SimBackend {
    /// Create a new `SimBackend` playing the given role.
    #[must_use]
    pub fn new(id: BackendId, config: SimConfig) -> Self {
        let mut rng = DeterministicRng::new(config.seed());
        let fault_rng = rng.fork();

        Self {
            id,
            state: Arc::new(RwLock::new(SimState::default())),
            fault_injector: Arc::new(FaultInjector::new(fault_rng)),
            rng: Arc::new(RwLock::new(rng)),
            reachable: Arc::new(AtomicBool::new(true)),
            probe_delay_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a `SimBackend` sharing an external `FaultInjector`, typically
    /// one configured by the test harness so faults apply across every sim
    /// component in the run.
    #[must_use]
    pub fn with_fault_injector(
        id: BackendId,
        config: SimConfig,
        fault_injector: Arc<FaultInjector>,
    ) -> Self {
        let rng = DeterministicRng::new(config.seed());

        Self {
            id,
            state: Arc::new(RwLock::new(SimState::default())),
            fault_injector,
            rng: Arc::new(RwLock::new(rng)),
            reachable: Arc::new(AtomicBool::new(true)),
            probe_delay_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Add fault configuration.
    ///
    /// Note: only valid before the backend is shared; `FaultInjector`
    /// registration needs exclusive access to the Arc.
    #[must_use]
    pub fn with_faults(mut self, config: FaultConfig) -> Self {
        Arc::get_mut(&mut self.fault_injector)
            .expect("cannot add faults after backend is shared")
            .register(config);
        self
    }

    /// Flip reachability. Unreachable backends fail probes and every
    /// operation with a `Connection` error.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Delay health probes by the given milliseconds, to trip the monitor's
    /// per-backend timeout.
    pub fn set_probe_delay_ms(&self, delay_ms: u64) {
        self.probe_delay_ms.store(delay_ms, Ordering::SeqCst);
    }

    /// Seed stored recommendations for a user (test setup).
    pub fn seed_recommendations(&self, user_id: &str, recs: Vec<Recommendation>) {
        let mut state = self.state.write().unwrap();
        state.recommendations.insert(user_id.to_string(), recs);
    }

    /// Get fault injector for inspection.
    #[must_use]
    pub fn fault_injector(&self) -> &Arc<FaultInjector> {
        &self.fault_injector
    }

    /// Stored user count (for testing).
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.state.read().unwrap().users.len()
    }

    /// Stored listening event count across all users (for testing).
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.state
            .read()
            .unwrap()
            .history
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Check if a fault should be injected for an operation.
    fn maybe_inject_fault(&self, operation: &str) -> StoreResult<()> {
        if let Some(fault_type) = self.fault_injector.should_inject(operation) {
            Err(StoreError::simulated_fault(format!(
                "{fault_type:?} during {operation}"
            )))
        } else {
            Ok(())
        }
    }

    /// Fail with a `Connection` error when flipped unreachable.
    fn check_reachable(&self) -> StoreResult<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::connection(self.id, "connection refused"))
        }
    }
}

#[async_trait]
impl BackendAdapter for SimBackend {
    fn id(&self) -> BackendId {
        self.id
    }

    async fn connect(&self) -> StoreResult<()> {
        self.check_reachable()?;
        self.maybe_inject_fault("connect")?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(backend = %self.id))]
    async fn health_probe(&self) -> ProbeResult {
        let delay_ms = self.probe_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
        }

        if !self.reachable.load(Ordering::SeqCst) {
            return ProbeResult::unreachable("connection refused");
        }
        if let Some(fault_type) = self.fault_injector.should_inject("probe") {
            return ProbeResult::unreachable(format!("{fault_type:?}"));
        }

        let latency_ms = self.rng.write().unwrap().next_usize(1, 5) as u64;
        ProbeResult::connected(latency_ms)
    }

    #[tracing::instrument(skip(self, user), fields(backend = %self.id, user_id = %user.id))]
    async fn upsert_user(&self, user: &UserRecord) -> StoreResult<()> {
        self.check_reachable()?;
        self.maybe_inject_fault("upsert")?;

        // Preconditions
        assert!(!user.id.is_empty(), "user must have id");

        let mut state = self.state.write().unwrap();
        state.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    #[tracing::instrument(skip(self, events), fields(backend = %self.id, count = events.len()))]
    async fn append_listening_events(
        &self,
        user_id: &str,
        events: &[ListeningEvent],
    ) -> StoreResult<()> {
        self.check_reachable()?;
        // Fault checked before any mutation: the batch lands entirely or
        // not at all on this backend.
        self.maybe_inject_fault("append")?;

        let mut state = self.state.write().unwrap();
        state
            .history
            .entry(user_id.to_string())
            .or_default()
            .extend_from_slice(events);
        Ok(())
    }

    #[tracing::instrument(skip(self, query), fields(backend = %self.id))]
    async fn query_recommendations(
        &self,
        user_id: &str,
        query: &RecommendationQuery,
    ) -> StoreResult<Vec<Recommendation>> {
        self.check_reachable()?;
        self.maybe_inject_fault("recommend")?;

        let state = self.state.read().unwrap();
        let recs = state
            .recommendations
            .get(user_id)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| StoreError::not_found(format!("recommendations for {user_id}")))?;

        let mut results = recs.clone();
        // Best first, stable on track id for determinism
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.track_id.cmp(&b.track_id))
        });
        results.truncate(query.limit);

        Ok(results)
    }

    async fn query_analytics(
        &self,
        user_id: &str,
        range: &DateRange,
    ) -> StoreResult<BackendAnalytics> {
        self.check_reachable()?;
        self.maybe_inject_fault("analytics")?;

        let state = self.state.read().unwrap();
        let Some(events) = state.history.get(user_id) else {
            // Absent data is zero counts, not an error
            return Ok(BackendAnalytics::default());
        };

        let in_range: Vec<&ListeningEvent> =
            events.iter().filter(|e| range.contains(e.played_at)).collect();

        let unique_tracks = in_range
            .iter()
            .map(|e| e.track_id.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len() as u64;

        Ok(BackendAnalytics {
            total_plays: in_range.len() as u64,
            unique_tracks,
            last_played_at: in_range.iter().map(|e| e.played_at).max(),
        })
    }

    async fn collection_stats(&self) -> StoreResult<Vec<CollectionStats>> {
        self.check_reachable()?;
        self.maybe_inject_fault("stats")?;

        let state = self.state.read().unwrap();

        let users_size: usize = state
            .users
            .values()
            .filter_map(|u| serde_json::to_vec(u).ok())
            .map(|v| v.len())
            .sum();
        let history_count: usize = state.history.values().map(Vec::len).sum();
        let history_size: usize = state
            .history
            .values()
            .flatten()
            .filter_map(|e| serde_json::to_vec(e).ok())
            .map(|v| v.len())
            .sum();
        let recs_count: usize = state.recommendations.values().map(Vec::len).sum();
        let recs_size: usize = state
            .recommendations
            .values()
            .flatten()
            .filter_map(|r| serde_json::to_vec(r).ok())
            .map(|v| v.len())
            .sum();

        Ok(vec![
            CollectionStats {
                name: "users".to_string(),
                documents: state.users.len() as u64,
                size_bytes: users_size as u64,
            },
            CollectionStats {
                name: "listening_history".to_string(),
                documents: history_count as u64,
                size_bytes: history_size as u64,
            },
            CollectionStats {
                name: "recommendations".to_string(),
                documents: recs_count as u64,
                size_bytes: recs_size as u64,
            },
        ])
    }
}

// =============================================================================
// TESTS - Written FIRST (Simulation-First)
// =============================================================================


// =============================================================================
// DST Tests - Fault Injection
// =============================================================================
