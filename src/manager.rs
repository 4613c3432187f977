//! Database Manager - Orchestrates all three persistence backends.
//!
//! `TigerStyle`: Read-then-decide, fan-out writes, graceful degradation.
//!
//! # Design
//!
//! DatabaseManager composes the whole persistence layer:
//! - **HealthMonitor**: fresh connectivity snapshot before every operation
//! - **FailoverPolicy**: snapshot -> active backend set + operational state
//! - **WriteCoordinator**: parallel fan-out writes with per-backend results
//! - **ReadRouter**: sequential precedence-ordered reads
//! - **AnalyticsAggregator**: on-demand statistics from the primary store
//!
//! No health state is cached between operations: each call probes, decides,
//! then dispatches. Slower, but the decision is never stale.
//!
//! # Example
//!
//! ```rust,ignore
//! use tunestore::{DatabaseManager, UserRecord};
//!
//! let manager = DatabaseManager::sim(42);
//! manager.connect().await?;
//!
//! let outcome = manager.upsert_user(&UserRecord::new("u1")?).await?;
//! assert!(outcome.success);
//! ```

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::analytics::{AnalyticsAggregator, AnalyticsSnapshot};
use crate::backend::{
    validate_listening_batch, BackendAdapter, BackendAnalytics, BackendId, DateRange,
    ListeningEvent, Recommendation, RecommendationQuery, StoreError, StoreResult, UserRecord,
};
use crate::constants::BACKENDS_COUNT_MAX;
use crate::coordinator::WriteCoordinator;
use crate::dst::SimConfig;
use crate::failover::{FailoverDecision, FailoverPolicy, FailoverState};
use crate::health::{HealthMonitor, HealthRecord, HealthSnapshot};
use crate::outcome::{ReadOutcome, WriteOutcome};
use crate::router::ReadRouter;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for DatabaseManager.
#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    /// Per-backend health probe timeout; `None` uses the default
    pub probe_timeout: Option<std::time::Duration>,
    /// Fan-out write deadline; `None` uses the default
    pub write_deadline: Option<std::time::Duration>,
    /// Routed read deadline budget; `None` uses the default
    pub read_deadline: Option<std::time::Duration>,
}

impl ManagerConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the health probe timeout.
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.probe_timeout = Some(timeout);
        self
    }

    /// Set the write deadline.
    #[must_use]
    pub fn with_write_deadline(mut self, deadline: std::time::Duration) -> Self {
        self.write_deadline = Some(deadline);
        self
    }

    /// Set the read deadline.
    #[must_use]
    pub fn with_read_deadline(mut self, deadline: std::time::Duration) -> Self {
        self.read_deadline = Some(deadline);
        self
    }
}

// =============================================================================
// Status Reporting
// =============================================================================

/// Point-in-time operational summary for the status route.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerInfo {
    /// Current operational state
    pub state: FailoverState,

    /// Backends usable right now, precedence order
    pub active: Vec<BackendId>,

    /// Backends configured at build time, precedence order
    pub configured: Vec<BackendId>,

    /// Whether the process has ever relied on the embedded store
    pub fallback_mode: bool,

    /// Whether `connect` has completed
    pub initialized: bool,
}

// =============================================================================
// Builder
// =============================================================================

/// Builds a DatabaseManager from up to three backend adapters.
#[derive(Default)]
pub struct DatabaseManagerBuilder {
    adapters: Vec<Arc<dyn BackendAdapter>>,
    config: ManagerConfig,
}

impl DatabaseManagerBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend adapter. Each tier may appear at most once.
    #[must_use]
    pub fn with_backend(mut self, adapter: Arc<dyn BackendAdapter>) -> Self {
        assert!(
            !self.adapters.iter().any(|a| a.id() == adapter.id()),
            "backend {} registered twice",
            adapter.id()
        );
        self.adapters.push(adapter);
        self
    }

    /// Apply a configuration.
    #[must_use]
    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the manager.
    ///
    /// # Panics
    /// Panics if no backend was registered.
    #[must_use]
    pub fn build(mut self) -> DatabaseManager {
        assert!(!self.adapters.is_empty(), "at least one backend required");
        assert!(self.adapters.len() <= BACKENDS_COUNT_MAX);

        // Precedence order is fixed by tier, not registration order
        self.adapters.sort_by_key(|a| a.id());

        let monitor = self
            .config
            .probe_timeout
            .map_or_else(HealthMonitor::new, HealthMonitor::with_probe_timeout);
        let coordinator = self
            .config
            .write_deadline
            .map_or_else(WriteCoordinator::new, WriteCoordinator::with_deadline);
        let router = self
            .config
            .read_deadline
            .map_or_else(ReadRouter::new, ReadRouter::with_deadline);

        DatabaseManager {
            adapters: self.adapters,
            monitor,
            coordinator,
            router,
            aggregator: AnalyticsAggregator::new(),
            state: RwLock::new(ManagerState {
                policy: FailoverPolicy::new(),
                forced_fallback: false,
                initialized: false,
            }),
        }
    }
}

// =============================================================================
// DatabaseManager
// =============================================================================

struct ManagerState {
    policy: FailoverPolicy,
    forced_fallback: bool,
    initialized: bool,
}

/// Facade over the heterogeneous backend set.
///
/// Cheap to share behind an `Arc`; all interior state is behind an async
/// `RwLock` so route handlers can call it concurrently.
pub struct DatabaseManager {
    adapters: Vec<Arc<dyn BackendAdapter>>,
    monitor: HealthMonitor,
    coordinator: WriteCoordinator,
    router: ReadRouter,
    aggregator: AnalyticsAggregator,
    state: RwLock<ManagerState>,
}

impl DatabaseManager {
    /// Start building a manager.
    #[must_use]
    pub fn builder() -> DatabaseManagerBuilder {
        DatabaseManagerBuilder::new()
    }

    /// Fully simulated manager: three in-memory backends, deterministic
    /// from `seed`. The workhorse for tests.
    #[must_use]
    pub fn sim(seed: u64) -> Self {
        use crate::backend::SimBackend;

        Self::builder()
            .with_backend(Arc::new(SimBackend::new(
                BackendId::Primary,
                SimConfig::with_seed(seed),
            )))
            .with_backend(Arc::new(SimBackend::new(
                BackendId::Secondary,
                SimConfig::with_seed(seed.wrapping_add(1)),
            )))
            .with_backend(Arc::new(SimBackend::new(
                BackendId::Fallback,
                SimConfig::with_seed(seed.wrapping_add(2)),
            )))
            .build()
    }

    /// Backends configured at build time, precedence order.
    #[must_use]
    pub fn configured(&self) -> Vec<BackendId> {
        self.adapters.iter().map(|a| a.id()).collect()
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Connect every configured backend and take the first health snapshot.
    ///
    /// Per-backend connect failures are tolerated; the failover policy
    /// decides what remains usable. Succeeds as long as the manager itself
    /// initializes, even with every backend down.
    ///
    /// # Errors
    /// Currently infallible at this level; returns the initial decision.
    #[tracing::instrument(skip(self))]
    pub async fn connect(&self) -> StoreResult<FailoverDecision> {
        for adapter in &self.adapters {
            if let Err(e) = adapter.connect().await {
                tracing::warn!(backend = %adapter.id(), error = %e, "connect failed");
            }
        }

        let snapshot = self.monitor.check(&self.adapters).await;
        let mut state = self.state.write().await;
        state.initialized = true;
        let decision = state.policy.evaluate(&snapshot);

        tracing::info!(
            state = %decision.state,
            active = decision.active.len(),
            "manager initialized"
        );
        Ok(decision)
    }

    /// Force the embedded fallback store as the sole active backend and
    /// latch fallback mode. Used when managed backends are known-dead at
    /// startup.
    ///
    /// # Errors
    /// Returns `Validation` if no fallback backend is configured, or
    /// `Connection` if the fallback itself cannot connect.
    #[tracing::instrument(skip(self))]
    pub async fn init_fallback(&self) -> StoreResult<()> {
        let fallback = self
            .adapters
            .iter()
            .find(|a| a.id() == BackendId::Fallback)
            .ok_or_else(|| StoreError::validation("no fallback backend configured"))?;

        fallback.connect().await?;

        let mut state = self.state.write().await;
        state.forced_fallback = true;
        state.initialized = true;
        state.policy.latch_fallback();

        tracing::warn!("forced fallback mode; embedded store is the only active backend");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Health and Status
    // -------------------------------------------------------------------------

    /// Probe every configured backend and return the snapshot.
    ///
    /// Also feeds the failover policy so the latch tracks what probes see.
    pub async fn health_check(&self) -> HealthSnapshot {
        let snapshot = self.monitor.check(&self.adapters).await;
        let mut state = self.state.write().await;
        let _ = state.policy.evaluate(&snapshot);
        snapshot
    }

    /// Probe a single backend by name ("primary", "secondary", "fallback").
    ///
    /// # Errors
    /// Returns `Validation` before any I/O when the name is unknown or the
    /// tier is not configured.
    pub async fn probe(&self, backend: &str) -> StoreResult<HealthRecord> {
        let id = BackendId::parse(backend)
            .ok_or_else(|| StoreError::validation(format!("unknown backend: {backend}")))?;
        let adapter = self
            .adapters
            .iter()
            .find(|a| a.id() == id)
            .ok_or_else(|| StoreError::validation(format!("backend not configured: {id}")))?;

        Ok(self.monitor.probe_one(adapter).await)
    }

    /// Operational summary: state, active set, latch, initialization.
    pub async fn info(&self) -> ManagerInfo {
        let (decision, _) = self.decide().await;
        let state = self.state.read().await;

        ManagerInfo {
            state: decision.state,
            active: decision.active,
            configured: self.configured(),
            fallback_mode: decision.fallback_mode,
            initialized: state.initialized,
        }
    }

    /// Fresh snapshot -> decision -> active adapter list, in precedence
    /// order. Every operation calls this; nothing is cached.
    async fn decide(&self) -> (FailoverDecision, Vec<Arc<dyn BackendAdapter>>) {
        let snapshot = self.monitor.check(&self.adapters).await;
        let mut state = self.state.write().await;
        let mut decision = state.policy.evaluate(&snapshot);

        if state.forced_fallback {
            decision.active.retain(|&id| id == BackendId::Fallback);
            decision.state = if decision.active.is_empty() {
                FailoverState::Unavailable
            } else {
                FailoverState::Fallback
            };
        }
        drop(state);

        let active = decision
            .active
            .iter()
            .filter_map(|&id| self.adapters.iter().find(|a| a.id() == id))
            .cloned()
            .collect();

        (decision, active)
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Create or replace a user profile on every active backend.
    ///
    /// # Errors
    /// `Validation` for an oversized profile; `BackendsExhausted` when
    /// nothing is reachable. Per-backend failures are reported in the
    /// outcome, not as an `Err`.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn upsert_user(&self, user: &UserRecord) -> StoreResult<WriteOutcome> {
        user.validate_profile_size()?;
        let (_, active) = self.decide().await;

        self.coordinator
            .write(&active, |adapter| {
                let user = user.clone();
                async move { adapter.upsert_user(&user).await }
            })
            .await
    }

    /// Append a batch of listening events for one user to every active
    /// backend. The batch is validated before any I/O.
    ///
    /// # Errors
    /// `Validation` for an empty, oversized, or mixed-user batch;
    /// `BackendsExhausted` when nothing is reachable.
    #[tracing::instrument(skip(self, events), fields(user_id, count = events.len()))]
    pub async fn append_listening_history(
        &self,
        user_id: &str,
        events: &[ListeningEvent],
    ) -> StoreResult<WriteOutcome> {
        validate_listening_batch(user_id, events)?;
        let (_, active) = self.decide().await;

        self.coordinator
            .write(&active, |adapter| {
                let user_id = user_id.to_string();
                let events = events.to_vec();
                async move { adapter.append_listening_events(&user_id, &events).await }
            })
            .await
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Fetch recommendations for a user from the best backend that has any.
    ///
    /// # Errors
    /// `NotFound` when every backend holds nothing for this user.
    #[tracing::instrument(skip(self, query), fields(user_id))]
    pub async fn recommendations(
        &self,
        user_id: &str,
        query: &RecommendationQuery,
    ) -> StoreResult<ReadOutcome<Vec<Recommendation>>> {
        let (_, active) = self.decide().await;

        self.router
            .read(
                &active,
                &format!("recommendations for user {user_id}"),
                |adapter| {
                    let user_id = user_id.to_string();
                    let query = query.clone();
                    async move {
                        match adapter.query_recommendations(&user_id, &query).await {
                            Ok(recs) if recs.is_empty() => Ok(None),
                            Ok(recs) => Ok(Some(recs)),
                            Err(e) if e.is_not_found() => Ok(None),
                            Err(e) => Err(e),
                        }
                    }
                },
            )
            .await
    }

    /// Per-user listening analytics from the best backend with history.
    ///
    /// A backend with zero plays for the user counts as "holds nothing",
    /// so the walk continues.
    ///
    /// # Errors
    /// `NotFound` when no backend has any plays for this user in range.
    #[tracing::instrument(skip(self, range), fields(user_id))]
    pub async fn user_analytics(
        &self,
        user_id: &str,
        range: &DateRange,
    ) -> StoreResult<ReadOutcome<BackendAnalytics>> {
        let (_, active) = self.decide().await;

        self.router
            .read(
                &active,
                &format!("listening analytics for user {user_id}"),
                |adapter| {
                    let user_id = user_id.to_string();
                    let range = range.clone();
                    async move {
                        match adapter.query_analytics(&user_id, &range).await {
                            Ok(a) if a.total_plays == 0 => Ok(None),
                            Ok(a) => Ok(Some(a)),
                            Err(e) if e.is_not_found() => Ok(None),
                            Err(e) => Err(e),
                        }
                    }
                },
            )
            .await
    }

    /// Collection-level statistics synthesized from the primary store.
    ///
    /// Infallible: degrades to a zero snapshot when the primary is
    /// unavailable or the process is in forced fallback.
    #[tracing::instrument(skip(self))]
    pub async fn analytics_overview(&self) -> AnalyticsSnapshot {
        let forced = self.state.read().await.forced_fallback;
        let primary = if forced {
            None
        } else {
            self.adapters.iter().find(|a| a.id() == BackendId::Primary)
        };

        self.aggregator.snapshot(primary).await
    }
}

// =============================================================================
// Tests
// =============================================================================
