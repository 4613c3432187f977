//! Backend Adapters - Closed Three-Variant Store Set
//!
//! `TigerStyle`: Abstract interface for heterogeneous stores.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    BackendAdapter Trait                      │
//! └─────────────────────────────────────────────────────────────┘
//!      ↑               ↑                ↑               ↑
//!      │               │                │               │
//! ┌────┴─────┐  ┌──────┴───────┐  ┌─────┴───────┐  ┌────┴─────┐
//! │SimBackend│  │ MongoBackend │  │ PgBackend   │  │ Sqlite   │
//! │(testing) │  │  (primary)   │  │ (secondary) │  │(fallback)│
//! └──────────┘  └──────────────┘  └─────────────┘  └──────────┘
//! ```
//!
//! The variant set is closed: exactly three production roles exist
//! (primary document store, managed relational store, embedded fallback),
//! each with a fixed identity and a fixed precedence. There is no plugin
//! discovery.
//!
//! # Simulation-First
//!
//! Tests are written against `SimBackend` before any production adapter.
//! All implementations must satisfy the same trait contract.

mod error;
mod record;
mod sim;

#[cfg(feature = "mongo")]
mod mongo;

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use error::{StoreError, StoreResult};
pub use record::{
    validate_listening_batch, BackendAnalytics, CollectionStats, DateRange, ListeningEvent,
    Recommendation, RecommendationQuery, UserRecord,
};
pub use sim::SimBackend;

#[cfg(feature = "mongo")]
pub use mongo::MongoBackend;

#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// Backend Identity
// =============================================================================

/// Identity of a backend in the closed adapter set.
///
/// Immutable, assigned at adapter construction. Declaration order is
/// precedence order: primary > secondary > fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    /// Primary document store
    Primary,
    /// Managed relational store
    Secondary,
    /// Embedded local fallback store
    Fallback,
}

impl BackendId {
    /// All identities in precedence order.
    #[must_use]
    pub fn all() -> [BackendId; 3] {
        [Self::Primary, Self::Secondary, Self::Fallback]
    }

    /// Stable string form, as reported to callers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Fallback => "fallback",
        }
    }

    /// Parse from the string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "primary" => Some(Self::Primary),
            "secondary" => Some(Self::Secondary),
            "fallback" => Some(Self::Fallback),
            _ => None,
        }
    }
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Probe Result
// =============================================================================

/// Outcome of a lightweight health probe.
///
/// Probes must not error: any failure is data, captured here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeResult {
    /// Whether the round-trip succeeded
    pub connected: bool,

    /// Round-trip latency, present iff connected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,

    /// Failure detail, present iff not connected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    /// A successful probe.
    #[must_use]
    pub fn connected(latency_ms: u64) -> Self {
        Self {
            connected: true,
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    /// A failed probe.
    #[must_use]
    pub fn unreachable(error: impl Into<String>) -> Self {
        Self {
            connected: false,
            latency_ms: None,
            error: Some(error.into()),
        }
    }
}

// =============================================================================
// BackendAdapter Trait
// =============================================================================

/// Uniform CRUD + health-probe surface over one concrete data store.
///
/// `TigerStyle`: All operations are async, return explicit errors.
///
/// Side effects are backend-local; there are no cross-backend transactions.
/// The orchestrator composes adapters, it never reaches into their
/// connection state.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// This adapter's identity. Fixed for the adapter's lifetime.
    fn id(&self) -> BackendId;

    /// Establish connectivity. Idempotent: safe to call when connected.
    ///
    /// # Errors
    /// Returns `Connection` carrying this backend's identity and the
    /// transport detail.
    async fn connect(&self) -> StoreResult<()>;

    /// Lightweight reachability round-trip (ping / version query).
    ///
    /// Never errors: failures come back as `ProbeResult::unreachable`.
    async fn health_probe(&self) -> ProbeResult;

    /// Insert-or-update a user by ID. Single-document semantics: the write
    /// is applied entirely or not at all on this backend.
    ///
    /// # Errors
    /// Returns `Connection` or `Query` on failure.
    async fn upsert_user(&self, user: &UserRecord) -> StoreResult<()>;

    /// Append-only batch insert of listening events. Partial-batch failure
    /// is reported as overall failure for this backend; no silent partial
    /// commit is visible to the caller.
    ///
    /// # Errors
    /// Returns `Connection` or `Query` on failure.
    async fn append_listening_events(
        &self,
        user_id: &str,
        events: &[ListeningEvent],
    ) -> StoreResult<()>;

    /// Read stored recommendations for a user.
    ///
    /// # Errors
    /// Returns `NotFound` when this backend holds no recommendations for
    /// the user.
    async fn query_recommendations(
        &self,
        user_id: &str,
        query: &RecommendationQuery,
    ) -> StoreResult<Vec<Recommendation>>;

    /// Backend-local listening aggregate. Absent data is success with zero
    /// counts, not an error.
    ///
    /// # Errors
    /// Returns `Connection` or `Query` on failure.
    async fn query_analytics(
        &self,
        user_id: &str,
        range: &DateRange,
    ) -> StoreResult<BackendAnalytics>;

    /// Enumerate storage units with counts and size estimates.
    ///
    /// Individual enumeration failures are logged and skipped, not fatal
    /// to the overall call.
    ///
    /// # Errors
    /// Returns `Connection` when the backend is unreachable outright.
    async fn collection_stats(&self) -> StoreResult<Vec<CollectionStats>>;
}
