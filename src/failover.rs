//! Failover Policy
//!
//! `TigerStyle`: Explicit state machine over backend availability.
//!
//! # States
//!
//! ```text
//! nominal ──primary lost──▶ degraded ──secondary lost──▶ fallback
//!    ▲                         │                            │
//!    └──primary back───────────┘              everything lost
//!                                                           ▼
//!                                                      unavailable
//! ```
//!
//! The state is recomputed from scratch on every health snapshot using the
//! fixed precedence primary > secondary > fallback. The active backend set
//! is the ordered list of ALL reachable backends, not just the best one:
//! in `degraded`, writes still fan out to every reachable backend to
//! maximize durability.
//!
//! Entering `fallback` latches the fallback-mode flag for the process
//! lifetime. Re-attaching a managed backend is an explicit operator action
//! (a fresh manager), never automatic recovery.

use serde::{Deserialize, Serialize};

use crate::backend::BackendId;
use crate::health::HealthSnapshot;

// =============================================================================
// State
// =============================================================================

/// Operational state derived from the best reachable backend tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailoverState {
    /// Primary reachable
    Nominal,
    /// Primary unreachable, secondary reachable
    Degraded,
    /// Only the embedded store reachable
    Fallback,
    /// Nothing reachable; fatal for the operation in flight, not the process
    Unavailable,
}

impl FailoverState {
    /// Stable string form for status reporting.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nominal => "nominal",
            Self::Degraded => "degraded",
            Self::Fallback => "fallback",
            Self::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Display for FailoverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The policy's verdict for one health snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailoverDecision {
    /// Current operational state
    pub state: FailoverState,

    /// Backends usable for the next operation, precedence order.
    /// Empty iff state is `Unavailable`.
    pub active: Vec<BackendId>,

    /// Whether the process has ever had to rely on the embedded store
    pub fallback_mode: bool,
}

// =============================================================================
// FailoverPolicy
// =============================================================================

/// Decides the active backend set from health snapshots and owns the
/// fallback-mode latch.
#[derive(Debug, Clone, Default)]
pub struct FailoverPolicy {
    fallback_latched: bool,
}

impl FailoverPolicy {
    /// Create a policy with the latch unarmed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether fallback mode has ever been entered.
    #[must_use]
    pub fn fallback_mode(&self) -> bool {
        self.fallback_latched
    }

    /// Arm the latch directly. Used by explicit fallback initialization.
    pub fn latch_fallback(&mut self) {
        self.fallback_latched = true;
    }

    /// Recompute state and active set from a fresh health snapshot.
    ///
    /// Precedence rule: the state is named after the best reachable tier;
    /// the active set contains every reachable backend in precedence order.
    pub fn evaluate(&mut self, snapshot: &HealthSnapshot) -> FailoverDecision {
        let active = snapshot.reachable();

        let state = match active.first() {
            Some(BackendId::Primary) => FailoverState::Nominal,
            Some(BackendId::Secondary) => FailoverState::Degraded,
            Some(BackendId::Fallback) => FailoverState::Fallback,
            None => FailoverState::Unavailable,
        };

        if state == FailoverState::Fallback && !self.fallback_latched {
            tracing::warn!("entering fallback mode; latch set for process lifetime");
            self.fallback_latched = true;
        }

        FailoverDecision {
            state,
            active,
            fallback_mode: self.fallback_latched,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
