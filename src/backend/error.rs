//! Store Errors
//!
//! `TigerStyle`: Explicit error types with context.
//!
//! Propagation policy: transport errors never escape an adapter as panics.
//! They surface as `StoreError` values that the orchestrator folds into
//! `HealthRecord` and `WriteResult` entries. `BackendsExhausted` is the only
//! variant the route layer treats as a hard failure.

use thiserror::Error;

use super::BackendId;

/// Errors from store operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Transport-level failure, scoped to one backend
    #[error("connection error on {backend}: {message}")]
    Connection {
        /// Backend that failed to connect
        backend: BackendId,
        /// Transport detail
        message: String,
    },

    /// A read yielded nothing; not a failure of the backend itself
    #[error("not found: {what}")]
    NotFound {
        /// What was looked up
        what: String,
    },

    /// Caller-supplied payload malformed; surfaced before any I/O
    #[error("validation error: {message}")]
    Validation {
        /// Validation failure detail
        message: String,
    },

    /// No backend in the active set; fatal for the call, not the process
    #[error("no backends available")]
    BackendsExhausted,

    /// Operation exceeded its deadline
    #[error("timeout after {duration_ms}ms")]
    Timeout {
        /// Elapsed milliseconds
        duration_ms: u64,
    },

    /// Query error
    #[error("query error: {message}")]
    Query {
        /// Query failure detail
        message: String,
    },

    /// Simulated fault (for DST)
    #[error("simulated fault: {fault_type}")]
    SimulatedFault {
        /// Type of simulated fault
        fault_type: String,
    },

    /// Internal error
    #[error("internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl StoreError {
    /// Create a connection error.
    #[must_use]
    pub fn connection(backend: BackendId, message: impl Into<String>) -> Self {
        Self::Connection {
            backend,
            message: message.into(),
        }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    #[must_use]
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a query error.
    #[must_use]
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create a simulated fault error.
    #[must_use]
    pub fn simulated_fault(fault_type: impl Into<String>) -> Self {
        Self::SimulatedFault {
            fault_type: fault_type.into(),
        }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this is a transient error (can be retried).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Timeout { .. } | Self::SimulatedFault { .. }
        )
    }

    /// Check if this error means "nothing stored", as opposed to a backend
    /// failure. The read router uses this to keep trying later backends.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
