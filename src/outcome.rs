//! Operation Outcomes
//!
//! `TigerStyle`: Partial failure is data, not an exception.
//!
//! A fan-out write returns one `WriteResult` per attempted backend plus an
//! aggregate verdict. A routed read returns the data and the backend that
//! served it, so callers can report provenance.

use serde::Serialize;

use crate::backend::BackendId;

// =============================================================================
// Write Outcomes
// =============================================================================

/// Result of one backend's leg of a fan-out write.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WriteResult {
    /// Backend attempted
    pub backend: BackendId,

    /// Whether this backend's write succeeded
    pub success: bool,

    /// Failure detail, present iff not successful
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WriteResult {
    /// A successful leg.
    #[must_use]
    pub fn ok(backend: BackendId) -> Self {
        Self {
            backend,
            success: true,
            error: None,
        }
    }

    /// A failed leg.
    #[must_use]
    pub fn failed(backend: BackendId, error: impl Into<String>) -> Self {
        Self {
            backend,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Aggregate of a fan-out write.
///
/// Invariants, checked at construction:
/// - `success` is true iff at least one per-backend result succeeded
/// - `primary` is the first successful backend in precedence order,
///   and is present iff `success`
/// - `results` preserves precedence order regardless of completion order
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WriteOutcome {
    /// True iff >= 1 backend succeeded
    pub success: bool,

    /// First successful backend in precedence order; the caller's
    /// source of truth for confirmation messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<BackendId>,

    /// Per-backend results, precedence order
    pub results: Vec<WriteResult>,
}

impl WriteOutcome {
    /// Aggregate per-backend results. `results` must already be in
    /// precedence order.
    #[must_use]
    pub fn from_results(results: Vec<WriteResult>) -> Self {
        let primary = results.iter().find(|r| r.success).map(|r| r.backend);

        let outcome = Self {
            success: primary.is_some(),
            primary,
            results,
        };

        // Postconditions
        debug_assert_eq!(
            outcome.success,
            outcome.results.iter().any(|r| r.success),
            "success must track per-backend results"
        );
        debug_assert_eq!(
            outcome.success,
            outcome.primary.is_some(),
            "primary must be present iff success"
        );

        outcome
    }

    /// Backends that failed their leg.
    #[must_use]
    pub fn failed_backends(&self) -> Vec<BackendId> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.backend)
            .collect()
    }
}

// =============================================================================
// Read Outcomes
// =============================================================================

/// A successful routed read with provenance.
///
/// `success` is always true here: an unsatisfiable read surfaces as
/// `StoreError::NotFound` instead, which the route layer maps to 404.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReadOutcome<T> {
    /// Always true; serialized for route-layer JSON shaping
    pub success: bool,

    /// Backend that served the read
    pub source: BackendId,

    /// The data
    pub data: T,
}

impl<T> ReadOutcome<T> {
    /// Create a read outcome.
    #[must_use]
    pub fn new(source: BackendId, data: T) -> Self {
        Self {
            success: true,
            source,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_outcome_all_ok() {
        let outcome = WriteOutcome::from_results(vec![
            WriteResult::ok(BackendId::Primary),
            WriteResult::ok(BackendId::Secondary),
        ]);

        assert!(outcome.success);
        assert_eq!(outcome.primary, Some(BackendId::Primary));
        assert!(outcome.failed_backends().is_empty());
    }

    #[test]
    fn test_write_outcome_partial_failure_still_succeeds() {
        let outcome = WriteOutcome::from_results(vec![
            WriteResult::failed(BackendId::Primary, "connection refused"),
            WriteResult::ok(BackendId::Secondary),
        ]);

        assert!(outcome.success);
        // Primary is the first SUCCESSFUL backend, not the first attempted
        assert_eq!(outcome.primary, Some(BackendId::Secondary));
        assert_eq!(outcome.failed_backends(), vec![BackendId::Primary]);
    }

    #[test]
    fn test_write_outcome_total_failure() {
        let outcome = WriteOutcome::from_results(vec![
            WriteResult::failed(BackendId::Primary, "down"),
            WriteResult::failed(BackendId::Secondary, "down"),
        ]);

        assert!(!outcome.success);
        assert!(outcome.primary.is_none());
        assert_eq!(outcome.failed_backends().len(), 2);
    }

    #[test]
    fn test_write_outcome_serialization() {
        let outcome = WriteOutcome::from_results(vec![
            WriteResult::ok(BackendId::Primary),
            WriteResult::failed(BackendId::Secondary, "down"),
        ]);

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["primary"], "primary");
        assert_eq!(json["results"][0]["backend"], "primary");
        assert_eq!(json["results"][1]["error"], "down");
        // Successful legs omit the error field entirely
        assert!(json["results"][0].get("error").is_none());
    }

    #[test]
    fn test_read_outcome() {
        let outcome = ReadOutcome::new(BackendId::Secondary, vec![1, 2, 3]);

        assert!(outcome.success);
        assert_eq!(outcome.source, BackendId::Secondary);

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["source"], "secondary");
        assert_eq!(json["data"][2], 3);
    }
}
