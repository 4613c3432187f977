//! Write Coordinator
//!
//! `TigerStyle`: Fan out to everything, await everything, report everything.
//!
//! A logical write goes to every backend in the active set in parallel with
//! no early cancellation: all backends are always attempted so the result
//! array is complete. The per-call deadline bounds total latency; a backend
//! that has not reported by then is recorded as
//! `{success: false, error: "deadline exceeded"}` and its call abandoned.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{BackendAdapter, StoreError, StoreResult};
use crate::constants::{OP_DEADLINE_MS_MAX, WRITE_DEADLINE_MS_DEFAULT};
use crate::outcome::{WriteOutcome, WriteResult};

/// Fans a logical write out to the active backend set.
#[derive(Debug, Clone)]
pub struct WriteCoordinator {
    deadline: Duration,
}

impl WriteCoordinator {
    /// Create a coordinator with the default write deadline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            deadline: Duration::from_millis(WRITE_DEADLINE_MS_DEFAULT),
        }
    }

    /// Create a coordinator with an explicit deadline.
    ///
    /// # Panics
    /// Panics if the deadline is zero or exceeds the maximum.
    #[must_use]
    pub fn with_deadline(deadline: Duration) -> Self {
        let ms = deadline.as_millis() as u64;
        assert!(
            ms > 0 && ms <= OP_DEADLINE_MS_MAX,
            "write deadline must be 1-{OP_DEADLINE_MS_MAX}ms: got {ms}"
        );
        Self { deadline }
    }

    /// The configured deadline.
    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Fan `op` out to every adapter, in parallel, and aggregate.
    ///
    /// `adapters` must be in precedence order; results come back in the
    /// same order regardless of completion order.
    ///
    /// # Errors
    /// Returns `BackendsExhausted` without attempting any I/O when the
    /// active set is empty. Per-backend failures are data in the outcome,
    /// never an `Err`.
    #[tracing::instrument(skip(self, adapters, op), fields(backends = adapters.len()))]
    pub async fn write<F, Fut>(
        &self,
        adapters: &[Arc<dyn BackendAdapter>],
        op: F,
    ) -> StoreResult<WriteOutcome>
    where
        F: Fn(Arc<dyn BackendAdapter>) -> Fut,
        Fut: Future<Output = StoreResult<()>>,
    {
        if adapters.is_empty() {
            return Err(StoreError::BackendsExhausted);
        }

        let deadline = self.deadline;
        let legs = adapters.iter().map(|adapter| {
            let backend = adapter.id();
            let fut = op(Arc::clone(adapter));
            async move {
                match tokio::time::timeout(deadline, fut).await {
                    Ok(Ok(())) => WriteResult::ok(backend),
                    Ok(Err(e)) => {
                        tracing::warn!(%backend, error = %e, "write leg failed");
                        WriteResult::failed(backend, e.to_string())
                    }
                    Err(_) => {
                        tracing::warn!(%backend, deadline_ms = deadline.as_millis() as u64, "write leg abandoned");
                        WriteResult::failed(backend, "deadline exceeded")
                    }
                }
            }
        });

        // join_all preserves input order, giving deterministic
        // results[0] == highest-precedence backend
        let results = futures::future::join_all(legs).await;
        let outcome = WriteOutcome::from_results(results);

        if !outcome.success {
            tracing::warn!("write failed on every backend");
        }

        Ok(outcome)
    }
}

impl Default for WriteCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
