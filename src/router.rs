//! Read Router
//!
//! `TigerStyle`: One backend at a time, best first, degrade gracefully.
//!
//! Reads never fan out: backends are tried sequentially in precedence order
//! and the first non-empty success wins (cost control). An earlier backend's
//! error never masks a later backend's answer. If every backend comes back
//! empty, the verdict is `NotFound`, not the earlier error. The whole walk
//! shares one deadline budget.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::backend::{BackendAdapter, StoreError, StoreResult};
use crate::constants::{OP_DEADLINE_MS_MAX, READ_DEADLINE_MS_DEFAULT};
use crate::outcome::ReadOutcome;

/// Routes a read to the best available backend.
#[derive(Debug, Clone)]
pub struct ReadRouter {
    deadline: Duration,
}

impl ReadRouter {
    /// Create a router with the default read deadline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            deadline: Duration::from_millis(READ_DEADLINE_MS_DEFAULT),
        }
    }

    /// Create a router with an explicit deadline.
    ///
    /// # Panics
    /// Panics if the deadline is zero or exceeds the maximum.
    #[must_use]
    pub fn with_deadline(deadline: Duration) -> Self {
        let ms = deadline.as_millis() as u64;
        assert!(
            ms > 0 && ms <= OP_DEADLINE_MS_MAX,
            "read deadline must be 1-{OP_DEADLINE_MS_MAX}ms: got {ms}"
        );
        Self { deadline }
    }

    /// The configured deadline.
    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Try `op` against each adapter in order until one returns data.
    ///
    /// `op` returns `Ok(None)` for "this backend holds nothing", which is
    /// treated like the adapter's own `NotFound`. `what` names the thing
    /// being read, for the final `NotFound` message.
    ///
    /// # Errors
    /// - `BackendsExhausted` when the active set is empty
    /// - `NotFound` when at least one backend answered "nothing stored"
    ///   and none produced data
    /// - otherwise, the last backend error seen (including `Timeout` when
    ///   the deadline budget ran out)
    #[tracing::instrument(skip(self, adapters, op), fields(backends = adapters.len(), what))]
    pub async fn read<T, F, Fut>(
        &self,
        adapters: &[Arc<dyn BackendAdapter>],
        what: &str,
        op: F,
    ) -> StoreResult<ReadOutcome<T>>
    where
        F: Fn(Arc<dyn BackendAdapter>) -> Fut,
        Fut: Future<Output = StoreResult<Option<T>>>,
    {
        if adapters.is_empty() {
            return Err(StoreError::BackendsExhausted);
        }

        let started = Instant::now();
        let mut saw_empty = false;
        let mut last_error: Option<StoreError> = None;

        for adapter in adapters {
            let backend = adapter.id();

            let Some(remaining) = self.deadline.checked_sub(started.elapsed()) else {
                last_error = Some(StoreError::timeout(self.deadline.as_millis() as u64));
                break;
            };

            match tokio::time::timeout(remaining, op(Arc::clone(adapter))).await {
                Ok(Ok(Some(data))) => {
                    tracing::debug!(%backend, "read served");
                    return Ok(ReadOutcome::new(backend, data));
                }
                Ok(Ok(None)) => {
                    saw_empty = true;
                }
                Ok(Err(e)) if e.is_not_found() => {
                    saw_empty = true;
                }
                Ok(Err(e)) => {
                    // Keep walking: a later backend may still answer
                    tracing::warn!(%backend, error = %e, "read leg failed, trying next");
                    last_error = Some(e);
                }
                Err(_) => {
                    tracing::warn!(%backend, "read leg exceeded deadline budget");
                    last_error = Some(StoreError::timeout(self.deadline.as_millis() as u64));
                }
            }
        }

        if saw_empty {
            Err(StoreError::not_found(what))
        } else {
            Err(last_error.unwrap_or(StoreError::BackendsExhausted))
        }
    }
}

impl Default for ReadRouter {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
