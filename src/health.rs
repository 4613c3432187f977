//! Health Monitor
//!
//! `TigerStyle`: Probe everything concurrently, record everything as data.
//!
//! The monitor produces an up-to-date `HealthRecord` per backend on demand.
//! Probes run concurrently with an independent per-backend timeout, so one
//! slow backend cannot stall detection of the others. A timed-out probe is
//! recorded as `{connected: false, last_error: "timeout"}`.
//!
//! No retries live here; retrying is the caller's concern. Probing never
//! mutates the active backend set; it only produces the snapshot that
//! `FailoverPolicy` consumes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::{BackendAdapter, BackendId};
use crate::constants::{HEALTH_PROBE_TIMEOUT_MS_DEFAULT, HEALTH_PROBE_TIMEOUT_MS_MAX};

// =============================================================================
// Health Records
// =============================================================================

/// Connectivity snapshot for one backend.
///
/// Mutated only by the monitor; read by `FailoverPolicy` and exposed
/// verbatim to callers via the status query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthRecord {
    /// Which backend this record describes
    pub backend: BackendId,

    /// Whether the last probe round-trip succeeded
    pub connected: bool,

    /// Probe latency, present iff connected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,

    /// When the probe completed
    pub last_checked_at: DateTime<Utc>,

    /// Failure detail from the last probe, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Aggregate health across the configured backend set.
///
/// `healthy` is true iff at least one backend is connected. The map is
/// ordered by backend precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// True iff >= 1 backend connected
    pub healthy: bool,

    /// Per-backend records, precedence order
    pub connections: BTreeMap<BackendId, HealthRecord>,

    /// When the snapshot was assembled
    pub checked_at: DateTime<Utc>,
}

impl HealthSnapshot {
    /// Backends currently reachable, in precedence order.
    #[must_use]
    pub fn reachable(&self) -> Vec<BackendId> {
        self.connections
            .values()
            .filter(|r| r.connected)
            .map(|r| r.backend)
            .collect()
    }

    /// Check one backend's reachability.
    #[must_use]
    pub fn is_connected(&self, backend: BackendId) -> bool {
        self.connections
            .get(&backend)
            .is_some_and(|r| r.connected)
    }
}

// =============================================================================
// HealthMonitor
// =============================================================================

/// Probes every configured adapter and assembles the health snapshot.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    probe_timeout: Duration,
}

impl HealthMonitor {
    /// Create a monitor with the default probe timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            probe_timeout: Duration::from_millis(HEALTH_PROBE_TIMEOUT_MS_DEFAULT),
        }
    }

    /// Create a monitor with an explicit probe timeout.
    ///
    /// # Panics
    /// Panics if the timeout is zero or exceeds the maximum.
    #[must_use]
    pub fn with_probe_timeout(timeout: Duration) -> Self {
        let ms = timeout.as_millis() as u64;
        assert!(
            ms > 0 && ms <= HEALTH_PROBE_TIMEOUT_MS_MAX,
            "probe timeout must be 1-{HEALTH_PROBE_TIMEOUT_MS_MAX}ms: got {ms}"
        );
        Self {
            probe_timeout: timeout,
        }
    }

    /// The configured per-backend probe timeout.
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Probe all adapters concurrently and assemble a snapshot.
    #[tracing::instrument(skip(self, adapters), fields(count = adapters.len()))]
    pub async fn check(&self, adapters: &[Arc<dyn BackendAdapter>]) -> HealthSnapshot {
        let probes = adapters.iter().map(|adapter| self.probe_one(adapter));
        let records = futures::future::join_all(probes).await;

        let connections: BTreeMap<BackendId, HealthRecord> =
            records.into_iter().map(|r| (r.backend, r)).collect();
        let healthy = connections.values().any(|r| r.connected);

        if !healthy {
            tracing::warn!("no backend reachable");
        }

        HealthSnapshot {
            healthy,
            connections,
            checked_at: Utc::now(),
        }
    }

    /// Probe a single adapter, bounding the probe with this monitor's
    /// timeout.
    pub async fn probe_one(&self, adapter: &Arc<dyn BackendAdapter>) -> HealthRecord {
        let backend = adapter.id();
        let started = Instant::now();

        match tokio::time::timeout(self.probe_timeout, adapter.health_probe()).await {
            Ok(probe) => {
                let latency_ms = probe
                    .latency_ms
                    .unwrap_or_else(|| started.elapsed().as_millis() as u64);

                tracing::debug!(
                    %backend,
                    connected = probe.connected,
                    latency_ms,
                    "probe complete"
                );

                HealthRecord {
                    backend,
                    connected: probe.connected,
                    latency_ms: probe.connected.then_some(latency_ms),
                    last_checked_at: Utc::now(),
                    last_error: probe.error,
                }
            }
            Err(_) => {
                tracing::warn!(%backend, timeout_ms = self.probe_timeout.as_millis() as u64, "probe timed out");

                HealthRecord {
                    backend,
                    connected: false,
                    latency_ms: None,
                    last_checked_at: Utc::now(),
                    last_error: Some("timeout".to_string()),
                }
            }
        }
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimBackend;
    use crate::dst::SimConfig;

    fn adapters(seed: u64) -> (Vec<Arc<dyn BackendAdapter>>, SimBackend, SimBackend) {
        let primary = SimBackend::new(BackendId::Primary, SimConfig::with_seed(seed));
        let secondary = SimBackend::new(BackendId::Secondary, SimConfig::with_seed(seed + 1));
        let list: Vec<Arc<dyn BackendAdapter>> =
            vec![Arc::new(primary.clone()), Arc::new(secondary.clone())];
        (list, primary, secondary)
    }

    #[tokio::test]
    async fn test_all_healthy() {
        let (list, _, _) = adapters(42);
        let snapshot = HealthMonitor::new().check(&list).await;

        assert!(snapshot.healthy);
        assert_eq!(snapshot.connections.len(), 2);
        assert!(snapshot.is_connected(BackendId::Primary));
        assert!(snapshot.is_connected(BackendId::Secondary));
        assert_eq!(
            snapshot.reachable(),
            vec![BackendId::Primary, BackendId::Secondary]
        );
    }

    #[tokio::test]
    async fn test_healthy_iff_any_connected() {
        let (list, primary, _) = adapters(42);
        primary.set_reachable(false);

        let snapshot = HealthMonitor::new().check(&list).await;

        assert!(snapshot.healthy, "one live backend keeps the system healthy");
        assert!(!snapshot.is_connected(BackendId::Primary));
        assert_eq!(snapshot.reachable(), vec![BackendId::Secondary]);
    }

    #[tokio::test]
    async fn test_unhealthy_when_all_down() {
        let (list, primary, secondary) = adapters(42);
        primary.set_reachable(false);
        secondary.set_reachable(false);

        let snapshot = HealthMonitor::new().check(&list).await;

        assert!(!snapshot.healthy);
        assert!(snapshot.reachable().is_empty());
    }

    #[tokio::test]
    async fn test_probe_timeout_recorded_as_data() {
        let (list, primary, _) = adapters(42);
        primary.set_probe_delay_ms(5_000);

        let monitor = HealthMonitor::with_probe_timeout(Duration::from_millis(50));
        let snapshot = monitor.check(&list).await;

        let record = &snapshot.connections[&BackendId::Primary];
        assert!(!record.connected);
        assert_eq!(record.last_error.as_deref(), Some("timeout"));

        // The slow primary did not stall the secondary's probe
        assert!(snapshot.is_connected(BackendId::Secondary));
        assert!(snapshot.healthy);
    }

    #[tokio::test]
    async fn test_failure_detail_captured() {
        let (list, primary, _) = adapters(42);
        primary.set_reachable(false);

        let snapshot = HealthMonitor::new().check(&list).await;
        let record = &snapshot.connections[&BackendId::Primary];

        assert_eq!(record.last_error.as_deref(), Some("connection refused"));
        assert!(record.latency_ms.is_none());
    }

    #[test]
    #[should_panic(expected = "probe timeout must be")]
    fn test_zero_timeout_rejected() {
        let _ = HealthMonitor::with_probe_timeout(Duration::ZERO);
    }

    #[test]
    fn test_snapshot_serializes_with_string_keys() {
        // BTreeMap<BackendId, _> must serialize as an object keyed by
        // backend name for the status route.
        let record = HealthRecord {
            backend: BackendId::Primary,
            connected: true,
            latency_ms: Some(3),
            last_checked_at: Utc::now(),
            last_error: None,
        };
        let snapshot = HealthSnapshot {
            healthy: true,
            connections: BTreeMap::from([(BackendId::Primary, record)]),
            checked_at: Utc::now(),
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["connections"]["primary"]["connected"].as_bool().unwrap());
    }
}
