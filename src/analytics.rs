//! Analytics Aggregator
//!
//! `TigerStyle`: Degrade to zeros, never throw at the caller.
//!
//! The snapshot is synthesized on demand from the primary document store's
//! `collection_stats()`. When the primary is unavailable the caller still
//! gets a well-formed, zero-valued snapshot tagged `source: "fallback"`
//! with an explanatory error string. Sizes render on a binary (1024) scale
//! with two decimal places.

use std::sync::Arc;

use serde::Serialize;

use crate::backend::{BackendAdapter, CollectionStats};
use crate::constants::{ANALYTICS_SIZE_DECIMALS_COUNT, ANALYTICS_SIZE_UNIT_BYTES};

// =============================================================================
// AnalyticsSnapshot
// =============================================================================

/// Cross-collection statistics, computed on demand and never persisted.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnalyticsSnapshot {
    /// Number of storage units enumerated
    pub collections_count: u64,

    /// Documents across all collections
    pub total_documents: u64,

    /// Documents in the users collection
    pub users_count: u64,

    /// Documents in the listening history collection
    pub listening_history_count: u64,

    /// Documents in the recommendations collection
    pub recommendations_count: u64,

    /// Total size, human readable ("1.21 MB")
    pub size_human_readable: String,

    /// Which backend produced the numbers ("primary" or "fallback")
    pub source: &'static str,

    /// Why the snapshot is zero-valued, when it is
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalyticsSnapshot {
    /// The degraded snapshot: all zeros, tagged with the failure reason.
    #[must_use]
    pub fn zero(error: impl Into<String>) -> Self {
        let error = error.into();
        debug_assert!(!error.is_empty(), "degraded snapshot needs a reason");

        Self {
            collections_count: 0,
            total_documents: 0,
            users_count: 0,
            listening_history_count: 0,
            recommendations_count: 0,
            size_human_readable: format_size(0),
            source: "fallback",
            error: Some(error),
        }
    }

    fn from_stats(stats: &[CollectionStats]) -> Self {
        let count_of = |name: &str| {
            stats
                .iter()
                .find(|s| s.name == name)
                .map_or(0, |s| s.documents)
        };
        let total_size: u64 = stats.iter().map(|s| s.size_bytes).sum();

        Self {
            collections_count: stats.len() as u64,
            total_documents: stats.iter().map(|s| s.documents).sum(),
            users_count: count_of("users"),
            listening_history_count: count_of("listening_history"),
            recommendations_count: count_of("recommendations"),
            size_human_readable: format_size(total_size),
            source: "primary",
            error: None,
        }
    }
}

// =============================================================================
// AnalyticsAggregator
// =============================================================================

/// Synthesizes the analytics snapshot from the primary document store.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsAggregator;

impl AnalyticsAggregator {
    /// Create an aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Compute a snapshot from the primary backend, or degrade to zeros.
    ///
    /// Infallible by design: route layers serve whatever comes back.
    #[tracing::instrument(skip(self, primary))]
    pub async fn snapshot(&self, primary: Option<&Arc<dyn BackendAdapter>>) -> AnalyticsSnapshot {
        let Some(primary) = primary else {
            return AnalyticsSnapshot::zero("primary backend not available");
        };

        match primary.collection_stats().await {
            Ok(stats) => AnalyticsSnapshot::from_stats(&stats),
            Err(e) => {
                tracing::warn!(error = %e, "collection stats failed, serving zero snapshot");
                AnalyticsSnapshot::zero(format!("collection stats failed: {e}"))
            }
        }
    }
}

// =============================================================================
// Size Formatting
// =============================================================================

/// Render a byte count on a binary scale with two decimals.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let base = ANALYTICS_SIZE_UNIT_BYTES as f64;
    let exponent = ((bytes as f64).ln() / base.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / base.powi(exponent as i32);

    format!(
        "{value:.prec$} {}",
        UNITS[exponent],
        prec = ANALYTICS_SIZE_DECIMALS_COUNT
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendId, ListeningEvent, SimBackend, UserRecord};
    use crate::dst::{FaultConfig, FaultType, SimConfig};

    #[test]
    fn test_format_size_scale() {
        assert_eq!(format_size(0), "0 Bytes");
        assert_eq!(format_size(512), "512.00 Bytes");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1024 * 1024), "1.00 MB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.00 GB");
        assert_eq!(format_size(1024 * 1024 * 1024 * 1024), "1.00 TB");
    }

    #[test]
    fn test_format_size_caps_at_largest_unit() {
        // Beyond TB still renders in TB
        let huge = 1024u64.pow(4) * 2048;
        assert_eq!(format_size(huge), "2048.00 TB");
    }

    #[tokio::test]
    async fn test_snapshot_from_primary() {
        let backend = SimBackend::new(BackendId::Primary, SimConfig::with_seed(42));
        backend
            .upsert_user(&UserRecord::new("u1").unwrap())
            .await
            .unwrap();
        backend
            .append_listening_events("u1", &[ListeningEvent::new("u1", "t1").unwrap()])
            .await
            .unwrap();

        let primary: Arc<dyn BackendAdapter> = Arc::new(backend);
        let snapshot = AnalyticsAggregator::new().snapshot(Some(&primary)).await;

        assert_eq!(snapshot.source, "primary");
        assert_eq!(snapshot.collections_count, 3);
        assert_eq!(snapshot.users_count, 1);
        assert_eq!(snapshot.listening_history_count, 1);
        assert_eq!(snapshot.total_documents, 2);
        assert!(snapshot.error.is_none());
        assert!(!snapshot.size_human_readable.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_degrades_to_zeros_without_primary() {
        let snapshot = AnalyticsAggregator::new().snapshot(None).await;

        assert_eq!(snapshot.source, "fallback");
        assert_eq!(snapshot.total_documents, 0);
        assert_eq!(snapshot.size_human_readable, "0 Bytes");
        assert!(!snapshot.error.as_deref().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_degrades_on_stats_failure() {
        let backend = SimBackend::new(BackendId::Primary, SimConfig::with_seed(42))
            .with_faults(FaultConfig::new(FaultType::BackendReadFail, 1.0).with_filter("stats"));

        let primary: Arc<dyn BackendAdapter> = Arc::new(backend);
        let snapshot = AnalyticsAggregator::new().snapshot(Some(&primary)).await;

        assert_eq!(snapshot.source, "fallback");
        assert_eq!(snapshot.total_documents, 0);
        assert!(snapshot
            .error
            .as_deref()
            .unwrap()
            .contains("collection stats failed"));
    }

    #[test]
    fn test_snapshot_serialization() {
        let snapshot = AnalyticsSnapshot::zero("primary down");
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["source"], "fallback");
        assert_eq!(json["size_human_readable"], "0 Bytes");
        assert_eq!(json["error"], "primary down");
    }
}
