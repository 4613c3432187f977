//! Fault Injection
//!
//! `TigerStyle`: Faults are registered explicitly and fire deterministically.
//!
//! > "If you're not testing with fault injection, you're not testing."

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::rng::DeterministicRng;

/// Kinds of fault a simulated backend can exhibit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultType {
    /// Connection attempt fails
    BackendConnectFail,
    /// Health probe hangs past its timeout
    ProbeTimeout,
    /// A write (upsert, append) fails
    BackendWriteFail,
    /// A read (recommendations, analytics) fails
    BackendReadFail,
}

/// One registered fault: a type, a probability, and an optional operation
/// filter (substring match on the operation name).
#[derive(Debug, Clone)]
pub struct FaultConfig {
    fault_type: FaultType,
    probability: f64,
    operation_filter: Option<String>,
}

impl FaultConfig {
    /// Create a fault with the given firing probability.
    ///
    /// # Panics
    /// Panics if probability is not in [0.0, 1.0].
    #[must_use]
    pub fn new(fault_type: FaultType, probability: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&probability),
            "probability must be in [0.0, 1.0]"
        );
        Self {
            fault_type,
            probability,
            operation_filter: None,
        }
    }

    /// Restrict this fault to operations whose name contains `filter`.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.operation_filter = Some(filter.into());
        self
    }

    /// The fault type.
    #[must_use]
    pub fn fault_type(&self) -> FaultType {
        self.fault_type
    }
}

/// Decides, per operation, whether a registered fault fires.
///
/// Thread-safe: the RNG sits behind a mutex so a shared `Arc<FaultInjector>`
/// can serve every sim component while staying deterministic.
#[derive(Debug)]
pub struct FaultInjector {
    rng: Mutex<DeterministicRng>,
    faults: Vec<FaultConfig>,
    injections: AtomicU64,
}

impl FaultInjector {
    /// Create an injector with no faults registered.
    #[must_use]
    pub fn new(rng: DeterministicRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            faults: Vec::new(),
            injections: AtomicU64::new(0),
        }
    }

    /// Register a fault.
    pub fn register(&mut self, config: FaultConfig) {
        self.faults.push(config);
    }

    /// Check whether a fault fires for this operation.
    ///
    /// Returns the first matching fault whose probability trial succeeds.
    pub fn should_inject(&self, operation: &str) -> Option<FaultType> {
        for fault in &self.faults {
            if let Some(filter) = &fault.operation_filter {
                if !operation.contains(filter.as_str()) {
                    continue;
                }
            }

            let fires = self
                .rng
                .lock()
                .expect("fault injector rng poisoned")
                .next_bool(fault.probability);

            if fires {
                self.injections.fetch_add(1, Ordering::Relaxed);
                return Some(fault.fault_type);
            }
        }
        None
    }

    /// Total faults injected so far.
    #[must_use]
    pub fn total_injections(&self) -> u64 {
        self.injections.load(Ordering::Relaxed)
    }
}

/// Builder for a `FaultInjector` with multiple faults.
pub struct FaultInjectorBuilder {
    injector: FaultInjector,
}

impl FaultInjectorBuilder {
    /// Start a builder with the given RNG.
    #[must_use]
    pub fn new(rng: DeterministicRng) -> Self {
        Self {
            injector: FaultInjector::new(rng),
        }
    }

    /// Add a fault.
    #[must_use]
    pub fn with_fault(mut self, config: FaultConfig) -> Self {
        self.injector.register(config);
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> FaultInjector {
        self.injector
    }
}
