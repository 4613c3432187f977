//! DST - Deterministic Simulation Testing Kernel
//!
//! `TigerStyle`: Single seed controls all randomness.
//!
//! Every orchestrator component has a simulation counterpart driven by this
//! kernel. Same seed, same fault configuration, same behavior, every run.
//!
//! # Example
//!
//! ```rust
//! use tunestore::dst::{DeterministicRng, FaultConfig, FaultInjector, FaultType};
//!
//! let mut rng = DeterministicRng::new(42);
//! let mut injector = FaultInjector::new(rng.fork());
//! injector.register(FaultConfig::new(FaultType::BackendWriteFail, 1.0).with_filter("upsert"));
//!
//! assert!(injector.should_inject("upsert").is_some());
//! assert!(injector.should_inject("probe").is_none());
//! ```

mod config;
mod fault;
mod rng;

pub use config::SimConfig;
pub use fault::{FaultConfig, FaultInjector, FaultInjectorBuilder, FaultType};
pub use rng::DeterministicRng;
