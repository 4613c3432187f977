//! # Tunestore
//!
//! A multi-backend persistence orchestrator for music recommendation
//! services, with deterministic simulation testing.
//!
//! ## Features
//!
//! - **Heterogeneous backends**: one adapter contract over a primary
//!   document store, a managed relational store, and an embedded fallback
//! - **Read-then-decide failover**: a fresh health snapshot before every
//!   operation; the fallback-mode latch never silently clears
//! - **Fan-out writes**: every active backend attempted in parallel, one
//!   success is enough, partial failure is data
//! - **Precedence reads**: sequential walk, best backend first, an earlier
//!   error never masks a later answer
//! - **Deterministic testing**: full DST (Deterministic Simulation Testing)
//!   with seeded fault injection
//!
//! ## Quick Start
//!
//! ```rust
//! use tunestore::{DatabaseManager, UserRecord, ListeningEvent};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Three simulated backends, deterministic from the seed
//! let manager = DatabaseManager::sim(42);
//! manager.connect().await?;
//!
//! // Writes fan out to every reachable backend
//! let outcome = manager.upsert_user(&UserRecord::new("u1")?).await?;
//! assert!(outcome.success);
//!
//! let plays = vec![ListeningEvent::new("u1", "track-7")?];
//! manager.append_listening_history("u1", &plays).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    DatabaseManager                       │
//! ├─────────────────────────────────────────────────────────┤
//! │  HealthMonitor │ FailoverPolicy │ Analytics Aggregator  │
//! ├─────────────────────────────────────────────────────────┤
//! │  WriteCoordinator (parallel)  │  ReadRouter (sequential)│
//! ├─────────────────────────────────────────────────────────┤
//! │  Primary (mongo) │ Secondary (postgres) │ Fallback (sqlite)
//! ├─────────────────────────────────────────────────────────┤
//! │  DST Framework   │ Fault injection + sim backends       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Simulation-First Philosophy
//!
//! Every backend has a deterministic simulation implementation, and every
//! orchestration layer is tested against it with fault injection before
//! any production adapter exists. Same seed = same faults = reproducible
//! bugs.
//!
//! ## Feature Flags
//!
//! - `mongo` - MongoDB primary document store
//! - `postgres` - PostgreSQL managed relational store
//! - `sqlite` - SQLite embedded fallback store
//! - `production-backends` - all of the above

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod analytics;
pub mod backend;
pub mod constants;
pub mod coordinator;
pub mod dst;
pub mod failover;
pub mod health;
pub mod llm;
pub mod manager;
pub mod outcome;
pub mod recommend;
pub mod router;
pub mod telemetry;

// Re-export common types
pub use analytics::{format_size, AnalyticsAggregator, AnalyticsSnapshot};
pub use backend::{
    validate_listening_batch, BackendAdapter, BackendAnalytics, BackendId, CollectionStats,
    DateRange, ListeningEvent, ProbeResult, Recommendation, RecommendationQuery, SimBackend,
    StoreError, StoreResult, UserRecord,
};
pub use coordinator::WriteCoordinator;
pub use dst::{
    DeterministicRng, FaultConfig, FaultInjector, FaultInjectorBuilder, FaultType, SimConfig,
};
pub use failover::{FailoverDecision, FailoverPolicy, FailoverState};
pub use health::{HealthMonitor, HealthRecord, HealthSnapshot};
pub use manager::{DatabaseManager, DatabaseManagerBuilder, ManagerConfig, ManagerInfo};
pub use outcome::{ReadOutcome, WriteOutcome, WriteResult};
pub use router::ReadRouter;

#[cfg(feature = "mongo")]
pub use backend::MongoBackend;

#[cfg(feature = "postgres")]
pub use backend::PostgresBackend;

#[cfg(feature = "sqlite")]
pub use backend::SqliteBackend;

// Language model exports
pub use llm::{LanguageModelProvider, PromptRequest, ProviderError, SimLanguageModel};

// Recommendation engine exports
pub use recommend::{EngineError, RecommendationEngine};
