#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Spoon Protocol
//!
//! Contention over one shared, transferable resource between concurrent
//! actors, and the livelock a "polite" transfer policy produces.
//!
//! Two hungry diners share one spoon. Whoever holds it checks whether the
//! other is still hungry and, if so, hands the spoon over instead of eating.
//! Both follow the same rule, so the spoon changes hands forever and nobody
//! eats. This crate models that precisely and provides a fair policy that
//! breaks it:
//!
//! - [`sync::resource`]: the resource cell, the only synchronization point
//! - [`protocol`]: the pure decision function (Wait, Yield or Consume)
//! - [`actor`]: actor descriptions, the shared registry and the actor loop
//! - [`supervisor`]: runs actors on their own threads and classifies the run
//! - [`event`]: the stream of transfer and consume events
//! - [`config`]: budgets, policy and rosters, loadable from TOML
//!
//! ```
//! use std::time::Duration;
//! use spoon_protocol::{run_simulation, Actor, Policy, SimulationOutcome};
//!
//! let report = run_simulation(
//!     Actor::ring(["Bob", "Alice"]),
//!     Policy::Fair { threshold: 5 },
//!     1_000,
//!     Duration::from_secs(10),
//! )
//! .unwrap();
//!
//! assert_eq!(report.outcome, SimulationOutcome::AllSatisfied);
//! ```

/// Actors, the shared registry and the actor loop
pub mod actor;

/// Budgets, policy and roster configuration
pub mod config;

/// Observable transfer and consume events
pub mod event;

/// Actor identifiers
pub mod id;

/// The ownership decision function
pub mod protocol;

/// Supervision and outcome classification
pub mod supervisor;

/// The shared resource and lock-free counters
pub mod sync;

// Re-export key types for easier access
pub use actor::{create_actor, Actor, ActorReport, ActorState};
pub use config::{ConfigError, ConfigurationError, SimulationConfig, SupervisorConfig};
pub use event::{EventKind, EventStream, ProtocolEvent};
pub use id::ActorId;
pub use protocol::{Decision, Policy};
pub use supervisor::{
    run_simulation, SimulationOutcome, SimulationReport, SupervisionError, Supervisor,
};
pub use sync::resource::{create_resource, OwnershipError, ResourceState};
