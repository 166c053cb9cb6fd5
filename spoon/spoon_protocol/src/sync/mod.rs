//! Synchronization primitives for the ownership protocol.
//!
//! - The shared resource cell, the single synchronization point between actors
//! - Lock-free counters, budget and stop signal observed by the supervisor

pub mod atomic;
pub mod resource;

pub use atomic::{Counter, StepBudget, StopSignal};
pub use resource::{create_resource, OwnershipError, ResourceSnapshot, ResourceState, ResourceStats};
