//! Contending actors.
//!
//! - Actor descriptions and the shared registry used for opponent lookup
//! - The per-actor loop applying the ownership protocol

pub mod registry;
pub(crate) mod runner;

pub use registry::{create_actor, Actor, ActorRegistry, ActorReport, ActorState};
