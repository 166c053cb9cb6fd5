//! Supervision of a contention run.
//!
//! The supervisor starts one thread per actor, observes progress without
//! touching the resource lock, and stops everyone when all actors are
//! satisfied or a budget runs out. The run is then classified as
//! [`SimulationOutcome::AllSatisfied`], [`SimulationOutcome::Livelocked`] or
//! [`SimulationOutcome::TimedOut`].

use log::{debug, error, info, warn};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::actor::runner::{ActorRunner, SharedContext};
use crate::actor::{Actor, ActorRegistry, ActorReport};
use crate::config::{ConfigurationError, SupervisorConfig};
use crate::event::{EventBus, EventStream};
use crate::id::ActorId;
use crate::protocol::Policy;
use crate::sync::atomic::{StepBudget, StopSignal};
use crate::sync::resource::{create_resource, ResourceState};

/// Error type for supervisor operations
#[derive(Error, Debug)]
pub enum SupervisionError {
    /// The run was rejected before any actor started
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The OS refused to start an actor thread
    #[error("failed to spawn thread for {actor}: {source}")]
    SpawnFailed {
        /// Actor whose thread could not start
        actor: ActorId,
        /// Underlying OS error
        source: std::io::Error,
    },

    /// An actor thread panicked
    #[error("actor panicked: {0}")]
    ActorPanicked(ActorId),

    /// The registry had no slot for an actor it listed
    #[error("actor {0} is not registered")]
    UnregisteredActor(ActorId),
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationOutcome {
    /// Every actor consumed the resource
    AllSatisfied,

    /// A budget ran out while ownership kept moving without any consume.
    /// Carries the step count at detection.
    Livelocked(u64),

    /// A budget ran out and the run cannot be classified as livelocked
    TimedOut,
}

impl fmt::Display for SimulationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllSatisfied => write!(f, "all satisfied"),
            Self::Livelocked(steps) => write!(f, "livelocked after {} steps", steps),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Everything the presentation layer needs after a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationReport {
    /// How the run ended
    pub outcome: SimulationOutcome,

    /// Policy the actors followed
    pub policy: Policy,

    /// Owner decisions taken
    pub steps: u64,

    /// Successful ownership transfers
    pub transfers: u64,

    /// Successful consumes
    pub consumes: u64,

    /// Resource owner when the run ended
    pub final_owner: ActorId,

    /// Wall-clock duration of the run
    pub elapsed: Duration,

    /// Per-actor figures, in roster order
    pub actors: Vec<ActorReport>,
}

impl SimulationReport {
    /// Look up one actor's figures
    pub fn actor(&self, id: ActorId) -> Option<&ActorReport> {
        self.actors.iter().find(|report| report.id == id)
    }
}

/// Runs actors against a shared resource under one configuration
#[derive(Debug)]
pub struct Supervisor {
    config: SupervisorConfig,
    events: EventBus,
}

impl Supervisor {
    /// Create a supervisor
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            events: EventBus::new(),
        }
    }

    /// Get the supervisor configuration
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Receive every transfer and consume event of subsequent runs
    pub fn subscribe(&self) -> EventStream {
        self.events.subscribe()
    }

    /// Run `actors` against `resource` until they are all satisfied or a
    /// budget runs out.
    pub fn run(
        &self,
        resource: Arc<ResourceState>,
        actors: Vec<Actor>,
    ) -> Result<SimulationReport, SupervisionError> {
        self.config.validate()?;
        let registry = Arc::new(ActorRegistry::new(actors)?);
        let initial_owner = resource.current_owner();
        if !registry.contains(initial_owner) {
            return Err(ConfigurationError::UnknownOwner(initial_owner).into());
        }

        let ctx = SharedContext {
            resource: Arc::clone(&resource),
            registry: Arc::clone(&registry),
            budget: Arc::new(StepBudget::new(self.config.max_steps)),
            stop: Arc::new(StopSignal::new()),
            events: self.events.sink(),
            policy: self.config.policy,
            backoff: self.config.backoff(),
        };
        let baseline = resource.stats();

        info!(
            "Starting {} actors under {} policy (max {} steps, {:?})",
            registry.len(),
            self.config.policy,
            self.config.max_steps,
            self.config.max_duration()
        );

        let started = Instant::now();
        let handles = self.spawn_all(&ctx)?;
        self.observe(&ctx, started);

        ctx.stop.raise();
        let mut panicked = None;
        for (id, handle) in handles {
            if handle.join().is_err() {
                error!("Actor {} panicked", id);
                panicked.get_or_insert(id);
            }
        }
        if let Some(id) = panicked {
            return Err(SupervisionError::ActorPanicked(id));
        }

        let elapsed = started.elapsed();
        let stats = resource.stats();
        let steps = ctx.budget.taken();
        let outcome = if registry.all_satisfied() {
            info!("All actors satisfied after {} steps", steps);
            SimulationOutcome::AllSatisfied
        } else if stats.transfers_since_use > self.config.livelock_threshold {
            warn!(
                "Livelock: {} transfers without a consume after {} steps",
                stats.transfers_since_use, steps
            );
            SimulationOutcome::Livelocked(steps)
        } else {
            warn!(
                "Timed out after {:?} with {} actors hungry",
                elapsed,
                registry.hungry_count()
            );
            SimulationOutcome::TimedOut
        };

        Ok(SimulationReport {
            outcome,
            policy: self.config.policy,
            steps,
            transfers: stats.transfers - baseline.transfers,
            consumes: stats.uses - baseline.uses,
            final_owner: resource.current_owner(),
            elapsed,
            actors: registry.reports(),
        })
    }

    fn spawn_all(
        &self,
        ctx: &SharedContext,
    ) -> Result<Vec<(ActorId, JoinHandle<()>)>, SupervisionError> {
        let runners = ctx
            .registry
            .actors()
            .map(|actor| {
                ActorRunner::new(actor.id(), ctx.clone())
                    .map(|runner| (format!("spoon-{}", actor.name()), runner))
                    .ok_or(SupervisionError::UnregisteredActor(actor.id()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut handles = Vec::with_capacity(runners.len());
        for (name, runner) in runners {
            let id = runner.id();
            match thread::Builder::new().name(name).spawn(move || runner.run()) {
                Ok(handle) => handles.push((id, handle)),
                Err(source) => {
                    ctx.stop.raise();
                    for (_, handle) in handles {
                        let _ = handle.join();
                    }
                    return Err(SupervisionError::SpawnFailed { actor: id, source });
                }
            }
        }

        Ok(handles)
    }

    /// Poll until every actor is satisfied or a budget is spent
    fn observe(&self, ctx: &SharedContext, started: Instant) {
        let max_duration = self.config.max_duration();
        let poll_interval = self.config.poll_interval();

        loop {
            if ctx.registry.all_satisfied() {
                return;
            }
            if ctx.budget.is_exhausted() {
                debug!("Step budget of {} exhausted", ctx.budget.limit());
                return;
            }
            if started.elapsed() >= max_duration {
                debug!("Duration budget of {:?} exhausted", max_duration);
                return;
            }
            thread::sleep(poll_interval);
        }
    }
}

/// Run a simulation where the first actor initially owns the resource.
pub fn run_simulation(
    actors: Vec<Actor>,
    policy: Policy,
    max_steps: u64,
    max_duration: Duration,
) -> Result<SimulationReport, SupervisionError> {
    let first = actors
        .first()
        .map(Actor::id)
        .ok_or(ConfigurationError::TooFewActors(0))?;
    let config = SupervisorConfig::default()
        .with_policy(policy)
        .with_max_steps(max_steps)
        .with_max_duration(max_duration);

    Supervisor::new(config).run(create_resource(first), actors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::create_actor;

    fn quick(policy: Policy) -> SupervisorConfig {
        SupervisorConfig::default()
            .with_policy(policy)
            .with_backoff(Duration::ZERO)
            .with_max_duration(Duration::from_secs(30))
    }

    #[test]
    fn test_rejects_invalid_setup() {
        let supervisor = Supervisor::new(quick(Policy::Polite));
        let a = ActorId::new(0);

        let result = supervisor.run(create_resource(a), vec![create_actor(a, "Solo", a)]);
        assert!(matches!(
            result,
            Err(SupervisionError::Configuration(ConfigurationError::TooFewActors(1)))
        ));

        let result = supervisor.run(create_resource(ActorId::new(5)), Actor::ring(["A", "B"]));
        assert!(matches!(
            result,
            Err(SupervisionError::Configuration(ConfigurationError::UnknownOwner(_)))
        ));

        let zero = Supervisor::new(quick(Policy::Polite).with_max_steps(0));
        let result = zero.run(create_resource(a), Actor::ring(["A", "B"]));
        assert!(matches!(
            result,
            Err(SupervisionError::Configuration(ConfigurationError::ZeroStepBudget))
        ));
    }

    #[test]
    fn test_all_satisfied_when_nobody_contends() {
        let actors = vec![
            create_actor(ActorId::new(0), "Bob", ActorId::new(1)),
            create_actor(ActorId::new(1), "Alice", ActorId::new(0)).with_need(false),
        ];
        let supervisor = Supervisor::new(quick(Policy::Polite));

        let report = supervisor
            .run(create_resource(ActorId::new(0)), actors)
            .unwrap();

        assert_eq!(report.outcome, SimulationOutcome::AllSatisfied);
        assert_eq!(report.steps, 1);
        assert_eq!(report.consumes, 1);
        assert_eq!(report.transfers, 0);
    }

    #[test]
    fn test_timed_out_below_livelock_threshold() {
        let supervisor = Supervisor::new(
            quick(Policy::Polite)
                .with_max_steps(10)
                .with_livelock_threshold(1_000),
        );

        let report = supervisor
            .run(create_resource(ActorId::new(0)), Actor::ring(["Bob", "Alice"]))
            .unwrap();

        assert_eq!(report.outcome, SimulationOutcome::TimedOut);
        assert_eq!(report.transfers, 10);
    }

    #[test]
    fn test_report_serializes_for_presentation() {
        let supervisor = Supervisor::new(
            quick(Policy::Polite)
                .with_max_steps(20)
                .with_livelock_threshold(5),
        );

        let report = supervisor
            .run(create_resource(ActorId::new(0)), Actor::ring(["Bob", "Alice"]))
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["outcome"]["livelocked"], 20);
        assert_eq!(json["policy"]["kind"], "polite");
        assert_eq!(json["transfers"], 20);
        assert_eq!(json["final_owner"], 0);
        assert_eq!(json["actors"][1]["name"], "Alice");
        assert_eq!(json["actors"][1]["state"], "hungry");
        assert_eq!(json["actors"][1]["yields"], 10);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(SimulationOutcome::AllSatisfied.to_string(), "all satisfied");
        assert_eq!(
            SimulationOutcome::Livelocked(42).to_string(),
            "livelocked after 42 steps"
        );
        assert_eq!(SimulationOutcome::TimedOut.to_string(), "timed out");
    }

    #[test]
    fn test_run_simulation_uses_first_actor_as_owner() {
        let report = run_simulation(
            Actor::ring(["Bob", "Alice"]),
            Policy::Fair { threshold: 1 },
            100,
            Duration::from_secs(30),
        )
        .unwrap();

        assert_eq!(report.outcome, SimulationOutcome::AllSatisfied);
        assert!(matches!(
            run_simulation(Vec::new(), Policy::Polite, 1, Duration::from_secs(1)),
            Err(SupervisionError::Configuration(ConfigurationError::TooFewActors(0)))
        ));
    }
}
