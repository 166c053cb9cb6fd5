//! Simulation configuration.
//!
//! [`SupervisorConfig`] carries the policy and budgets of one run.
//! [`SimulationConfig`] adds the actor roster and can be loaded from TOML:
//!
//! ```toml
//! initial_owner = "Bob"
//!
//! [supervisor]
//! max_steps = 10000
//! backoff_us = 0
//!
//! [supervisor.policy]
//! kind = "fair"
//! threshold = 5
//!
//! [[actors]]
//! name = "Bob"
//!
//! [[actors]]
//! name = "Alice"
//! needs = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::actor::Actor;
use crate::id::ActorId;
use crate::protocol::Policy;
use crate::sync::resource::{create_resource, ResourceState};

/// Setup rejected before any actor starts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Contention needs at least two actors
    #[error("at least two actors are required, got {0}")]
    TooFewActors(usize),

    /// An actor names itself as opponent
    #[error("{0} is configured as its own opponent")]
    SelfOpponent(ActorId),

    /// An actor names an opponent that is not part of the simulation
    #[error("{actor} has unknown opponent {opponent}")]
    UnknownOpponent {
        /// The misconfigured actor
        actor: ActorId,
        /// The opponent it names
        opponent: ActorId,
    },

    /// Two actors share an id
    #[error("duplicate actor id {0}")]
    DuplicateActor(ActorId),

    /// The resource is owned by an actor that is not part of the simulation
    #[error("resource owner {0} is not a simulated actor")]
    UnknownOwner(ActorId),

    /// The configured initial owner name matches no actor
    #[error("initial owner {0:?} matches no actor")]
    UnknownOwnerName(String),

    /// The step budget is zero
    #[error("max_steps must be positive")]
    ZeroStepBudget,

    /// The duration budget is zero
    #[error("max_duration must be positive")]
    ZeroDuration,

    /// A fair policy with a zero threshold never yields and never livelocks
    #[error("fair policy threshold must be positive")]
    ZeroThreshold,
}

/// Errors loading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to load configuration: {0}")]
    LoadFailed(#[from] std::io::Error),

    /// The file is not valid TOML for this schema
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(#[from] toml::de::Error),

    /// The file parsed but describes an impossible setup
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] ConfigurationError),
}

fn default_max_steps() -> u64 {
    10_000
}

fn default_max_duration_ms() -> u64 {
    5_000
}

fn default_livelock_threshold() -> u64 {
    100
}

fn default_backoff_us() -> u64 {
    1_000
}

fn default_poll_interval_us() -> u64 {
    500
}

/// Policy and budgets for one supervised run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Maximum number of owner decisions across all actors
    pub max_steps: u64,

    /// Wall-clock budget in milliseconds
    pub max_duration_ms: u64,

    /// Transfers without a consume after which a stalled run counts as livelocked
    pub livelock_threshold: u64,

    /// Back-off sleep of a waiting actor in microseconds; 0 yields the thread
    pub backoff_us: u64,

    /// How often the supervisor observes progress, in microseconds
    pub poll_interval_us: u64,

    /// Transfer policy every actor follows
    pub policy: Policy,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_duration_ms: default_max_duration_ms(),
            livelock_threshold: default_livelock_threshold(),
            backoff_us: default_backoff_us(),
            poll_interval_us: default_poll_interval_us(),
            policy: Policy::default(),
        }
    }
}

impl SupervisorConfig {
    /// Use `policy` for every actor
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Limit the run to `max_steps` owner decisions
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Limit the run's wall-clock time
    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration_ms = duration_millis(max_duration);
        self
    }

    /// Set the waiting actors' back-off
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff_us = duration_micros(backoff);
        self
    }

    /// Set the livelock classification threshold
    pub fn with_livelock_threshold(mut self, threshold: u64) -> Self {
        self.livelock_threshold = threshold;
        self
    }

    /// Wall-clock budget
    pub fn max_duration(&self) -> Duration {
        Duration::from_millis(self.max_duration_ms)
    }

    /// Back-off of a waiting actor
    pub fn backoff(&self) -> Duration {
        Duration::from_micros(self.backoff_us)
    }

    /// Supervisor observation cadence
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }

    /// Reject budgets and policies that cannot describe a run
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_steps == 0 {
            return Err(ConfigurationError::ZeroStepBudget);
        }
        if self.max_duration_ms == 0 {
            return Err(ConfigurationError::ZeroDuration);
        }
        if self.policy.threshold() == Some(0) {
            return Err(ConfigurationError::ZeroThreshold);
        }
        Ok(())
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn duration_micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

fn default_needs() -> bool {
    true
}

/// One actor in a configured roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorSpec {
    /// Display name
    pub name: String,

    /// Whether the actor starts out needing the resource
    #[serde(default = "default_needs")]
    pub needs: bool,
}

impl ActorSpec {
    /// A hungry actor called `name`
    pub fn hungry(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            needs: true,
        }
    }
}

/// A complete simulation: supervisor settings plus the actor roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Name of the actor holding the resource at start; the first actor if unset
    pub initial_owner: Option<String>,

    /// Policy and budgets
    pub supervisor: SupervisorConfig,

    /// Actors in ring order; each one's opponent is the next
    pub actors: Vec<ActorSpec>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_owner: None,
            supervisor: SupervisorConfig::default(),
            actors: vec![ActorSpec::hungry("Bob"), ActorSpec::hungry("Alice")],
        }
    }
}

impl SimulationConfig {
    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Check the supervisor settings and the roster
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.supervisor.validate()?;
        self.build().map(|_| ())
    }

    /// Create the resource and the ring of actors this configuration describes
    pub fn build(&self) -> Result<(Arc<ResourceState>, Vec<Actor>), ConfigurationError> {
        if self.actors.len() < 2 {
            return Err(ConfigurationError::TooFewActors(self.actors.len()));
        }

        let actors: Vec<Actor> = Actor::ring(self.actors.iter().map(|spec| spec.name.clone()))
            .into_iter()
            .zip(&self.actors)
            .map(|(actor, spec)| actor.with_need(spec.needs))
            .collect();

        let owner = match &self.initial_owner {
            None => actors[0].id(),
            Some(name) => actors
                .iter()
                .find(|actor| actor.name() == name)
                .map(Actor::id)
                .ok_or_else(|| ConfigurationError::UnknownOwnerName(name.clone()))?,
        };

        Ok((create_resource(owner), actors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supervisor_config_default() {
        let config = SupervisorConfig::default();

        assert_eq!(config.policy, Policy::Polite);
        assert_eq!(config.max_steps, 10_000);
        assert_eq!(config.max_duration(), Duration::from_secs(5));
        assert_eq!(config.backoff(), Duration::from_millis(1));
        assert_eq!(config.poll_interval(), Duration::from_micros(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_budgets() {
        let config = SupervisorConfig::default().with_max_steps(0);
        assert_eq!(config.validate(), Err(ConfigurationError::ZeroStepBudget));

        let config = SupervisorConfig::default().with_max_duration(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigurationError::ZeroDuration));

        let config = SupervisorConfig::default().with_policy(Policy::Fair { threshold: 0 });
        assert_eq!(config.validate(), Err(ConfigurationError::ZeroThreshold));
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = SimulationConfig::from_toml_str(
            r#"
            initial_owner = "Alice"

            [supervisor]
            max_steps = 50
            backoff_us = 0

            [supervisor.policy]
            kind = "fair"
            threshold = 3

            [[actors]]
            name = "Bob"

            [[actors]]
            name = "Alice"
            needs = false
            "#,
        )
        .unwrap();

        assert_eq!(config.supervisor.max_steps, 50);
        assert_eq!(config.supervisor.backoff(), Duration::ZERO);
        assert_eq!(config.supervisor.max_duration_ms, 5_000);
        assert_eq!(config.supervisor.policy, Policy::Fair { threshold: 3 });
        assert!(!config.actors[1].needs);

        let (resource, actors) = config.build().unwrap();
        assert_eq!(resource.current_owner(), actors[1].id());
        assert!(actors[0].initially_needs());
        assert!(!actors[1].initially_needs());
    }

    #[test]
    fn test_empty_toml_is_the_default() {
        let config = SimulationConfig::from_toml_str("").unwrap();
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn test_rejects_bad_rosters() {
        let lonely = "[[actors]]\nname = \"Bob\"\n";
        assert!(matches!(
            SimulationConfig::from_toml_str(lonely),
            Err(ConfigError::Invalid(ConfigurationError::TooFewActors(1)))
        ));

        let ghost_owner = "initial_owner = \"Carol\"\n";
        assert!(matches!(
            SimulationConfig::from_toml_str(ghost_owner),
            Err(ConfigError::Invalid(ConfigurationError::UnknownOwnerName(_)))
        ));

        assert!(matches!(
            SimulationConfig::from_toml_str("[supervisor]\nmax_steps = \"many\"\n"),
            Err(ConfigError::ParseFailed(_))
        ));
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spoon.toml");
        let config = SimulationConfig {
            supervisor: SupervisorConfig::default().with_policy(Policy::Fair { threshold: 2 }),
            ..Default::default()
        };
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        assert_eq!(SimulationConfig::load(&path).unwrap(), config);
        assert!(matches!(
            SimulationConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::LoadFailed(_))
        ));
    }
}
