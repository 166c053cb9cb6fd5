//! Ownership protocol: what an actor does with the resource on each step.
//!
//! The decision is a pure function of what the actor observes right now.
//! Nothing from earlier steps is consulted except the actor's own count of
//! consecutive yields, which only the fair policy looks at.
//!
//! Under [`Policy::Polite`] an owner always gives the resource away when the
//! opponent claims need. Two symmetric actors therefore pass it back and
//! forth forever without either using it. [`Policy::Fair`] bounds this: after
//! `threshold` consecutive yields an owner consumes regardless.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transfer policy applied by every actor in a simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Policy {
    /// Always defer to a hungry opponent. Livelocks with symmetric actors.
    #[default]
    Polite,

    /// Defer at most `threshold` times in a row, then consume anyway.
    Fair {
        /// Consecutive yields after which the owner stops deferring
        threshold: u32,
    },
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Polite => write!(f, "polite"),
            Self::Fair { threshold } => write!(f, "fair(K={})", threshold),
        }
    }
}

/// What an actor sees when it is about to decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// The actor currently owns the resource
    pub am_owner: bool,

    /// The actor still needs the resource
    pub i_need: bool,

    /// The opponent claims to still need the resource (possibly stale)
    pub opponent_needs: bool,

    /// Some actor other than this one, opponent or not, still needs it
    pub others_need: bool,

    /// Yields made by this actor since its last consume
    pub consecutive_yields: u32,
}

/// Outcome of one protocol evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Back off and re-check later
    Wait,

    /// Hand ownership on without using the resource: to the opponent while
    /// still hungry, to the next hungry actor once satisfied
    Yield,

    /// Use the resource, then release it
    Consume,
}

impl Policy {
    /// Decide the next action for an actor.
    ///
    /// # Examples
    ///
    /// ```
    /// use spoon_protocol::protocol::{Decision, Observation, Policy};
    ///
    /// let both_hungry = Observation {
    ///     am_owner: true,
    ///     i_need: true,
    ///     opponent_needs: true,
    ///     others_need: true,
    ///     consecutive_yields: 5,
    /// };
    ///
    /// assert_eq!(Policy::Polite.decide(&both_hungry), Decision::Yield);
    /// assert_eq!(Policy::Fair { threshold: 5 }.decide(&both_hungry), Decision::Consume);
    /// ```
    pub fn decide(&self, observation: &Observation) -> Decision {
        if !observation.am_owner {
            return Decision::Wait;
        }

        match (observation.i_need, observation.opponent_needs) {
            (true, false) => Decision::Consume,
            (true, true) => match self {
                Self::Polite => Decision::Yield,
                Self::Fair { threshold } if observation.consecutive_yields >= *threshold => {
                    Decision::Consume
                }
                Self::Fair { .. } => Decision::Yield,
            },
            // A satisfied owner must not sit on the resource while anyone wants it
            (false, _) if observation.opponent_needs || observation.others_need => {
                Decision::Yield
            }
            (false, _) => Decision::Wait,
        }
    }

    /// The starvation-avoidance threshold, if the policy has one.
    pub fn threshold(&self) -> Option<u32> {
        match self {
            Self::Polite => None,
            Self::Fair { threshold } => Some(*threshold),
        }
    }
}
