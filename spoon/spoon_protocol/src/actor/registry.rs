//! Actors and the shared registry they look each other up in.
//!
//! An actor's need flag lives in the registry so opponents can read it.
//! Only the actor's own task ever writes it.

use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::ConfigurationError;
use crate::id::ActorId;
use crate::sync::atomic::Counter;

/// Description of one contender, before it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    id: ActorId,
    name: String,
    opponent: ActorId,
    initial_need: bool,
}

/// Create a hungry actor that defers to `opponent`
pub fn create_actor(id: ActorId, name: impl Into<String>, opponent: ActorId) -> Actor {
    Actor::new(id, name, opponent)
}

impl Actor {
    /// Create a hungry actor that defers to `opponent`
    pub fn new(id: ActorId, name: impl Into<String>, opponent: ActorId) -> Self {
        Self {
            id,
            name: name.into(),
            opponent,
            initial_need: true,
        }
    }

    /// Set whether the actor starts out needing the resource
    pub fn with_need(mut self, needs: bool) -> Self {
        self.initial_need = needs;
        self
    }

    /// Build a ring of actors where each one's opponent is the next.
    ///
    /// Ids are assigned in order starting at 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use spoon_protocol::{Actor, ActorId};
    ///
    /// let actors = Actor::ring(["Bob", "Alice"]);
    /// assert_eq!(actors[0].opponent(), ActorId::new(1));
    /// assert_eq!(actors[1].opponent(), ActorId::new(0));
    /// ```
    pub fn ring<I, S>(names: I) -> Vec<Actor>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let count = names.len() as u32;

        names
            .into_iter()
            .zip(0u32..)
            .map(|(name, raw)| {
                Actor::new(ActorId::new(raw), name, ActorId::new((raw + 1) % count))
            })
            .collect()
    }

    /// Actor id
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The actor it defers to
    pub fn opponent(&self) -> ActorId {
        self.opponent
    }

    /// Whether the actor starts out needing the resource
    pub fn initially_needs(&self) -> bool {
        self.initial_need
    }
}

/// Lifecycle of an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorState {
    /// Still needs the resource
    Hungry,
    /// Has consumed the resource; terminal
    Satisfied,
}

/// Final per-actor figures of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorReport {
    /// Actor id
    pub id: ActorId,
    /// Display name
    pub name: String,
    /// The actor it deferred to
    pub opponent: ActorId,
    /// State at the end of the run
    pub state: ActorState,
    /// Ownership transfers made by yielding
    pub yields: u64,
    /// Successful consumes (0 or 1)
    pub consumes: u64,
    /// Wait decisions
    pub waits: u64,
    /// Operations that failed because ownership had already moved
    pub stale_recoveries: u64,
}

#[derive(Debug)]
pub(crate) struct ActorSlot {
    pub(crate) actor: Actor,
    hungry: AtomicBool,
    pub(crate) yields: Counter,
    pub(crate) consumes: Counter,
    pub(crate) waits: Counter,
    pub(crate) stale_recoveries: Counter,
}

/// All actors of one simulation, indexed by id
#[derive(Debug)]
pub struct ActorRegistry {
    slots: Vec<Arc<ActorSlot>>,
    index: HashMap<ActorId, usize>,
}

impl ActorRegistry {
    /// Register `actors`, rejecting rosters that cannot contend
    pub fn new(actors: Vec<Actor>) -> Result<Self, ConfigurationError> {
        if actors.len() < 2 {
            return Err(ConfigurationError::TooFewActors(actors.len()));
        }

        let mut index = HashMap::with_capacity(actors.len());
        for (position, actor) in actors.iter().enumerate() {
            if index.insert(actor.id, position).is_some() {
                return Err(ConfigurationError::DuplicateActor(actor.id));
            }
        }

        for actor in &actors {
            if actor.opponent == actor.id {
                return Err(ConfigurationError::SelfOpponent(actor.id));
            }
            if !index.contains_key(&actor.opponent) {
                return Err(ConfigurationError::UnknownOpponent {
                    actor: actor.id,
                    opponent: actor.opponent,
                });
            }
        }

        let slots = actors
            .into_iter()
            .map(|actor| {
                debug!(
                    "Registered actor: {} ({}) opponent {}",
                    actor.name, actor.id, actor.opponent
                );
                Arc::new(ActorSlot {
                    hungry: AtomicBool::new(actor.initial_need),
                    actor,
                    yields: Counter::new(),
                    consumes: Counter::new(),
                    waits: Counter::new(),
                    stale_recoveries: Counter::new(),
                })
            })
            .collect();

        Ok(Self { slots, index })
    }

    /// Whether `id` is registered
    pub fn contains(&self, id: ActorId) -> bool {
        self.index.contains_key(&id)
    }

    /// Number of registered actors
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the registry is empty (never true for a validated registry)
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether `id` still needs the resource. Unknown ids need nothing.
    pub fn still_needs(&self, id: ActorId) -> bool {
        self.slot(id)
            .map(|slot| slot.hungry.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Current state of `id`
    pub fn state(&self, id: ActorId) -> Option<ActorState> {
        self.slot(id).map(|slot| {
            if slot.hungry.load(Ordering::SeqCst) {
                ActorState::Hungry
            } else {
                ActorState::Satisfied
            }
        })
    }

    /// Whether every actor is satisfied
    pub fn all_satisfied(&self) -> bool {
        self.hungry_count() == 0
    }

    /// Number of actors still hungry
    pub fn hungry_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.hungry.load(Ordering::SeqCst))
            .count()
    }

    /// First hungry actor in roster order after `after`, wrapping around
    /// and excluding `after` itself.
    pub fn next_in_need(&self, after: ActorId) -> Option<ActorId> {
        let start = *self.index.get(&after)?;
        let count = self.slots.len();

        (1..count)
            .map(|offset| &self.slots[(start + offset) % count])
            .find(|slot| slot.hungry.load(Ordering::SeqCst))
            .map(|slot| slot.actor.id)
    }

    /// Per-actor figures, in roster order
    pub fn reports(&self) -> Vec<ActorReport> {
        self.slots
            .iter()
            .map(|slot| ActorReport {
                id: slot.actor.id,
                name: slot.actor.name.clone(),
                opponent: slot.actor.opponent,
                state: if slot.hungry.load(Ordering::SeqCst) {
                    ActorState::Hungry
                } else {
                    ActorState::Satisfied
                },
                yields: slot.yields.get(),
                consumes: slot.consumes.get(),
                waits: slot.waits.get(),
                stale_recoveries: slot.stale_recoveries.get(),
            })
            .collect()
    }

    /// Actors in roster order
    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.slots.iter().map(|slot| &slot.actor)
    }

    pub(crate) fn slot(&self, id: ActorId) -> Option<&Arc<ActorSlot>> {
        self.index.get(&id).map(|&position| &self.slots[position])
    }

    /// Flip `id` from hungry to satisfied.
    ///
    /// Must only be called from `id`'s own task. Returns false if the actor
    /// was already satisfied.
    pub(crate) fn mark_satisfied(&self, id: ActorId) -> bool {
        self.slot(id)
            .map(|slot| slot.hungry.swap(false, Ordering::SeqCst))
            .unwrap_or(false)
    }
}
