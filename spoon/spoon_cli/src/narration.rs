//! Renders protocol events as the diners' dialogue.

use spoon_protocol::{Actor, ActorId, EventKind, ProtocolEvent};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Puts events from different actor threads back into sequence order.
///
/// Every successful mutation of the resource publishes exactly one event,
/// so sequence numbers are contiguous from the first one expected.
pub struct InOrder {
    next: u64,
    pending: BTreeMap<u64, ProtocolEvent>,
}

impl InOrder {
    pub fn starting_at(next: u64) -> Self {
        Self {
            next,
            pending: BTreeMap::new(),
        }
    }

    /// Accept one event and return every event now ready, in order
    pub fn push(&mut self, event: ProtocolEvent) -> Vec<ProtocolEvent> {
        self.pending.insert(event.sequence, event);

        let mut ready = Vec::new();
        while let Some(event) = self.pending.remove(&self.next) {
            ready.push(event);
            self.next += 1;
        }
        ready
    }

    /// Whatever is still held back once the stream has ended
    pub fn finish(self) -> Vec<ProtocolEvent> {
        self.pending.into_values().collect()
    }
}

/// Names of the cast plus who has eaten so far
pub struct Narrator {
    names: HashMap<ActorId, (String, ActorId)>,
    eaten: HashSet<ActorId>,
}

impl Narrator {
    pub fn new(actors: &[Actor]) -> Self {
        Self {
            names: actors
                .iter()
                .map(|actor| (actor.id(), (actor.name().to_string(), actor.opponent())))
                .collect(),
            eaten: HashSet::new(),
        }
    }

    fn name(&self, id: ActorId) -> String {
        self.names
            .get(&id)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn opponent(&self, id: ActorId) -> ActorId {
        self.names.get(&id).map(|(_, opponent)| *opponent).unwrap_or(id)
    }

    /// Lines to print for one event
    pub fn lines(&mut self, event: &ProtocolEvent) -> Vec<String> {
        let me = self.name(event.actor);
        match event.kind {
            EventKind::Transferred { to } if self.eaten.contains(&event.actor) => {
                vec![format!("{} hands the spoon to {}.", me, self.name(to))]
            }
            EventKind::Transferred { to } => {
                vec![format!("{}: You eat first my darling {}!", me, self.name(to))]
            }
            EventKind::Consumed => {
                self.eaten.insert(event.actor);
                let opponent = self.name(self.opponent(event.actor));
                vec![
                    format!("{} has eaten!", me),
                    format!("{}: I am stuffed, my darling {}!", me, opponent),
                ]
            }
        }
    }
}
