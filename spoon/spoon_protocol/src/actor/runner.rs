//! The actor loop.
//!
//! Each actor runs on its own thread. While hungry it repeatedly reads the
//! resource, asks the policy for a decision and applies it. Only the Wait
//! back-off ever sleeps, and the resource is never held across it. An actor
//! that is already satisfied keeps running only while it owns the resource
//! and someone else still needs it, so it always hands the resource on
//! before it stops.

use log::{debug, trace};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::registry::{ActorRegistry, ActorSlot};
use crate::event::{EventKind, EventSink, ProtocolEvent};
use crate::id::ActorId;
use crate::protocol::{Decision, Observation, Policy};
use crate::sync::atomic::{StepBudget, StopSignal};
use crate::sync::resource::{OwnershipError, ResourceState};

/// Everything an actor shares with its peers and the supervisor
#[derive(Debug, Clone)]
pub(crate) struct SharedContext {
    pub(crate) resource: Arc<ResourceState>,
    pub(crate) registry: Arc<ActorRegistry>,
    pub(crate) budget: Arc<StepBudget>,
    pub(crate) stop: Arc<StopSignal>,
    pub(crate) events: EventSink,
    pub(crate) policy: Policy,
    pub(crate) backoff: Duration,
}

/// One actor's running task
pub(crate) struct ActorRunner {
    id: ActorId,
    opponent: ActorId,
    slot: Arc<ActorSlot>,
    consecutive_yields: u32,
    ctx: SharedContext,
}

impl ActorRunner {
    /// Prepare the task for `id`, or `None` if it is not registered
    pub(crate) fn new(id: ActorId, ctx: SharedContext) -> Option<Self> {
        let slot = Arc::clone(ctx.registry.slot(id)?);
        Some(Self {
            id,
            opponent: slot.actor.opponent(),
            slot,
            consecutive_yields: 0,
            ctx,
        })
    }

    pub(crate) fn id(&self) -> ActorId {
        self.id
    }

    /// Loop until done, stopped, or out of budget
    pub(crate) fn run(mut self) {
        debug!("Actor {} started", self.id);

        while self.has_work() && !self.ctx.stop.is_raised() && !self.ctx.budget.is_exhausted()
        {
            if self.step().is_break() {
                break;
            }
        }

        debug!(
            "Actor {} stopped ({})",
            self.id,
            if self.ctx.registry.still_needs(self.id) {
                "hungry"
            } else {
                "satisfied"
            }
        );
    }

    fn has_work(&self) -> bool {
        let registry = &self.ctx.registry;
        registry.still_needs(self.id)
            || (self.ctx.resource.current_owner() == self.id && !registry.all_satisfied())
    }

    fn step(&mut self) -> ControlFlow<()> {
        let am_owner = self.ctx.resource.current_owner() == self.id;
        if !am_owner {
            self.wait();
            return ControlFlow::Continue(());
        }

        let Some(step) = self.ctx.budget.try_take() else {
            trace!("Actor {} found the step budget exhausted", self.id);
            return ControlFlow::Break(());
        };

        let next_in_need = self.ctx.registry.next_in_need(self.id);
        let observation = Observation {
            am_owner,
            i_need: self.ctx.registry.still_needs(self.id),
            opponent_needs: self.ctx.registry.still_needs(self.opponent),
            others_need: next_in_need.is_some(),
            consecutive_yields: self.consecutive_yields,
        };
        let decision = self.ctx.policy.decide(&observation);
        trace!(
            "Actor {} step {}: {:?} -> {:?}",
            self.id,
            step,
            observation,
            decision
        );

        match decision {
            Decision::Wait => self.wait(),
            Decision::Yield => {
                let to = match next_in_need {
                    Some(next) if !observation.i_need => next,
                    _ => self.opponent,
                };
                if self.transfer(step, to).is_ok() {
                    self.slot.yields.increment();
                    self.consecutive_yields = self.consecutive_yields.saturating_add(1);
                }
            }
            Decision::Consume => self.consume(step),
        }

        ControlFlow::Continue(())
    }

    fn wait(&self) {
        self.slot.waits.increment();
        if self.ctx.backoff.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(self.ctx.backoff);
        }
    }

    fn consume(&mut self, step: u64) {
        let sequence = match self.ctx.resource.try_use_as(self.id) {
            Ok(sequence) => sequence,
            Err(error) => {
                self.recover(&error);
                return;
            }
        };

        self.ctx.registry.mark_satisfied(self.id);
        self.slot.consumes.increment();
        self.consecutive_yields = 0;
        self.publish(sequence, step, EventKind::Consumed);
        debug!("Actor {} consumed the resource at step {}", self.id, step);

        // Hand the resource to whoever still needs it; keep it if nobody does
        if let Some(next) = self.ctx.registry.next_in_need(self.id) {
            let _ = self.transfer(step, next);
        }
    }

    fn transfer(&self, step: u64, to: ActorId) -> Result<(), OwnershipError> {
        match self.ctx.resource.try_transfer(self.id, to) {
            Ok(sequence) => {
                self.publish(sequence, step, EventKind::Transferred { to });
                debug!("Actor {} passed the resource to {} at step {}", self.id, to, step);
                Ok(())
            }
            Err(error) => {
                self.recover(&error);
                Err(error)
            }
        }
    }

    fn recover(&self, error: &OwnershipError) {
        self.slot.stale_recoveries.increment();
        debug!("Actor {} treating failed operation as wait: {}", self.id, error);
    }

    fn publish(&self, sequence: u64, step: u64, kind: EventKind) {
        self.ctx.events.publish(ProtocolEvent {
            sequence,
            step,
            actor: self.id,
            kind,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::registry::{create_actor, Actor, ActorState};
    use crate::event::{EventBus, EventStream};

    const BOB: ActorId = ActorId::new(0);
    const ALICE: ActorId = ActorId::new(1);

    fn shared(
        actors: Vec<Actor>,
        owner: ActorId,
        policy: Policy,
        steps: u64,
    ) -> (SharedContext, EventStream) {
        let bus = EventBus::new();
        let events = bus.subscribe();
        let ctx = SharedContext {
            resource: Arc::new(ResourceState::new(owner)),
            registry: Arc::new(ActorRegistry::new(actors).unwrap()),
            budget: Arc::new(StepBudget::new(steps)),
            stop: Arc::new(StopSignal::new()),
            events: bus.sink(),
            policy,
            backoff: Duration::ZERO,
        };
        (ctx, events)
    }

    fn context(alice_needs: bool, policy: Policy, steps: u64) -> (SharedContext, EventStream) {
        let actors = vec![
            create_actor(BOB, "Bob", ALICE),
            create_actor(ALICE, "Alice", BOB).with_need(alice_needs),
        ];
        shared(actors, BOB, policy, steps)
    }

    fn runner(id: ActorId, ctx: &SharedContext) -> ActorRunner {
        ActorRunner::new(id, ctx.clone()).unwrap()
    }

    #[test]
    fn test_unregistered_actor_has_no_runner() {
        let (ctx, _events) = context(true, Policy::Polite, 10);
        assert!(ActorRunner::new(ActorId::new(9), ctx).is_none());
    }

    #[test]
    fn test_owner_consumes_when_opponent_is_not_hungry() {
        let (ctx, events) = context(false, Policy::Polite, 10);

        runner(BOB, &ctx).run();

        assert_eq!(ctx.registry.state(BOB), Some(ActorState::Satisfied));
        assert_eq!(ctx.budget.taken(), 1);
        assert_eq!(ctx.resource.current_owner(), BOB);
        assert_eq!(ctx.resource.stats().transfers, 0);
        let kinds: Vec<EventKind> = events.drain().into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Consumed]);
    }

    #[test]
    fn test_polite_owner_yields_until_budget_runs_out() {
        let (ctx, _events) = context(true, Policy::Polite, 1);

        runner(BOB, &ctx).run();

        let report = &ctx.registry.reports()[0];
        assert_eq!(report.yields, 1);
        assert_eq!(report.state, ActorState::Hungry);
        assert_eq!(ctx.resource.current_owner(), ALICE);
    }

    #[test]
    fn test_stop_signal_ends_loop_of_non_owner() {
        let (ctx, _events) = context(true, Policy::Polite, 10);
        ctx.stop.raise();

        runner(ALICE, &ctx).run();

        assert_eq!(ctx.budget.taken(), 0);
        assert_eq!(ctx.registry.reports()[1].waits, 0);
    }

    #[test]
    fn test_consume_releases_to_hungry_opponent() {
        let (ctx, _events) = context(true, Policy::Fair { threshold: 1 }, 10);
        let mut bob = runner(BOB, &ctx);
        bob.consecutive_yields = 1;

        assert!(bob.step().is_continue());

        assert_eq!(ctx.registry.state(BOB), Some(ActorState::Satisfied));
        assert_eq!(ctx.resource.current_owner(), ALICE);
        assert_eq!(ctx.resource.stats().transfers, 1);
    }

    #[test]
    fn test_satisfied_owner_hands_over_before_stopping() {
        let actors = vec![
            create_actor(BOB, "Bob", ALICE).with_need(false),
            create_actor(ALICE, "Alice", BOB),
        ];
        let (ctx, events) = shared(actors, BOB, Policy::Fair { threshold: 5 }, 10);

        runner(BOB, &ctx).run();

        assert_eq!(ctx.resource.current_owner(), ALICE);
        assert_eq!(ctx.budget.taken(), 1);
        let kinds: Vec<EventKind> = events.drain().into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Transferred { to: ALICE }]);
    }

    #[test]
    fn test_satisfied_owner_skips_satisfied_opponent() {
        let carol = ActorId::new(2);
        let actors = vec![
            create_actor(BOB, "Bob", ALICE).with_need(false),
            create_actor(ALICE, "Alice", carol).with_need(false),
            create_actor(carol, "Carol", BOB),
        ];
        let (ctx, _events) = shared(actors, BOB, Policy::Polite, 10);

        runner(BOB, &ctx).run();

        assert_eq!(ctx.resource.current_owner(), carol);
    }

    #[test]
    fn test_satisfied_non_owner_stops_at_once() {
        let actors = vec![
            create_actor(BOB, "Bob", ALICE),
            create_actor(ALICE, "Alice", BOB).with_need(false),
        ];
        let (ctx, _events) = shared(actors, BOB, Policy::Polite, 10);

        runner(ALICE, &ctx).run();

        assert_eq!(ctx.registry.reports()[1].waits, 0);
        assert_eq!(ctx.budget.taken(), 0);
    }
}
