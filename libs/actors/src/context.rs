//! Per-actor context handed to handlers and setup hooks.

use crate::actor_ref::ActorRef;
use crate::address::ActorAddress;
use crate::behavior::Behavior;
use crate::error::{ActorError, Result};
use crate::messages::Message;
use crate::system::ActorSystem;
use crate::timing::{deadline_after, FAR_FUTURE};
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;

/// Cancels a scheduled message.
///
/// Dropping the handle leaves the timer running; timers also end on their
/// own once the owning actor stops.
#[derive(Debug)]
pub struct TimerHandle {
    task: AbortHandle,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }
}

/// What a running actor can see of itself and its system
pub struct ActorContext<M: Message> {
    self_ref: ActorRef<M>,
    system: ActorSystem,
    children: Vec<ActorAddress>,
}

impl<M: Message> ActorContext<M> {
    pub(crate) fn new(self_ref: ActorRef<M>, system: ActorSystem) -> Self {
        Self {
            self_ref,
            system,
            children: Vec::new(),
        }
    }

    pub fn self_ref(&self) -> &ActorRef<M> {
        &self.self_ref
    }

    pub fn address(&self) -> &ActorAddress {
        self.self_ref.address()
    }

    pub fn system(&self) -> &ActorSystem {
        &self.system
    }

    /// Spawn a child; children stop when this actor stops
    pub fn spawn<C: Message>(&mut self, behavior: Behavior<C>, name: &str) -> Result<ActorRef<C>> {
        crate::system::validate_name(name)?;
        self.spawn_child(behavior, name)
    }

    pub fn spawn_anonymous<C: Message>(&mut self, behavior: Behavior<C>) -> Result<ActorRef<C>> {
        let name = self.system.next_name();
        self.spawn_child(behavior, &name)
    }

    fn spawn_child<C: Message>(&mut self, behavior: Behavior<C>, name: &str) -> Result<ActorRef<C>> {
        let address = self.address().child(name);
        let child = self.system.spawn_once_at(address, behavior)?;
        self.children.push(child.address().clone());
        Ok(child)
    }

    pub(crate) fn children(&self) -> &[ActorAddress] {
        &self.children
    }

    /// Deliver `message` to this actor once `target` stops
    pub fn watch_with<T: Message>(&self, target: &ActorRef<T>, message: M) {
        let me = self.self_ref.clone();
        self.system
            .watch(target.address(), move || me.tell(message));
    }

    /// Ask without blocking the actor.
    ///
    /// The reply, or the timeout, is turned into a message for this actor by
    /// `adapt` and arrives through the mailbox like any other message.
    pub fn ask<T, R, F, A>(&self, target: &ActorRef<T>, timeout: Duration, build: F, adapt: A)
    where
        T: Message,
        R: Message,
        F: FnOnce(ActorRef<R>) -> T,
        A: FnOnce(std::result::Result<R, ActorError>) -> M + Send + 'static,
    {
        let response = target.ask(timeout, build);
        let me = self.self_ref.clone();
        self.system.runtime().spawn(async move {
            me.tell(adapt(response.await));
        });
    }

    /// Send `message` to this actor after `delay`
    pub fn schedule_once(&self, delay: Duration, message: M) -> TimerHandle {
        let me = self.self_ref.clone();
        let task = self.system.runtime().spawn(async move {
            tokio::time::sleep(delay).await;
            if !me.is_terminated() {
                me.tell(message);
            }
        });
        TimerHandle {
            task: task.abort_handle(),
        }
    }

    /// Send `make()` to this actor every `interval`, first after `initial_delay`
    pub fn schedule_repeatedly<F>(&self, initial_delay: Duration, interval: Duration, make: F) -> TimerHandle
    where
        F: Fn() -> M + Send + 'static,
    {
        let me = self.self_ref.clone();
        let interval = interval.clamp(Duration::from_millis(1), FAR_FUTURE);
        let task = self.system.runtime().spawn(async move {
            let mut ticker = tokio::time::interval_at(deadline_after(initial_delay), interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if me.is_terminated() {
                    break;
                }
                me.tell(make());
            }
        });
        TimerHandle {
            task: task.abort_handle(),
        }
    }

    #[cfg(test)]
    pub(crate) fn detached(system: &ActorSystem, path: &str) -> Self {
        let address = ActorAddress::new(system.node_id().clone(), path);
        Self::new(system.dead_ref(address), system.clone())
    }
}
