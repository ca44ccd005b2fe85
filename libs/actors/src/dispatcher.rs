//! Per-actor dispatcher task.
//!
//! One tokio task per actor drains its mailbox sequentially. Stop signals
//! overtake queued messages, the task yields to the scheduler after
//! `throughput` messages, and faults are routed through the supervisor.

use crate::actor_ref::ActorRef;
use crate::behavior::{self, Behavior, Failure};
use crate::context::ActorContext;
use crate::dead_letter::DeadLetterReason;
use crate::error::ActorFault;
use crate::mailbox::{Delivery, MailboxReceiver};
use crate::messages::Message;
use crate::supervision::SupervisionDecision;
use crate::system::ActorSystem;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Source of the behavior installed at spawn and on restart
pub(crate) enum Incarnation<M: Message> {
    Once(Option<Behavior<M>>),
    Factory(Box<dyn Fn() -> Behavior<M> + Send>),
}

impl<M: Message> Incarnation<M> {
    fn next(&mut self) -> Option<Behavior<M>> {
        match self {
            Self::Once(behavior) => behavior.take(),
            Self::Factory(factory) => Some(factory()),
        }
    }

    fn can_restart(&self) -> bool {
        matches!(self, Self::Factory(_))
    }
}

pub(crate) struct ActorCell<M: Message> {
    self_ref: ActorRef<M>,
    mailbox: MailboxReceiver<M>,
    incarnation: Incarnation<M>,
    system: ActorSystem,
}

impl<M: Message> ActorCell<M> {
    pub(crate) fn new(
        self_ref: ActorRef<M>,
        mailbox: MailboxReceiver<M>,
        incarnation: Incarnation<M>,
        system: ActorSystem,
    ) -> Self {
        Self {
            self_ref,
            mailbox,
            incarnation,
            system,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut ctx = ActorContext::new(self.self_ref.clone(), self.system.clone());
        let throughput = self.system.throughput();
        let mut processed = 0usize;

        let mut current = self.start(&mut ctx);
        if current.is_some() {
            debug!(actor = %self.self_ref.address(), "Actor started");
        }

        while let Some(behavior) = current.take() {
            match self.mailbox.recv().await {
                Delivery::Message(message) => {
                    current = self.deliver(behavior, &mut ctx, message);
                    processed += 1;
                    if processed >= throughput {
                        processed = 0;
                        tokio::task::yield_now().await;
                    }
                }
                Delivery::Stop => {
                    debug!(actor = %self.self_ref.address(), "Stop requested");
                }
            }
        }

        self.teardown(&ctx);
    }

    fn start(&mut self, ctx: &mut ActorContext<M>) -> Option<Behavior<M>> {
        loop {
            let initial = match self.incarnation.next() {
                Some(initial) => initial,
                None => {
                    warn!(
                        actor = %self.self_ref.address(),
                        "No behavior factory; actor cannot be restarted"
                    );
                    return None;
                }
            };

            match behavior::install(initial, ctx) {
                Ok(installed) if installed.is_stopped() => return None,
                Ok(installed) => return Some(installed),
                Err(fault) => match self.decide(&fault) {
                    SupervisionDecision::Restart => {
                        self.system.metrics().record_restart();
                        continue;
                    }
                    _ => return None,
                },
            }
        }
    }

    fn deliver(
        &mut self,
        current: Behavior<M>,
        ctx: &mut ActorContext<M>,
        message: M,
    ) -> Option<Behavior<M>> {
        let started = Instant::now();
        match behavior::interpret(current, ctx, message) {
            Ok(next) => {
                self.system.metrics().record_message_handled(started.elapsed());
                if next.is_stopped() {
                    debug!(actor = %self.self_ref.address(), "Behavior stopped");
                    None
                } else {
                    Some(next)
                }
            }
            Err(Failure { behavior, fault }) => match self.decide(&fault) {
                SupervisionDecision::Resume => {
                    debug!(actor = %self.self_ref.address(), "Resuming after fault");
                    Some(behavior)
                }
                SupervisionDecision::Restart if self.incarnation.can_restart() => {
                    drop(behavior);
                    self.system.metrics().record_restart();
                    info!(actor = %self.self_ref.address(), "Restarting actor");
                    self.start(ctx)
                }
                SupervisionDecision::Restart => {
                    warn!(
                        actor = %self.self_ref.address(),
                        "Restart requested for an actor without a behavior factory; stopping"
                    );
                    None
                }
                SupervisionDecision::Stop => None,
            },
        }
    }

    fn decide(&self, fault: &ActorFault) -> SupervisionDecision {
        let address = self.self_ref.address();
        self.system.metrics().record_fault();
        let decision = self.system.supervisor().on_fault(address, fault);
        error!(
            actor = %address,
            fault = %fault,
            fault_category = fault.category(),
            decision = ?decision,
            "Actor fault"
        );
        decision
    }

    fn teardown(&mut self, ctx: &ActorContext<M>) {
        let address = self.self_ref.address().clone();
        let undelivered = self.mailbox.close_and_drain();
        let dropped = undelivered.len();
        let dead_letters = self.system.dead_letters();
        for message in undelivered {
            dead_letters.publish(&address, message, DeadLetterReason::RecipientStopped);
        }

        for child in ctx.children() {
            self.system.stop_address(child);
        }
        self.system.unregister(&address);

        info!(actor = %address, dropped_messages = dropped, "Actor stopped");
    }
}
