//! Behavior Engine
//!
//! A [`Behavior`] is the message-handling policy currently installed in an
//! actor. Every delivery returns the next policy:
//!
//! - `Receive(handler)` replaces the current behavior
//! - `Same` keeps the current behavior, captured state included
//! - `Stopped` ends the actor; queued messages become dead letters
//! - `Setup(on_start)` runs as soon as it is installed and is replaced by
//!   whatever it returns
//!
//! `Same` and `Setup` are resolved here, at the dispatcher boundary, so an
//! actor only ever holds `Receive` or `Stopped`.

use crate::context::ActorContext;
use crate::error::ActorFault;
use crate::messages::Message;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Message handler of a `Receive` behavior
pub type Handler<M> =
    Box<dyn FnMut(&mut ActorContext<M>, M) -> Result<Behavior<M>, ActorFault> + Send>;

/// Start hook of a `Setup` behavior
pub type OnStart<M> = Box<dyn FnOnce(&mut ActorContext<M>) -> Result<Behavior<M>, ActorFault> + Send>;

pub enum Behavior<M: Message> {
    Receive(Handler<M>),
    Setup(OnStart<M>),
    Same,
    Stopped,
}

impl<M: Message> Behavior<M> {
    pub fn receive<F>(handler: F) -> Self
    where
        F: FnMut(&mut ActorContext<M>, M) -> Result<Behavior<M>, ActorFault> + Send + 'static,
    {
        Self::Receive(Box::new(handler))
    }

    /// Handler that does not need the context
    pub fn receive_message<F>(mut handler: F) -> Self
    where
        F: FnMut(M) -> Result<Behavior<M>, ActorFault> + Send + 'static,
    {
        Self::receive(move |_, message| handler(message))
    }

    pub fn setup<F>(on_start: F) -> Self
    where
        F: FnOnce(&mut ActorContext<M>) -> Result<Behavior<M>, ActorFault> + Send + 'static,
    {
        Self::Setup(Box::new(on_start))
    }

    pub fn same() -> Self {
        Self::Same
    }

    pub fn stopped() -> Self {
        Self::Stopped
    }

    /// Accept and discard every message
    pub fn ignore() -> Self {
        Self::receive_message(|_| Ok(Behavior::same()))
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    pub fn is_same(&self) -> bool {
        matches!(self, Self::Same)
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Receive(_) => "Receive",
            Self::Setup(_) => "Setup",
            Self::Same => "Same",
            Self::Stopped => "Stopped",
        }
    }
}

impl<M: Message> fmt::Debug for Behavior<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Behavior::{}", self.kind())
    }
}

/// A fault together with the behavior that was current when it happened
pub struct Failure<M: Message> {
    pub behavior: Behavior<M>,
    pub fault: ActorFault,
}

impl<M: Message> fmt::Debug for Failure<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("behavior", &self.behavior)
            .field("fault", &self.fault)
            .finish()
    }
}

/// Deliver `message` to `behavior` and return the resolved next behavior.
///
/// The result is never `Same` or `Setup`. Only `Receive` can accept a
/// message; any other variant is reported as an invalid-behavior fault.
pub fn interpret<M: Message>(
    behavior: Behavior<M>,
    ctx: &mut ActorContext<M>,
    message: M,
) -> Result<Behavior<M>, Failure<M>> {
    let mut handler = match behavior {
        Behavior::Receive(handler) => handler,
        other => {
            let fault = ActorFault::invalid_behavior(format!(
                "{:?} cannot receive messages",
                other
            ));
            return Err(Failure {
                behavior: other,
                fault,
            });
        }
    };

    let outcome = guarded(|| handler(ctx, message));
    let current = Behavior::Receive(handler);
    match outcome {
        Ok(next) => resolve(next, current, ctx),
        Err(fault) => Err(Failure {
            behavior: current,
            fault,
        }),
    }
}

/// Resolve the behavior installed at spawn or restart
pub(crate) fn install<M: Message>(
    initial: Behavior<M>,
    ctx: &mut ActorContext<M>,
) -> Result<Behavior<M>, ActorFault> {
    let mut next = initial;
    loop {
        match next {
            Behavior::Same => {
                return Err(ActorFault::invalid_behavior(
                    "Same has no preceding behavior to keep",
                ))
            }
            Behavior::Setup(on_start) => next = guarded(|| on_start(ctx))?,
            other => return Ok(other),
        }
    }
}

// Setup chains run immediately; Same means `current`.
fn resolve<M: Message>(
    next: Behavior<M>,
    current: Behavior<M>,
    ctx: &mut ActorContext<M>,
) -> Result<Behavior<M>, Failure<M>> {
    let mut next = next;
    loop {
        match next {
            Behavior::Same => return Ok(current),
            Behavior::Setup(on_start) => match guarded(|| on_start(ctx)) {
                Ok(resolved) => next = resolved,
                Err(fault) => {
                    return Err(Failure {
                        behavior: current,
                        fault,
                    })
                }
            },
            other => return Ok(other),
        }
    }
}

fn guarded<T>(body: impl FnOnce() -> Result<T, ActorFault>) -> Result<T, ActorFault> {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => result,
        Err(payload) => Err(ActorFault::Panicked(panic_message(payload))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
