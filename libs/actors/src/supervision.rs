//! Supervision
//!
//! A fault in a handler is isolated to its actor and turned into an
//! [`ActorFault`] value. The system's [`Supervisor`] decides what happens
//! next; nothing is reported to the sender of the failing message.
//!
//! Restart windows follow a simple rule: at most `max_restarts` restarts
//! per actor inside a sliding `window`, after which the actor is stopped.

use crate::address::ActorAddress;
use crate::error::ActorFault;
use crate::timing::saturating_millis;
use mycelium_config::{SupervisionSettings, SupervisionStrategy};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// What to do with an actor after a fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionDecision {
    /// Keep the behavior that was current when the fault happened
    Resume,
    /// Install a fresh behavior from the actor's factory
    Restart,
    /// Stop the actor
    Stop,
}

pub trait Supervisor: Send + Sync + fmt::Debug {
    fn on_fault(&self, actor: &ActorAddress, fault: &ActorFault) -> SupervisionDecision;

    /// Called once the actor is gone, to release per-actor bookkeeping
    fn on_stopped(&self, _actor: &ActorAddress) {}
}

/// Let it crash
#[derive(Debug, Default, Clone, Copy)]
pub struct StopSupervisor;

impl Supervisor for StopSupervisor {
    fn on_fault(&self, _actor: &ActorAddress, _fault: &ActorFault) -> SupervisionDecision {
        SupervisionDecision::Stop
    }
}

/// Ignore handler failures; invalid behaviors still stop the actor
#[derive(Debug, Default, Clone, Copy)]
pub struct ResumeSupervisor;

impl Supervisor for ResumeSupervisor {
    fn on_fault(&self, _actor: &ActorAddress, fault: &ActorFault) -> SupervisionDecision {
        match fault {
            ActorFault::InvalidBehavior(_) => SupervisionDecision::Stop,
            _ => SupervisionDecision::Resume,
        }
    }
}

#[derive(Debug)]
struct RestartWindow {
    started: Instant,
    restarts: u32,
}

/// Restart faulty actors until they exceed their restart budget
#[derive(Debug)]
pub struct RestartSupervisor {
    max_restarts: u32,
    window: Duration,
    windows: Mutex<HashMap<ActorAddress, RestartWindow>>,
}

impl RestartSupervisor {
    pub fn new(max_restarts: u32, window: Duration) -> Self {
        Self {
            max_restarts,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn should_restart(&self, actor: &ActorAddress) -> bool {
        if self.max_restarts == 0 {
            return false;
        }

        let now = Instant::now();
        let mut windows = self.windows.lock();
        let window = windows.entry(actor.clone()).or_insert(RestartWindow {
            started: now,
            restarts: 0,
        });

        if now.duration_since(window.started) > self.window {
            window.started = now;
            window.restarts = 0;
        }
        window.restarts += 1;
        window.restarts <= self.max_restarts
    }
}

impl Supervisor for RestartSupervisor {
    fn on_fault(&self, actor: &ActorAddress, fault: &ActorFault) -> SupervisionDecision {
        if matches!(fault, ActorFault::InvalidBehavior(_)) {
            return SupervisionDecision::Stop;
        }
        if self.should_restart(actor) {
            SupervisionDecision::Restart
        } else {
            warn!(
                actor = %actor,
                max_restarts = self.max_restarts,
                window_ms = saturating_millis(self.window),
                "Actor exceeded restart limit"
            );
            SupervisionDecision::Stop
        }
    }

    fn on_stopped(&self, actor: &ActorAddress) {
        self.windows.lock().remove(actor);
    }
}

/// Build the supervisor selected by configuration
pub fn supervisor_from_settings(settings: &SupervisionSettings) -> Arc<dyn Supervisor> {
    match settings.strategy {
        SupervisionStrategy::Stop => Arc::new(StopSupervisor),
        SupervisionStrategy::Resume => Arc::new(ResumeSupervisor),
        SupervisionStrategy::Restart => Arc::new(RestartSupervisor::new(
            settings.max_restarts,
            Duration::from_millis(settings.restart_window_ms),
        )),
    }
}
