//! Behavior-Driven Actor Runtime
//!
//! Actors are isolated, message-driven units whose message handling is an
//! explicit, replaceable [`Behavior`] value. They are reached only through
//! location-transparent [`ActorRef`]s: the same handle type covers local
//! mailboxes, ask reply destinations, and actors on other nodes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────── ActorSystem (node "a") ─────────────────┐
//! │                                                          │
//! │  ActorRef ──tell──▶ Mailbox ──▶ dispatcher task          │
//! │     │              (signals,     interpret(Behavior)     │
//! │     │               user lane)   └─ fault ─▶ Supervisor  │
//! │     │                                                    │
//! │     └─ remote ─▶ WireEnvelope ─▶ Transport ──────────────┼──▶ node "b"
//! │                                                          │   deliver_inbound
//! │  undeliverable ─────────────────▶ DeadLetterSink         │   ─▶ exported actor
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust
//! use mycelium_actors::{ActorRef, ActorSystem, Behavior};
//! use std::time::Duration;
//!
//! enum Greeter {
//!     Greet { name: String, reply_to: ActorRef<String> },
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> mycelium_actors::Result<()> {
//! let system = ActorSystem::builder().node_id("local").build()?;
//! let greeter = system.spawn(
//!     Behavior::receive_message(|Greeter::Greet { name, reply_to }| {
//!         reply_to.tell(format!("hello, {}", name));
//!         Ok(Behavior::same())
//!     }),
//!     "greeter",
//! )?;
//!
//! let reply = greeter
//!     .ask(Duration::from_secs(1), |reply_to| Greeter::Greet {
//!         name: "mycelium".to_string(),
//!         reply_to,
//!     })
//!     .await?;
//! assert_eq!(reply, "hello, mycelium");
//! # Ok(())
//! # }
//! ```

pub mod actor_ref;
pub mod address;
pub mod behavior;
pub mod context;
pub mod dead_letter;
mod dispatcher;
pub mod error;
mod mailbox;
pub mod messages;
pub mod metrics;
pub mod naming;
pub mod supervision;
pub mod system;
mod timing;
pub mod transport;

pub use actor_ref::{ActorRef, AskResponse, Undelivered};
pub use address::{ActorAddress, NodeId};
pub use behavior::{interpret, Behavior, Failure};
pub use context::{ActorContext, TimerHandle};
pub use dead_letter::{
    DeadLetter, DeadLetterReason, DeadLetterRecorder, DeadLetterSink, LoggingDeadLetterSink,
};
pub use error::{ActorError, ActorFault, Result};
pub use messages::{Message, RemoteMessage, WireEnvelope};
pub use metrics::{SystemMetrics, SystemStats};
pub use naming::NameGenerator;
pub use supervision::{
    supervisor_from_settings, RestartSupervisor, ResumeSupervisor, StopSupervisor,
    SupervisionDecision, Supervisor,
};
pub use system::{ActorSystem, ActorSystemBuilder};
pub use transport::{InMemoryNetwork, Transport, TransportMetrics, TransportStats};
