//! Dead Letters
//!
//! Messages that cannot be delivered are never reported to the sender.
//! They are handed to a [`DeadLetterSink`] together with the intended
//! recipient and the reason delivery failed.

use crate::address::ActorAddress;
use crate::messages::Message;
use crate::metrics::SystemMetrics;
use parking_lot::Mutex;
use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Why a message ended up in dead letters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeadLetterReason {
    /// Recipient stopped, or never existed on this node
    RecipientStopped,
    /// Transport refused the message for the recipient's node
    Unreachable(String),
    /// Message could not be encoded for the wire
    Unencodable(String),
    /// Remote message for an actor that was not exported
    NotExported,
    /// Second reply to an ask that already completed or timed out
    ReplyAlreadyCompleted,
    /// Reply to an ask whose caller dropped the response handle
    ReplyAbandoned,
}

impl fmt::Display for DeadLetterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecipientStopped => f.write_str("recipient stopped"),
            Self::Unreachable(reason) => write!(f, "unreachable: {}", reason),
            Self::Unencodable(reason) => write!(f, "unencodable: {}", reason),
            Self::NotExported => f.write_str("not exported"),
            Self::ReplyAlreadyCompleted => f.write_str("reply already completed"),
            Self::ReplyAbandoned => f.write_str("reply abandoned"),
        }
    }
}

/// An undeliverable message
pub struct DeadLetter {
    pub recipient: ActorAddress,
    pub message_type: Cow<'static, str>,
    pub message: Box<dyn Any + Send>,
    pub reason: DeadLetterReason,
}

impl DeadLetter {
    pub fn downcast_ref<M: 'static>(&self) -> Option<&M> {
        self.message.downcast_ref::<M>()
    }
}

impl fmt::Debug for DeadLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadLetter")
            .field("recipient", &self.recipient)
            .field("message_type", &self.message_type)
            .field("reason", &self.reason)
            .finish()
    }
}

/// Receiver of every undeliverable message in an actor system
pub trait DeadLetterSink: Send + Sync + fmt::Debug {
    fn record(&self, letter: DeadLetter);
}

/// Default sink: logs each letter and keeps a count
#[derive(Debug, Default)]
pub struct LoggingDeadLetterSink {
    recorded: AtomicU64,
}

impl LoggingDeadLetterSink {
    pub fn recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }
}

impl DeadLetterSink for LoggingDeadLetterSink {
    fn record(&self, letter: DeadLetter) {
        let total = self.recorded.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            recipient = %letter.recipient,
            message_type = %letter.message_type,
            reason = %letter.reason,
            total_dead_letters = total,
            "Dead letter"
        );
    }
}

/// Sink that keeps letters for later inspection
#[derive(Debug, Default)]
pub struct DeadLetterRecorder {
    letters: Mutex<Vec<DeadLetter>>,
}

impl DeadLetterRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.letters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.letters.lock().is_empty()
    }

    /// Remove and return every recorded letter
    pub fn take(&self) -> Vec<DeadLetter> {
        std::mem::take(&mut *self.letters.lock())
    }

    /// Remove the letters carrying an `M`, returning their messages in arrival order
    pub fn take_messages<M: 'static>(&self) -> Vec<M> {
        let mut letters = self.letters.lock();
        let mut taken = Vec::new();
        let mut kept = Vec::with_capacity(letters.len());
        for letter in letters.drain(..) {
            if letter.message.is::<M>() {
                if let Ok(message) = letter.message.downcast::<M>() {
                    taken.push(*message);
                }
            } else {
                kept.push(letter);
            }
        }
        *letters = kept;
        taken
    }
}

impl DeadLetterSink for DeadLetterRecorder {
    fn record(&self, letter: DeadLetter) {
        self.letters.lock().push(letter);
    }
}

/// Sink plus counters, shared by every reference of one system
#[derive(Clone)]
pub(crate) struct DeadLetters {
    sink: Arc<dyn DeadLetterSink>,
    metrics: Arc<SystemMetrics>,
}

impl DeadLetters {
    pub(crate) fn new(sink: Arc<dyn DeadLetterSink>, metrics: Arc<SystemMetrics>) -> Self {
        Self { sink, metrics }
    }

    pub(crate) fn publish<M: Message>(
        &self,
        recipient: &ActorAddress,
        message: M,
        reason: DeadLetterReason,
    ) {
        self.publish_letter(DeadLetter {
            recipient: recipient.clone(),
            message_type: Cow::Borrowed(std::any::type_name::<M>()),
            message: Box::new(message),
            reason,
        });
    }

    pub(crate) fn publish_letter(&self, letter: DeadLetter) {
        self.metrics.record_dead_letter();
        self.sink.record(letter);
    }
}
