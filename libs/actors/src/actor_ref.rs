//! Actor References
//!
//! An [`ActorRef`] is the only way to reach an actor. The same type covers a
//! local mailbox, the hidden one-shot reply destination of an `ask`, an
//! actor on another node, and a reference that can no longer deliver
//! anything. Senders never observe which one they hold: `tell` always
//! succeeds from the caller's point of view and undeliverable messages go to
//! dead letters.

use crate::address::{ActorAddress, NodeId};
use crate::dead_letter::{DeadLetterReason, DeadLetters};
use crate::error::{ActorError, Result};
use crate::mailbox::Mailbox;
use crate::messages::{Message, WireEnvelope};
use crate::naming::encode_name;
use crate::timing::{deadline_after, saturating_millis};
use crate::transport::Transport;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

static TEMP_NAMES: AtomicU64 = AtomicU64::new(0);

pub(crate) type EncodeFn<M> = fn(NodeId, ActorAddress, &M) -> Result<WireEnvelope>;

pub(crate) struct RemoteEndpoint<M: Message> {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) local_node: NodeId,
    pub(crate) encode: EncodeFn<M>,
}

type PromiseSlot<M> = Arc<Mutex<Option<oneshot::Sender<M>>>>;

enum Endpoint<M: Message> {
    Local(Mailbox<M>),
    Promise(PromiseSlot<M>),
    Remote(RemoteEndpoint<M>),
    Dead(DeadLetterReason),
}

struct RefInner<M: Message> {
    address: ActorAddress,
    endpoint: Endpoint<M>,
    dead_letters: DeadLetters,
}

/// A message handed back by [`ActorRef::try_tell`]
#[derive(Debug)]
pub struct Undelivered<M> {
    pub message: M,
    pub reason: DeadLetterReason,
}

/// Location-transparent handle to an actor accepting `M`
pub struct ActorRef<M: Message> {
    inner: Arc<RefInner<M>>,
}

impl<M: Message> ActorRef<M> {
    pub(crate) fn local(address: ActorAddress, mailbox: Mailbox<M>, dead_letters: DeadLetters) -> Self {
        Self::with_endpoint(address, Endpoint::Local(mailbox), dead_letters)
    }

    pub(crate) fn remote(
        address: ActorAddress,
        remote: RemoteEndpoint<M>,
        dead_letters: DeadLetters,
    ) -> Self {
        Self::with_endpoint(address, Endpoint::Remote(remote), dead_letters)
    }

    pub(crate) fn dead(
        address: ActorAddress,
        reason: DeadLetterReason,
        dead_letters: DeadLetters,
    ) -> Self {
        Self::with_endpoint(address, Endpoint::Dead(reason), dead_letters)
    }

    fn with_endpoint(address: ActorAddress, endpoint: Endpoint<M>, dead_letters: DeadLetters) -> Self {
        Self {
            inner: Arc::new(RefInner {
                address,
                endpoint,
                dead_letters,
            }),
        }
    }

    pub fn address(&self) -> &ActorAddress {
        &self.inner.address
    }

    pub fn is_local(&self) -> bool {
        matches!(self.inner.endpoint, Endpoint::Local(_) | Endpoint::Promise(_))
    }

    /// Whether this reference can no longer deliver anything.
    ///
    /// Remote references are never known to be terminated.
    pub fn is_terminated(&self) -> bool {
        match &self.inner.endpoint {
            Endpoint::Local(mailbox) => mailbox.is_closed(),
            Endpoint::Promise(slot) => slot.lock().as_ref().map_or(true, |sender| sender.is_closed()),
            Endpoint::Remote(_) => false,
            Endpoint::Dead(_) => true,
        }
    }

    /// Fire-and-forget send; undeliverable messages become dead letters
    pub fn tell(&self, message: M) {
        if let Err(undelivered) = self.try_tell(message) {
            debug!(
                recipient = %self.inner.address,
                reason = %undelivered.reason,
                "Message undeliverable"
            );
            self.inner
                .dead_letters
                .publish(&self.inner.address, undelivered.message, undelivered.reason);
        }
    }

    /// Send, handing the message back instead of dead-lettering it
    pub fn try_tell(&self, message: M) -> std::result::Result<(), Undelivered<M>> {
        match &self.inner.endpoint {
            Endpoint::Local(mailbox) => mailbox.enqueue(message).map_err(|message| Undelivered {
                message,
                reason: DeadLetterReason::RecipientStopped,
            }),
            Endpoint::Promise(slot) => {
                let sender = slot.lock().take();
                match sender {
                    Some(sender) => sender.send(message).map_err(|message| Undelivered {
                        message,
                        reason: DeadLetterReason::ReplyAbandoned,
                    }),
                    None => Err(Undelivered {
                        message,
                        reason: DeadLetterReason::ReplyAlreadyCompleted,
                    }),
                }
            }
            Endpoint::Remote(remote) => self.send_remote(remote, message),
            Endpoint::Dead(reason) => Err(Undelivered {
                message,
                reason: reason.clone(),
            }),
        }
    }

    fn send_remote(
        &self,
        remote: &RemoteEndpoint<M>,
        message: M,
    ) -> std::result::Result<(), Undelivered<M>> {
        let address = &self.inner.address;
        let bytes = match (remote.encode)(remote.local_node.clone(), address.clone(), &message)
            .and_then(|envelope| envelope.encode())
        {
            Ok(bytes) => bytes,
            Err(e) => {
                return Err(Undelivered {
                    message,
                    reason: DeadLetterReason::Unencodable(e.to_string()),
                })
            }
        };
        remote
            .transport
            .send(&address.node, bytes)
            .map_err(|e| Undelivered {
                message,
                reason: DeadLetterReason::Unreachable(e.to_string()),
            })
    }

    /// Request/response over `tell`.
    ///
    /// `build` receives a one-shot reply destination and returns the request.
    /// The deadline is fixed now; the response resolves with the first reply
    /// or with [`ActorError::Timeout`] at or after the deadline. Later replies
    /// go to dead letters.
    pub fn ask<R, F>(&self, timeout: Duration, build: F) -> AskResponse<R>
    where
        R: Message,
        F: FnOnce(ActorRef<R>) -> M,
    {
        let deadline = deadline_after(timeout);
        let (sender, receiver) = oneshot::channel();
        let slot: PromiseSlot<R> = Arc::new(Mutex::new(Some(sender)));
        let reply_to = ActorRef::with_endpoint(
            self.temp_address(),
            Endpoint::Promise(slot.clone()),
            self.inner.dead_letters.clone(),
        );

        self.tell(build(reply_to));

        let operation = format!("ask {}", self.inner.address);
        let timeout_ms = saturating_millis(timeout);
        let future = async move {
            let outcome = tokio::time::timeout_at(deadline, receiver).await;
            slot.lock().take();
            match outcome {
                Ok(Ok(reply)) => Ok(reply),
                Ok(Err(_)) => {
                    tokio::time::sleep_until(deadline).await;
                    Err(ActorError::timeout(operation, timeout_ms))
                }
                Err(_) => Err(ActorError::timeout(operation, timeout_ms)),
            }
        }
        .boxed();

        AskResponse { future }
    }

    fn temp_address(&self) -> ActorAddress {
        let node = match &self.inner.endpoint {
            Endpoint::Remote(remote) => remote.local_node.clone(),
            _ => self.inner.address.node.clone(),
        };
        let id = TEMP_NAMES.fetch_add(1, Ordering::Relaxed);
        ActorAddress::new(node, format!("$temp/{}", encode_name(id)))
    }
}

impl<M: Message> Clone for ActorRef<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: Message> PartialEq for ActorRef<M> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.address == other.inner.address
    }
}

impl<M: Message> Eq for ActorRef<M> {}

impl<M: Message> Hash for ActorRef<M> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.address.hash(state);
    }
}

impl<M: Message> PartialOrd for ActorRef<M> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl<M: Message> Ord for ActorRef<M> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.inner.address.cmp(&other.inner.address)
    }
}

impl<M: Message> fmt::Debug for ActorRef<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorRef({})", self.inner.address)
    }
}

impl<M: Message> fmt::Display for ActorRef<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner.address, f)
    }
}

/// Pending reply of an [`ActorRef::ask`]; dropping it abandons the wait
pub struct AskResponse<R> {
    future: BoxFuture<'static, Result<R>>,
}

impl<R> Future for AskResponse<R> {
    type Output = Result<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

impl<R> fmt::Debug for AskResponse<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AskResponse")
    }
}
