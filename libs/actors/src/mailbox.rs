//! Actor mailboxes: an unbounded user lane plus a system-signal lane that is
//! always polled first.

use crate::messages::Message;
use tokio::sync::mpsc;

/// Runtime signals that bypass queued user messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    Stop,
}

/// Sending half, held by every local [`ActorRef`](crate::ActorRef)
pub(crate) struct Mailbox<M: Message> {
    user: mpsc::UnboundedSender<M>,
    signals: mpsc::UnboundedSender<Signal>,
}

impl<M: Message> Clone for Mailbox<M> {
    fn clone(&self) -> Self {
        Self {
            user: self.user.clone(),
            signals: self.signals.clone(),
        }
    }
}

/// Next thing for the dispatcher to process
pub(crate) enum Delivery<M> {
    Message(M),
    Stop,
}

/// Receiving half, owned by the actor's dispatcher
pub(crate) struct MailboxReceiver<M: Message> {
    user: mpsc::UnboundedReceiver<M>,
    signals: mpsc::UnboundedReceiver<Signal>,
}

impl<M: Message> Mailbox<M> {
    pub(crate) fn new() -> (Self, MailboxReceiver<M>) {
        let (user_tx, user_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        (
            Self {
                user: user_tx,
                signals: signal_tx,
            },
            MailboxReceiver {
                user: user_rx,
                signals: signal_rx,
            },
        )
    }

    /// Enqueue a user message; hands it back if the actor has stopped
    pub(crate) fn enqueue(&self, message: M) -> Result<(), M> {
        self.user.send(message).map_err(|rejected| rejected.0)
    }

    pub(crate) fn signal_sender(&self) -> mpsc::UnboundedSender<Signal> {
        self.signals.clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.user.is_closed()
    }
}

impl<M: Message> MailboxReceiver<M> {
    pub(crate) async fn recv(&mut self) -> Delivery<M> {
        tokio::select! {
            biased;

            signal = self.signals.recv() => match signal {
                Some(Signal::Stop) | None => Delivery::Stop,
            },
            message = self.user.recv() => match message {
                Some(message) => Delivery::Message(message),
                None => Delivery::Stop,
            },
        }
    }

    /// Refuse new messages and return everything still queued
    pub(crate) fn close_and_drain(&mut self) -> Vec<M> {
        self.user.close();
        self.signals.close();
        let mut undelivered = Vec::new();
        while let Ok(message) = self.user.try_recv() {
            undelivered.push(message);
        }
        undelivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signals_overtake_queued_messages() {
        let (mailbox, mut receiver) = Mailbox::<u32>::new();
        mailbox.enqueue(1).unwrap();
        mailbox.enqueue(2).unwrap();
        mailbox.signal_sender().send(Signal::Stop).unwrap();

        assert!(matches!(receiver.recv().await, Delivery::Stop));
        assert_eq!(receiver.close_and_drain(), vec![1, 2]);
        assert!(mailbox.is_closed());
        assert_eq!(mailbox.enqueue(3), Err(3));
    }

    #[tokio::test]
    async fn test_user_messages_keep_send_order() {
        let (mailbox, mut receiver) = Mailbox::<u32>::new();
        for n in 0..5 {
            mailbox.enqueue(n).unwrap();
        }
        for n in 0..5 {
            match receiver.recv().await {
                Delivery::Message(m) => assert_eq!(m, n),
                Delivery::Stop => panic!("unexpected stop"),
            }
        }
    }
}
