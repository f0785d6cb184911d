//! Per-subscriber delivery queue.
//!
//! The queue is a Tokio mpsc channel. The producer half (`Outbox`) stays
//! inside the subscriber and is cloned by each delivery task; the consumer
//! half (`Mailbox`) belongs to whoever consumes the subscriber. A capacity
//! of `0` selects an unbounded channel: publishers never wait, at the cost
//! of unbounded memory growth behind a consumer that does not drain.

use futures::Stream;
use tokio::sync::mpsc;

use crate::broker::message::Message;

pub(crate) enum Outbox<P> {
    Bounded(mpsc::Sender<Message<P>>),
    Unbounded(mpsc::UnboundedSender<Message<P>>),
}

impl<P> Clone for Outbox<P> {
    fn clone(&self) -> Self {
        match self {
            Outbox::Bounded(tx) => Outbox::Bounded(tx.clone()),
            Outbox::Unbounded(tx) => Outbox::Unbounded(tx.clone()),
        }
    }
}

enum Inbox<P> {
    Bounded(mpsc::Receiver<Message<P>>),
    Unbounded(mpsc::UnboundedReceiver<Message<P>>),
}

/// Consumer half of a subscriber's mailbox.
///
/// `recv` yields `None` once the subscriber has been removed and every
/// message already queued has been drained.
pub struct Mailbox<P> {
    inner: Inbox<P>,
}

pub(crate) fn channel<P>(capacity: usize) -> (Outbox<P>, Mailbox<P>) {
    if capacity == 0 {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Outbox::Unbounded(tx),
            Mailbox {
                inner: Inbox::Unbounded(rx),
            },
        )
    } else {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Outbox::Bounded(tx),
            Mailbox {
                inner: Inbox::Bounded(rx),
            },
        )
    }
}

impl<P> Mailbox<P> {
    /// Wait for the next message.
    pub async fn recv(&mut self) -> Option<Message<P>> {
        match &mut self.inner {
            Inbox::Bounded(rx) => rx.recv().await,
            Inbox::Unbounded(rx) => rx.recv().await,
        }
    }

    /// Take a message if one is queued, without waiting.
    pub fn try_recv(&mut self) -> Option<Message<P>> {
        match &mut self.inner {
            Inbox::Bounded(rx) => rx.try_recv().ok(),
            Inbox::Unbounded(rx) => rx.try_recv().ok(),
        }
    }

    /// Number of messages currently queued.
    pub fn len(&self) -> usize {
        match &self.inner {
            Inbox::Bounded(rx) => rx.len(),
            Inbox::Unbounded(rx) => rx.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Turn the mailbox into a stream that ends when the subscriber is removed.
    pub fn into_stream(self) -> impl Stream<Item = Message<P>> {
        futures::stream::unfold(self, |mut mailbox| async move {
            let message = mailbox.recv().await?;
            Some((message, mailbox))
        })
    }
}

impl<P> std::fmt::Debug for Mailbox<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.inner {
            Inbox::Bounded(_) => "bounded",
            Inbox::Unbounded(_) => "unbounded",
        };
        f.debug_struct("Mailbox")
            .field("kind", &kind)
            .field("queued", &self.len())
            .finish()
    }
}
