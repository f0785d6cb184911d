use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use tokio::sync::Notify;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{trace, warn};
use uuid::Uuid;

use super::mailbox::{self, Mailbox, Outbox};
use crate::broker::OverflowPolicy;
use crate::broker::message::Message;

pub type SubscriberId = String;

/// Outcome of a single [`Subscriber::signal`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The message was queued in the mailbox.
    Delivered,
    /// The subscriber was (or became) inactive; nothing was queued.
    Inactive,
    /// The bounded mailbox was full and the overflow policy is `Drop`.
    Dropped,
    /// The consumer dropped its mailbox.
    Detached,
}

/// An addressable consumer registered with a [`Broker`](crate::Broker).
///
/// The broker is the authority on `active` and on topic membership: the
/// topic set here always mirrors the broker's index, and only the broker
/// mutates it. Once inactive a subscriber never becomes active again.
pub struct Subscriber<P> {
    id: SubscriberId,
    topics: RwLock<HashSet<String>>,
    active: AtomicBool,
    // `None` once destructed. The active flag is only cleared while this lock is held.
    outbox: Mutex<Option<Outbox<P>>>,
    mailbox: Mutex<Option<Mailbox<P>>>,
    retired: Notify,
    overflow: OverflowPolicy,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<P> Subscriber<P> {
    /// Create an active subscriber with a fresh id and an empty topic set.
    ///
    /// Id generation draws from the OS entropy source; failure there is
    /// unrecoverable and panics.
    pub(crate) fn new(mailbox_capacity: usize, overflow: OverflowPolicy) -> Self {
        let (outbox, mailbox) = mailbox::channel(mailbox_capacity);
        Self {
            id: Uuid::new_v4().to_string(),
            topics: RwLock::new(HashSet::new()),
            active: AtomicBool::new(true),
            outbox: Mutex::new(Some(outbox)),
            mailbox: Mutex::new(Some(mailbox)),
            retired: Notify::new(),
            overflow,
        }
    }

    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Record `topic` in the subscriber's own set. Returns `false` if it was already there.
    pub(crate) fn add_topic(&self, topic: &str) -> bool {
        self.topics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(topic.to_string())
    }

    pub(crate) fn remove_topic(&self, topic: &str) -> bool {
        self.topics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(topic)
    }

    /// Snapshot of the current subscriptions, in no particular order.
    ///
    /// Read without the broker's lock. While a subscribe or unsubscribe is
    /// in progress the set may already list a topic the index does not yet
    /// (or no longer) hold; the reverse is never observable.
    pub fn get_topics(&self) -> Vec<String> {
        self.topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(topic)
    }

    /// Hand out the consumer half of the mailbox. Only the first call gets it.
    pub fn take_mailbox(&self) -> Option<Mailbox<P>> {
        lock(&self.mailbox).take()
    }

    /// Deliver `message` to the mailbox if the subscriber is active.
    ///
    /// With a bounded mailbox and [`OverflowPolicy::Block`] this waits for
    /// capacity, for as long as it takes. The wait is abandoned if the
    /// subscriber is destructed meanwhile.
    pub async fn signal(&self, message: Message<P>) -> Delivery {
        let Some(outbox) = self.current_outbox() else {
            trace!(subscriber = %self.id, topic = message.topic(), "skipping inactive subscriber");
            return Delivery::Inactive;
        };

        let delivery = match outbox {
            Outbox::Unbounded(tx) => match tx.send(message) {
                Ok(()) => Delivery::Delivered,
                Err(_) => Delivery::Detached,
            },
            Outbox::Bounded(tx) => match self.overflow {
                OverflowPolicy::Drop => match tx.try_send(message) {
                    Ok(()) => Delivery::Delivered,
                    Err(TrySendError::Full(message)) => {
                        warn!(subscriber = %self.id, topic = message.topic(), "mailbox full, message dropped");
                        Delivery::Dropped
                    }
                    Err(TrySendError::Closed(_)) => Delivery::Detached,
                },
                OverflowPolicy::Block => self.send_or_retire(tx, message).await,
            },
        };
        trace!(subscriber = %self.id, ?delivery, "signal finished");
        delivery
    }

    async fn send_or_retire(&self, tx: mpsc::Sender<Message<P>>, message: Message<P>) -> Delivery {
        let retired = self.retired.notified();
        tokio::pin!(retired);
        retired.as_mut().enable();

        // destruct may have run between cloning the outbox and enabling the waiter
        if !self.is_active() {
            return Delivery::Inactive;
        }

        // retirement wins over a send that became possible at the same time
        tokio::select! {
            biased;
            _ = &mut retired => Delivery::Inactive,
            sent = tx.send(message) => match sent {
                Ok(()) => Delivery::Delivered,
                Err(_) => Delivery::Detached,
            },
        }
    }

    fn current_outbox(&self) -> Option<Outbox<P>> {
        let outbox = lock(&self.outbox);
        if !self.is_active() {
            return None;
        }
        outbox.clone()
    }

    /// Deactivate the subscriber and close its mailbox.
    ///
    /// Deliveries that already hold the outbox finish (or, when blocked on a
    /// full mailbox, give up) before the consumer observes end-of-stream.
    /// Returns `true` only for the call that performed the transition.
    pub fn destruct(&self) -> bool {
        let mut outbox = lock(&self.outbox);
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        outbox.take();
        drop(outbox);

        // an untaken mailbox has no reader left
        lock(&self.mailbox).take();
        self.retired.notify_waiters();
        true
    }
}

impl<P> std::fmt::Debug for Subscriber<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .field("topics", &self.get_topics())
            .field("overflow", &self.overflow)
            .finish()
    }
}
