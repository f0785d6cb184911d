//! Broker engine
//!
//! This module contains the in-memory broker implementation responsible for:
//! - keeping the registry of subscribers and the topic index in agreement
//! - resolving a published topic to its subscribers (exact and wildcard keys)
//! - fanning messages out to subscriber mailboxes
//!
//! Concurrency and usage notes:
//! - The broker is meant to be shared as `Arc<Broker<P>>`. Every method takes
//!   `&self`; the registry sits behind a single `RwLock`. Structural changes
//!   take the write lock, lookups the read lock, and the lock is never held
//!   across a delivery.
//! - Delivery is fire-and-forget. `publish` and the broadcast variants spawn
//!   one Tokio task per target and return straight away, so they must be
//!   called from within a Tokio runtime. Deliveries carry no ordering
//!   guarantee, not even between two messages for the same subscriber.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::message::Message;
use super::options::BrokerConfig;
use super::topic::{Topic, matching_keys};
use crate::subscriber::{Subscriber, SubscriberId};
use crate::utils::error::BrokerError;

struct Registry<P> {
    subscribers: HashMap<SubscriberId, Arc<Subscriber<P>>>,
    topics: BTreeMap<String, Topic<P>>,
}

/// Routes published messages to the subscribers registered for them.
pub struct Broker<P> {
    registry: RwLock<Registry<P>>,
    config: BrokerConfig,
}

impl<P> Default for Broker<P> {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

impl<P> Broker<P> {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            registry: RwLock::new(Registry {
                subscribers: HashMap::new(),
                topics: BTreeMap::new(),
            }),
            config,
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry<P>> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry<P>> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create and register a new subscriber.
    ///
    /// Fails with [`BrokerError::CapacityExceeded`] once `max_subscribers`
    /// subscribers are registered.
    pub fn add_subscriber(&self) -> Result<Arc<Subscriber<P>>, BrokerError> {
        let mut registry = self.write();

        let max = self.config.max_subscribers;
        if max != 0 && registry.subscribers.len() >= max {
            warn!(max, "subscriber limit reached, refusing new subscriber");
            return Err(BrokerError::CapacityExceeded { max });
        }

        let subscriber = Arc::new(Subscriber::new(
            self.config.mailbox_capacity,
            self.config.overflow,
        ));
        registry
            .subscribers
            .insert(subscriber.id().clone(), subscriber.clone());

        info!(subscriber = %subscriber.id(), "subscriber added");
        Ok(subscriber)
    }

    /// Subscribe to `topic`. Subscribing twice is a no-op.
    ///
    /// The subscriber must still be registered with this broker.
    pub fn subscribe(&self, subscriber: &Subscriber<P>, topic: &str) -> Result<(), BrokerError> {
        let mut registry = self.write();

        let Some(registered) = Self::registered(&registry, subscriber).cloned() else {
            return Err(BrokerError::UnknownSubscriber(subscriber.id().clone()));
        };

        // the subscriber's own set is updated first, the index second
        if subscriber.add_topic(topic) {
            debug!(subscriber = %subscriber.id(), topic, "subscribed");
        }
        registry
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic))
            .subscribe(registered);
        Ok(())
    }

    /// The registry's handle for `subscriber`, if it is this very subscriber.
    fn registered<'a>(
        registry: &'a Registry<P>,
        subscriber: &Subscriber<P>,
    ) -> Option<&'a Arc<Subscriber<P>>> {
        registry
            .subscribers
            .get(subscriber.id())
            .filter(|registered| std::ptr::eq(Arc::as_ptr(registered), subscriber))
    }

    /// Unsubscribe from `topic`. Does nothing if not subscribed, or if the
    /// subscriber belongs to another broker.
    pub fn unsubscribe(&self, subscriber: &Subscriber<P>, topic: &str) {
        let mut registry = self.write();
        if Self::registered(&registry, subscriber).is_none() {
            return;
        }
        Self::detach(&mut registry, subscriber, topic);
    }

    fn detach(registry: &mut Registry<P>, subscriber: &Subscriber<P>, topic: &str) {
        if let Some(entry) = registry.topics.get_mut(topic) {
            entry.unsubscribe(subscriber.id());
            if entry.is_empty() {
                registry.topics.remove(topic);
            }
        }

        if subscriber.remove_topic(topic) {
            debug!(subscriber = %subscriber.id(), topic, "unsubscribed");
        }
    }

    /// Drop the subscriber from every topic and from the broker, then close its mailbox.
    ///
    /// Deliveries still in flight become no-ops. Removing twice is harmless,
    /// and a subscriber registered with another broker is left untouched.
    pub fn remove_subscriber(&self, subscriber: &Subscriber<P>) {
        {
            let mut registry = self.write();
            if Self::registered(&registry, subscriber).is_none() {
                return;
            }
            for topic in subscriber.get_topics() {
                Self::detach(&mut registry, subscriber, &topic);
            }
            registry.subscribers.remove(subscriber.id());
        }

        if subscriber.destruct() {
            info!(subscriber = %subscriber.id(), "subscriber removed");
        }
    }

    /// Number of subscribers registered under exactly `topic`.
    ///
    /// Wildcard keys are counted separately: subscribers of `orders.*` do
    /// not show up in the count for `orders.created`.
    pub fn get_subscribers(&self, topic: &str) -> usize {
        self.read().topics.get(topic).map_or(0, Topic::len)
    }

    pub fn subscriber_count(&self) -> usize {
        self.read().subscribers.len()
    }

    /// Index keys that currently have at least one subscriber, sorted.
    pub fn topics(&self) -> Vec<String> {
        self.read().topics.keys().cloned().collect()
    }

    fn resolve(&self, topic: &str) -> Vec<Arc<Subscriber<P>>> {
        let registry = self.read();
        let mut seen = HashSet::new();
        let mut targets = Vec::new();

        for key in matching_keys(topic, self.config.wildcard, &self.config.delimiter) {
            let Some(entry) = registry.topics.get(&key) else {
                continue;
            };
            for (id, subscriber) in &entry.subscribers {
                if seen.insert(id.clone()) {
                    targets.push(subscriber.clone());
                }
            }
        }
        targets
    }

    /// Every subscriber found under the given entries once, paired with the
    /// first topic it was found under.
    fn collect_targets<'a>(
        entries: impl Iterator<Item = &'a Topic<P>>,
    ) -> Vec<(Arc<Subscriber<P>>, String)>
    where
        P: 'a,
    {
        let mut seen = HashSet::new();
        let mut targets = Vec::new();

        for entry in entries {
            for (id, subscriber) in &entry.subscribers {
                if seen.insert(id.clone()) {
                    targets.push((subscriber.clone(), entry.name.clone()));
                }
            }
        }
        targets
    }
}

impl<P> Broker<P>
where
    P: Clone + Send + 'static,
{
    fn dispatch(&self, deliveries: impl IntoIterator<Item = (Arc<Subscriber<P>>, Message<P>)>) -> usize {
        let mut scheduled = 0;
        for (subscriber, message) in deliveries {
            // inactive targets are skipped, the rest still get the message
            if !subscriber.is_active() {
                trace!(subscriber = %subscriber.id(), "skipping inactive subscriber");
                continue;
            }
            tokio::spawn(async move {
                subscriber.signal(message).await;
            });
            scheduled += 1;
        }
        scheduled
    }

    /// Publish `payload` on `topic`.
    ///
    /// Returns the number of deliveries scheduled. They run in the
    /// background and may complete in any order.
    pub fn publish(&self, topic: &str, payload: P) -> usize {
        let targets = self.resolve(topic);
        let message = Message::new(topic, payload);

        let scheduled = self.dispatch(
            targets
                .into_iter()
                .map(|subscriber| (subscriber, message.clone())),
        );
        debug!(topic, scheduled, "published");
        scheduled
    }

    /// Send `payload` to every subscriber of every topic.
    ///
    /// Each subscriber receives it once, under the first topic (in sorted
    /// order) it is subscribed to.
    pub fn broadcast(&self, payload: P) -> usize {
        let targets = Self::collect_targets(self.read().topics.values());
        let scheduled = self.fan_out(targets, payload);
        debug!(scheduled, "broadcast");
        scheduled
    }

    /// Like [`broadcast`](Self::broadcast), restricted to the listed topics.
    ///
    /// Topics are matched exactly, without wildcard expansion.
    pub fn broadcast_to<I, S>(&self, topics: I, payload: P) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let targets = {
            let registry = self.read();
            let entries: Vec<&Topic<P>> = topics
                .into_iter()
                .filter_map(|topic| registry.topics.get(topic.as_ref()))
                .collect();
            Self::collect_targets(entries.into_iter())
        };
        let scheduled = self.fan_out(targets, payload);
        debug!(scheduled, "broadcast to topic list");
        scheduled
    }

    fn fan_out(&self, targets: Vec<(Arc<Subscriber<P>>, String)>, payload: P) -> usize {
        self.dispatch(
            targets
                .into_iter()
                .map(|(subscriber, topic)| (subscriber, Message::new(topic, payload.clone()))),
        )
    }

    /// Create a subscriber already subscribed to every topic in `topics`.
    pub fn subscriber_for<I, S>(&self, topics: I) -> Result<Arc<Subscriber<P>>, BrokerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let subscriber = self.add_subscriber()?;
        for topic in topics {
            self.subscribe(&subscriber, topic.as_ref())?;
        }
        Ok(subscriber)
    }

    /// Subscribe to `topics` and run `handler` for every message received.
    ///
    /// The handler runs on a spawned task until the returned subscriber is
    /// removed from the broker.
    pub fn listen<I, S, F, Fut>(
        &self,
        topics: I,
        mut handler: F,
    ) -> Result<(Arc<Subscriber<P>>, JoinHandle<()>), BrokerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(Message<P>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let subscriber = self.subscriber_for(topics)?;
        let Some(mut mailbox) = subscriber.take_mailbox() else {
            return Err(BrokerError::MailboxTaken(subscriber.id().clone()));
        };

        let id = subscriber.id().clone();
        let handle = tokio::spawn(async move {
            while let Some(message) = mailbox.recv().await {
                handler(message).await;
            }
            debug!(subscriber = %id, "listener finished");
        });
        Ok((subscriber, handle))
    }
}
