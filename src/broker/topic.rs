//! Topic management
//!
//! A `Topic` holds the subscribers registered under one index key. Keys are
//! plain strings; with wildcarding enabled a key such as `orders.*` is just
//! another entry, reached through [`wildcard_key`] at publish time.
//!
//! Concurrency note: callers must synchronize access to `Topic` (the broker
//! keeps every entry behind its registry lock).

use std::collections::HashMap;
use std::sync::Arc;

use crate::subscriber::{Subscriber, SubscriberId};

/// Segment that stands for "any single trailing segment".
pub const WILDCARD: &str = "*";

#[derive(Debug)]
pub struct Topic<P> {
    pub name: String,
    pub subscribers: HashMap<SubscriberId, Arc<Subscriber<P>>>,
}

impl<P> Topic<P> {
    /// Create a new topic with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscribers: HashMap::new(),
        }
    }

    /// Add a subscriber to the topic. Duplicate adds are ignored.
    pub fn subscribe(&mut self, subscriber: Arc<Subscriber<P>>) {
        self.subscribers
            .entry(subscriber.id().clone())
            .or_insert(subscriber);
    }

    /// Remove a subscriber from the topic.
    pub fn unsubscribe(&mut self, id: &SubscriberId) {
        self.subscribers.remove(id);
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

/// Derive the one-level wildcard key for `topic`.
///
/// The last segment is replaced by [`WILDCARD`]: `orders.created` yields
/// `orders.*`, `orders.created.refund` yields `orders.created.*`. Topics
/// without a delimiter, and an empty delimiter, yield `None`.
pub fn wildcard_key(topic: &str, delimiter: &str) -> Option<String> {
    if delimiter.is_empty() {
        return None;
    }
    let (parent, _last) = topic.rsplit_once(delimiter)?;
    Some(format!("{parent}{delimiter}{WILDCARD}"))
}

/// Every index key a publish on `topic` resolves to, exact key first.
pub fn matching_keys(topic: &str, wildcard: bool, delimiter: &str) -> Vec<String> {
    let mut keys = vec![topic.to_string()];
    if wildcard {
        if let Some(key) = wildcard_key(topic, delimiter) {
            // a topic literally named `orders.*` must not be counted twice
            if key != topic {
                keys.push(key);
            }
        }
    }
    keys
}
