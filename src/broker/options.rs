//! Broker construction options.

use std::fmt;

use serde::Deserialize;

/// What a delivery does when a bounded mailbox is full.
///
/// Only consulted when [`BrokerConfig::mailbox_capacity`] is non-zero;
/// unbounded mailboxes never fill up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Wait for the consumer to make room. A consumer that never drains
    /// keeps its pending deliveries parked until it is removed.
    #[default]
    Block,
    /// Discard the message and log it.
    Drop,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Block => write!(f, "block"),
            OverflowPolicy::Drop => write!(f, "drop"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Enable one-level trailing wildcard keys such as `orders.*`.
    pub wildcard: bool,
    /// Separator between topic segments.
    pub delimiter: String,
    /// Upper bound on registered subscribers; `0` means unlimited.
    pub max_subscribers: usize,
    /// Mailbox size per subscriber; `0` means unbounded.
    pub mailbox_capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            wildcard: false,
            delimiter: ".".to_string(),
            max_subscribers: 0,
            mailbox_capacity: 0,
            overflow: OverflowPolicy::Block,
        }
    }
}

impl BrokerConfig {
    pub fn with_wildcard(mut self, delimiter: impl Into<String>) -> Self {
        self.wildcard = true;
        self.delimiter = delimiter.into();
        self
    }

    pub fn with_max_subscribers(mut self, max: usize) -> Self {
        self.max_subscribers = max;
        self
    }

    pub fn with_mailbox(mut self, capacity: usize, overflow: OverflowPolicy) -> Self {
        self.mailbox_capacity = capacity;
        self.overflow = overflow;
        self
    }
}
