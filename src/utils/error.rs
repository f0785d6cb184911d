//! The `error` module defines the error type used within `topicsub`.
//!
//! Only a handful of conditions are surfaced to callers. Resolving a topic
//! nobody listens to, or signalling a subscriber that has been removed, are
//! not errors: they yield zero deliveries.

use crate::subscriber::SubscriberId;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("subscriber limit of {max} reached")]
    CapacityExceeded { max: usize },

    #[error("subscriber '{0}' is not registered with this broker")]
    UnknownSubscriber(SubscriberId),

    #[error("mailbox of subscriber '{0}' was already taken")]
    MailboxTaken(SubscriberId),

    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PartialEq for BrokerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::CapacityExceeded { max: a }, Self::CapacityExceeded { max: b }) => a == b,
            (Self::UnknownSubscriber(a), Self::UnknownSubscriber(b)) => a == b,
            (Self::MailboxTaken(a), Self::MailboxTaken(b)) => a == b,
            (Self::InvalidConfig(a), Self::InvalidConfig(b)) => a == b,
            _ => false,
        }
    }
}
