//! The broker: subscriber registry, topic index and message routing.
//!
//! Public types:
//! - `Broker`: registers subscribers, manages subscriptions, publishes and broadcasts.
//! - `BrokerConfig` / `OverflowPolicy`: construction options.
//! - `Message`: the value delivered to subscribers.

pub mod engine;
pub mod message;
pub mod options;
pub mod topic;

pub use engine::Broker;
pub use message::Message;
pub use options::{BrokerConfig, OverflowPolicy};

#[cfg(test)]
mod tests;
