//! # topicsub
//!
//! `topicsub` is an in-process publish/subscribe broker built on Tokio.
//! Producers publish messages tagged with a topic; consumers register
//! interest in topics and receive matching messages through a private
//! mailbox.
//!
//! ## Core Modules
//!
//! - `broker`: the registry of subscribers, the topic index and message routing.
//! - `subscriber`: the consuming side, a subscriber and its mailbox.
//! - `config`: loading broker and logging settings.
//! - `utils`: the error type and logging bootstrap.
//!
//! ## Delivery contract
//!
//! Delivery is at-most-once, unordered and best-effort. `publish` returns as
//! soon as one delivery task per target has been spawned; a subscriber
//! removed while deliveries are in flight simply stops receiving.

pub mod broker;
pub mod config;
pub mod subscriber;
pub mod utils;

pub use broker::{Broker, BrokerConfig, Message, OverflowPolicy};
pub use subscriber::{Delivery, Mailbox, Subscriber, SubscriberId};
pub use utils::error::BrokerError;
