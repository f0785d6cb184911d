//! The `subscriber` module defines the consuming side of the broker.
//!
//! A [`Subscriber`] is created by the broker and shared between the broker's
//! indices and the code consuming it. Messages reach the consumer through a
//! [`Mailbox`], handed out once by [`Subscriber::take_mailbox`].

pub mod mailbox;
pub mod pubsub_subscriber;

pub use mailbox::Mailbox;
pub use pubsub_subscriber::{Delivery, Subscriber, SubscriberId};
