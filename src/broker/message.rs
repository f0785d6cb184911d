//! Message definitions for the broker
//!
//! `Message` is the value handed to every subscriber a publish resolves to.
//! It is immutable once built: each delivery receives its own clone, so the
//! payload type only needs to be `Clone`. Wrap large payloads in an `Arc`
//! to share them instead of copying.
//!
//! Notes on fields:
//! - `topic`: the topic the message was published (or broadcast) under
//! - `payload`: opaque body, never inspected by the broker
//! - `timestamp`: milliseconds since UNIX epoch; set when the message is built

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message<P> {
    topic: String,
    payload: P,
    timestamp: i64,
}

impl<P> Message<P> {
    pub fn new(topic: impl Into<String>, payload: P) -> Self {
        Self {
            topic: topic.into(),
            payload,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Consume the message, keeping only its payload.
    pub fn into_payload(self) -> P {
        self.payload
    }
}
