use serde::Deserialize;

use crate::broker::{BrokerConfig, OverflowPolicy};

/// Top-level configuration settings for the application.
///
/// Includes settings for the message broker and for logging.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub logging: LoggingSettings,
}

/// Configuration settings for the broker.
///
/// Mirrors [`BrokerConfig`], which is what the broker is built from.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrokerSettings {
    pub wildcard: bool,
    pub delimiter: String,
    pub max_subscribers: usize,
    pub mailbox_capacity: usize,
    pub overflow: OverflowPolicy,
}

/// Configuration settings for logging.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub broker: Option<PartialBrokerSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub wildcard: Option<bool>,
    pub delimiter: Option<String>,
    pub max_subscribers: Option<usize>,
    pub mailbox_capacity: Option<usize>,
    pub overflow: Option<OverflowPolicy>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
///
/// Broker defaults are those of `BrokerConfig::default()`.
impl Default for Settings {
    fn default() -> Self {
        let broker = BrokerConfig::default();
        Self {
            broker: BrokerSettings {
                wildcard: broker.wildcard,
                delimiter: broker.delimiter,
                max_subscribers: broker.max_subscribers,
                mailbox_capacity: broker.mailbox_capacity,
                overflow: broker.overflow,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl From<BrokerSettings> for BrokerConfig {
    fn from(settings: BrokerSettings) -> Self {
        Self {
            wildcard: settings.wildcard,
            delimiter: settings.delimiter,
            max_subscribers: settings.max_subscribers,
            mailbox_capacity: settings.mailbox_capacity,
            overflow: settings.overflow,
        }
    }
}
