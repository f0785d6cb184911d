//! Loading and validating `topicsub` settings.
//!
//! Values come from an optional `config/default.*` file, overridden by
//! `TOPICSUB_`-prefixed environment variables using `__` between section
//! and key (`TOPICSUB_BROKER__MAX_SUBSCRIBERS=10`). Anything left unset
//! falls back to `Settings::default()`.

mod settings;

use config::{Config, Environment, File};

use crate::utils::error::BrokerError;
use settings::PartialSettings;

pub use settings::{BrokerSettings, LoggingSettings, Settings};

/// Loads the configuration from the default file and environment variables
/// and merges it with default values.
pub fn load_config() -> Result<Settings, BrokerError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("TOPICSUB")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    // Merge with defaults
    let default = Settings::default();
    let broker = partial.broker;
    let logging = partial.logging;

    let settings = Settings {
        broker: BrokerSettings {
            wildcard: broker
                .as_ref()
                .and_then(|b| b.wildcard)
                .unwrap_or(default.broker.wildcard),
            delimiter: broker
                .as_ref()
                .and_then(|b| b.delimiter.clone())
                .unwrap_or(default.broker.delimiter),
            max_subscribers: broker
                .as_ref()
                .and_then(|b| b.max_subscribers)
                .unwrap_or(default.broker.max_subscribers),
            mailbox_capacity: broker
                .as_ref()
                .and_then(|b| b.mailbox_capacity)
                .unwrap_or(default.broker.mailbox_capacity),
            overflow: broker
                .as_ref()
                .and_then(|b| b.overflow)
                .unwrap_or(default.broker.overflow),
        },
        logging: LoggingSettings {
            level: logging
                .and_then(|l| l.level)
                .unwrap_or(default.logging.level),
        },
    };

    validate(&settings)?;
    Ok(settings)
}

/// Rejects combinations the broker cannot route with.
pub fn validate(settings: &Settings) -> Result<(), BrokerError> {
    if settings.broker.wildcard && settings.broker.delimiter.is_empty() {
        return Err(BrokerError::InvalidConfig(
            "wildcard topics need a non-empty delimiter".to_string(),
        ));
    }
    Ok(())
}
