//! Price ticker demo for topicsub
//!
//! A publisher emits synthetic quotes on `price.<SYMBOL>` topics while two
//! listeners consume them: one bound to a couple of symbols, one to the
//! `price.*` wildcard. Runs until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use topicsub::config::load_config;
use topicsub::utils::logging;
use topicsub::{Broker, BrokerConfig, BrokerError};
use tracing::{error, info};

const SYMBOLS: [&str; 4] = ["BTC", "ETH", "DOT", "SOL"];

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {}", e);
            return;
        }
    };
    logging::init(&config.logging.level);

    let mut broker_config: BrokerConfig = config.broker.into();
    // the demo relies on the wildcard listener
    broker_config.wildcard = true;
    let broker = Arc::new(Broker::new(broker_config));

    if let Err(e) = run(broker).await {
        error!("Demo failed: {}", e);
    }
}

async fn run(broker: Arc<Broker<Value>>) -> Result<(), BrokerError> {
    let (majors, _) = broker.listen(["price.BTC", "price.ETH"], |message| async move {
        info!(topic = message.topic(), quote = %message.payload(), "majors listener");
    })?;
    let (all, _) = broker.listen(["price.*"], |message| async move {
        info!(topic = message.topic(), quote = %message.payload(), "wildcard listener");
    })?;

    let publisher = tokio::spawn(publish_quotes(broker.clone()));

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received. Exiting gracefully.");

    publisher.abort();
    broker.remove_subscriber(&majors);
    broker.remove_subscriber(&all);
    Ok(())
}

async fn publish_quotes(broker: Arc<Broker<Value>>) {
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    let mut tick: u64 = 0;
    loop {
        ticker.tick().await;
        tick += 1;

        let symbol = SYMBOLS[(tick % SYMBOLS.len() as u64) as usize];
        let price = 100.0 + (tick % 37) as f64 * 0.25;

        let topic = format!("price.{symbol}");
        broker.publish(&topic, json!({ "symbol": symbol, "price": price }));
    }
}
