// Soil Advisor serial bridge v0.1
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod bridge;
mod client;
mod config;
mod errors;
mod parser;
mod serial;

use bridge::Bridge;
use client::IngestClient;
use config::BridgeConfig;
use serial::SerialConnector;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "serial_bridge=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BridgeConfig::from_env();

    let client = match IngestClient::new(&config.ingest_url, config.post_timeout) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to create ingest client: {}", e);
            std::process::exit(1);
        }
    };

    let connector = SerialConnector::new(&config.serial_port, config.baud_rate);
    Bridge::new(connector, client, config.timing()).run().await
}
