use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use medole_dehumidifier::config::Config;
use medole_dehumidifier::mqtt::client::{InboundMessage, MqttSession};
use medole_dehumidifier::protocol::telemetry;
use medole_dehumidifier::state::StateCache;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let default_filter = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    info!(
        "Starting {} bridge (broker={}:{}, raw_topic={})",
        config.name, config.broker_host, config.broker_port, config.identity.raw_topic,
    );

    let cache = StateCache::new();
    let (session, _publisher) = MqttSession::connect(&config, cache.clone());

    let (inbound_tx, mut inbound_rx) = mpsc::channel::<InboundMessage>(100);
    let session_handle = tokio::spawn(session.run(inbound_tx));

    // Main loop: apply telemetry to the cache + handle shutdown signals.
    loop {
        tokio::select! {
            Some(msg) = inbound_rx.recv() => {
                match telemetry::decode(&msg.payload) {
                    Ok(update) => {
                        cache.apply_update(&update);
                        debug!("Applied telemetry update: {:?}", update);
                    }
                    Err(e) => {
                        warn!("Discarding malformed telemetry on {}: {}", msg.topic, e);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down");
                break;
            }
            _ = async {
                let mut sigterm = tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate()
                ).expect("Failed to register SIGTERM handler");
                sigterm.recv().await;
            } => {
                info!("Received SIGTERM, shutting down");
                break;
            }
        }
    }

    session_handle.abort();
    info!("{} bridge stopped", config.name);
}
