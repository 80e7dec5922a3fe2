use std::time::Duration;

use rumqttc::{AsyncClient, ClientError, Event, Incoming, MqttOptions, QoS};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::state::StateCache;

/// One inbound `(topic, payload)` event from the device's raw topic.
#[derive(Debug)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publish not accepted within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Exponential backoff schedule for reconnect attempts: starts at `initial`,
/// doubles per failed attempt up to `max`, resets on a successful connect.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl ReconnectPolicy {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

/// Clonable publish handle, detached from the event loop so callers never
/// block on broker IO. `publish` resolves once the message has been handed
/// to the event loop for QoS 1 delivery; the broker ack round trip is owned
/// by the event loop, so completion is best-effort from the caller's view.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
    timeout: Duration,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        timeout(
            self.timeout,
            self.client
                .publish(topic, QoS::AtLeastOnce, false, payload.as_bytes().to_vec()),
        )
        .await
        .map_err(|_| PublishError::Timeout(self.timeout))?
        .map_err(PublishError::from)
    }
}

pub struct MqttSession {
    client: AsyncClient,
    eventloop: rumqttc::EventLoop,
    raw_topic: String,
    cache: StateCache,
    reconnect: ReconnectPolicy,
}

impl MqttSession {
    /// Build the session and its publish handle. No IO happens until `run`
    /// drives the event loop.
    pub fn connect(config: &Config, cache: StateCache) -> (Self, MqttPublisher) {
        let mut mqttopts = MqttOptions::new(
            format!("medole-{}", config.identity.token),
            &config.broker_host,
            config.broker_port,
        );
        mqttopts.set_keep_alive(Duration::from_secs(30));
        mqttopts.set_credentials(config.identity.username, &config.identity.password);

        let (client, eventloop) = AsyncClient::new(mqttopts, 100);
        let publisher = MqttPublisher::new(
            client.clone(),
            Duration::from_secs(config.publish_timeout_secs),
        );

        let session = Self {
            client,
            eventloop,
            raw_topic: config.identity.raw_topic.clone(),
            cache,
            reconnect: ReconnectPolicy::default(),
        };
        (session, publisher)
    }

    /// Run the event loop for the life of the process. Subscribes to the raw
    /// topic on every (re)connect, forwards telemetry through `inbound_tx`
    /// in arrival order, and flips the connectivity flag on connect and
    /// disconnect. Returns only when the inbound channel is closed.
    pub async fn run(mut self, inbound_tx: mpsc::Sender<InboundMessage>) {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("Connected to Medole MQTT broker");
                    self.cache.set_connected(true);
                    self.reconnect.reset();
                    if let Err(e) = self.client.subscribe(&self.raw_topic, QoS::AtLeastOnce).await
                    {
                        error!("Failed to subscribe to {}: {}", self.raw_topic, e);
                    }
                }
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    debug!(
                        "Telemetry on {} ({} bytes)",
                        publish.topic,
                        publish.payload.len()
                    );
                    let msg = InboundMessage {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    };
                    if inbound_tx.send(msg).await.is_err() {
                        warn!("Inbound telemetry channel closed, stopping session");
                        return;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    self.cache.set_connected(false);
                    let delay = self.reconnect.next_delay();
                    error!("MQTT connection error: {}. Reconnecting in {:?}", e, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_policy_doubles_up_to_cap() {
        let mut policy = ReconnectPolicy::new(Duration::from_secs(1), Duration::from_secs(8));
        assert_eq!(policy.next_delay(), Duration::from_secs(1));
        assert_eq!(policy.next_delay(), Duration::from_secs(2));
        assert_eq!(policy.next_delay(), Duration::from_secs(4));
        assert_eq!(policy.next_delay(), Duration::from_secs(8));
        assert_eq!(policy.next_delay(), Duration::from_secs(8));
    }

    #[test]
    fn reconnect_policy_resets_after_successful_connect() {
        let mut policy = ReconnectPolicy::new(Duration::from_secs(1), Duration::from_secs(60));
        policy.next_delay();
        policy.next_delay();
        policy.reset();
        assert_eq!(policy.next_delay(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn publisher_hands_off_without_a_live_broker() {
        let opts = MqttOptions::new("test-client", "127.0.0.1", 1883);
        let (client, _eventloop) = AsyncClient::new(opts, 10);
        let publisher = MqttPublisher::new(client, Duration::from_secs(1));
        // Hand-off to the (unpolled) event loop succeeds while the request
        // queue has capacity.
        publisher
            .publish("MEDOLE/MEDOLE/test/req", "5501810100d4")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn publish_times_out_when_the_request_queue_is_full() {
        let opts = MqttOptions::new("test-client", "127.0.0.1", 1883);
        // Capacity 1 and nobody polling: the first publish fills the queue,
        // the second blocks until the timeout trips.
        let (client, _eventloop) = AsyncClient::new(opts, 1);
        let publisher = MqttPublisher::new(client, Duration::from_millis(50));

        publisher
            .publish("MEDOLE/MEDOLE/test/req", "5501810100d4")
            .await
            .unwrap();

        assert!(matches!(
            publisher
                .publish("MEDOLE/MEDOLE/test/req", "5501810000d5")
                .await,
            Err(PublishError::Timeout(_))
        ));
    }
}
