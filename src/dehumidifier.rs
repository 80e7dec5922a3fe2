use thiserror::Error;
use tracing::debug;

use crate::config::{Config, DeviceIdentity};
use crate::mqtt::client::{MqttPublisher, PublishError};
use crate::protocol::command::{self, CommandError};
use crate::state::StateCache;

#[derive(Debug, Error)]
pub enum AccessorError {
    /// No telemetry has reported this field yet; distinct from any real value.
    #[error("no telemetry received yet for this field")]
    NotReady,
    #[error("not connected to the Medole MQTT broker")]
    NotConnected,
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

type HumidityPolledHook = Box<dyn Fn(u8) + Send + Sync>;

/// The get/set surface consumed by the external control integration.
///
/// Reads come from the shared state cache and never block; writes encode a
/// command code and publish it to the device's request topic. Every set
/// operation is gated on transport connectivity before anything is sent.
pub struct Dehumidifier {
    identity: DeviceIdentity,
    cache: StateCache,
    publisher: MqttPublisher,
    shows_humidity: bool,
    shows_temperature: bool,
    on_humidity_polled: Option<HumidityPolledHook>,
}

impl Dehumidifier {
    pub fn new(config: &Config, cache: StateCache, publisher: MqttPublisher) -> Self {
        Self {
            identity: config.identity.clone(),
            cache,
            publisher,
            shows_humidity: config.shows_humidity,
            shows_temperature: config.shows_temperature,
            on_humidity_polled: None,
        }
    }

    /// Register a hook fired with the latest current-humidity reading each
    /// time the target humidity is polled. This replaces the side channel the
    /// vendor integration used to refresh the humidity display on reads.
    pub fn set_humidity_polled_hook(&mut self, hook: impl Fn(u8) + Send + Sync + 'static) {
        self.on_humidity_polled = Some(Box::new(hook));
    }

    pub fn is_connected(&self) -> bool {
        self.cache.is_connected()
    }

    /// Whether the control layer should expose the standalone humidity sensor.
    pub fn shows_humidity(&self) -> bool {
        self.shows_humidity
    }

    /// Whether the control layer should expose the standalone temperature sensor.
    pub fn shows_temperature(&self) -> bool {
        self.shows_temperature
    }

    pub fn get_active(&self) -> Result<bool, AccessorError> {
        self.cache.snapshot().is_active.ok_or(AccessorError::NotReady)
    }

    pub async fn set_active(&self, on: bool) -> Result<(), AccessorError> {
        self.ensure_connected()?;
        let code = command::encode_power(on);
        debug!("Set active={} -> {}", on, code);
        self.publisher
            .publish(&self.identity.req_topic, code.as_str())
            .await?;
        Ok(())
    }

    pub fn get_target_humidity(&self) -> Result<u8, AccessorError> {
        let state = self.cache.snapshot();
        if let (Some(hook), Some(current)) = (&self.on_humidity_polled, state.current_humidity) {
            hook(current);
        }
        state.target_humidity.ok_or(AccessorError::NotReady)
    }

    pub async fn set_target_humidity(&self, humidity: u8) -> Result<(), AccessorError> {
        self.ensure_connected()?;
        let code = command::encode_target_humidity(humidity);
        debug!("Set target humidity={} -> {}", humidity, code);
        self.publisher
            .publish(&self.identity.req_topic, code.as_str())
            .await?;
        Ok(())
    }

    pub fn get_fan_speed(&self) -> Result<u8, AccessorError> {
        self.cache.snapshot().fan_speed.ok_or(AccessorError::NotReady)
    }

    pub async fn set_fan_speed(&self, speed: u8) -> Result<(), AccessorError> {
        self.ensure_connected()?;
        let code = command::encode_fan_speed(speed)?;
        debug!("Set fan speed={} -> {}", speed, code);
        self.publisher
            .publish(&self.identity.req_topic, code.as_str())
            .await?;
        Ok(())
    }

    pub fn get_current_humidity(&self) -> Result<u8, AccessorError> {
        self.cache
            .snapshot()
            .current_humidity
            .ok_or(AccessorError::NotReady)
    }

    pub fn get_current_temperature(&self) -> Result<f64, AccessorError> {
        self.cache
            .snapshot()
            .current_temperature
            .ok_or(AccessorError::NotReady)
    }

    fn ensure_connected(&self) -> Result<(), AccessorError> {
        if self.cache.is_connected() {
            Ok(())
        } else {
            Err(AccessorError::NotConnected)
        }
    }
}
