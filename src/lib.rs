//! Bridge between the Medole dehumidifier's vendor MQTT protocol and a
//! normalized device-state model.
//!
//! Telemetry published on the device's raw topic feeds a shared state cache;
//! the get/set accessors on [`Dehumidifier`] read that cache and publish
//! encoded command codes back to the device's request topic.

pub mod config;
pub mod dehumidifier;
pub mod mqtt;
pub mod protocol;
pub mod state;

pub use config::{Config, ConfigError, DeviceIdentity};
pub use dehumidifier::{AccessorError, Dehumidifier};
pub use state::{DeviceState, StateCache};
