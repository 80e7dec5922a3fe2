pub mod client;

pub use client::{InboundMessage, MqttPublisher, MqttSession, PublishError, ReconnectPolicy};
