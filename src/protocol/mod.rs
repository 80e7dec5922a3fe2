pub mod command;
pub mod telemetry;

/// A partial device-state update decoded from one raw telemetry message.
/// Fields absent from the payload stay `None` and leave the cached value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceStateUpdate {
    pub current_humidity: Option<u8>,
    pub current_temperature: Option<f64>,
    pub fan_speed: Option<u8>,
    pub is_active: Option<bool>,
    pub target_humidity: Option<u8>,
}
