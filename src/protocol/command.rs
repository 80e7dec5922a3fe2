use std::fmt;

use thiserror::Error;

pub const MIN_HUMIDITY: u8 = 30;
pub const MAX_HUMIDITY: u8 = 90;

const POWER_ON_CODE: &str = "5501810100d4";
const POWER_OFF_CODE: &str = "5501810000d5";

/// Checksum byte table for the target-humidity command. The first matching
/// range wins and the catch-all is checked last; [48,63] has no dedicated
/// range and always lands on the catch-all. This is the device's actual
/// protocol, not an oversight.
const HUMIDITY_RANGES: [(u8, u8, u16); 4] = [
    (32, 47, 0xf0),
    (64, 79, 0x90),
    (80, 90, 0x80),
    (MIN_HUMIDITY, MAX_HUMIDITY, 0xce),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("fan speed {0} is outside the device range 1-3")]
    InvalidArgument(u8),
}

/// Outbound hex instruction understood by the device firmware. Produced
/// transiently by the encoder and handed straight to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCode(String);

impl CommandCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn encode_power(on: bool) -> CommandCode {
    CommandCode(if on { POWER_ON_CODE } else { POWER_OFF_CODE }.to_string())
}

pub fn encode_fan_speed(speed: u8) -> Result<CommandCode, CommandError> {
    let code = match speed {
        1 => "5501850100d0",
        2 => "5501850200d3",
        3 => "5501850300d2",
        other => return Err(CommandError::InvalidArgument(other)),
    };
    Ok(CommandCode(code.to_string()))
}

pub fn encode_target_humidity(humidity: u8) -> CommandCode {
    let humidity = humidity.clamp(MIN_HUMIDITY, MAX_HUMIDITY);
    let level = 0x1e_u16 + u16::from(humidity - MIN_HUMIDITY);

    // The catch-all spans the whole clamped domain, so a match always exists.
    let (start, base) = HUMIDITY_RANGES
        .iter()
        .find(|(lo, hi, _)| humidity >= *lo && humidity <= *hi)
        .map(|(lo, _, base)| (*lo, *base))
        .unwrap_or((MIN_HUMIDITY, 0xce));
    let check = base + u16::from(humidity - start);

    CommandCode(format!("550184{level:02x}00{check:02x}"))
}
