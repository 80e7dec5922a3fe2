use serde::Deserialize;
use thiserror::Error;

use super::DeviceStateUpdate;
use super::command::{MAX_HUMIDITY, MIN_HUMIDITY};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("telemetry payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("field {0} is present but empty")]
    EmptyField(&'static str),
    #[error("field {field} value {value} is outside {min}-{max}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

/// Raw wire shape of one message on the device's raw topic. Every field is
/// optional so a sparse report decodes to a partial update, but a field that
/// is present must be well-shaped.
#[derive(Deserialize)]
struct RawTelemetry {
    #[serde(rename = "H", default)]
    humidity: Option<Vec<f64>>,
    #[serde(rename = "T", default)]
    temperature: Option<Vec<f64>>,
    #[serde(rename = "FAN", default)]
    fan: Option<i64>,
    #[serde(rename = "POWER", default)]
    power: Option<Vec<PowerFlag>>,
    #[serde(rename = "HUMIDITY", default)]
    target: Option<i64>,
}

/// The device reports POWER as either a bare 0/1 or a boolean.
#[derive(Deserialize)]
#[serde(untagged)]
enum PowerFlag {
    Bool(bool),
    Num(i64),
}

impl PowerFlag {
    fn as_bool(&self) -> bool {
        match self {
            PowerFlag::Bool(b) => *b,
            PowerFlag::Num(n) => *n != 0,
        }
    }
}

fn int_in_range(
    field: &'static str,
    value: i64,
    min: i64,
    max: i64,
) -> Result<u8, DecodeError> {
    if value < min || value > max {
        return Err(DecodeError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(value as u8)
}

/// Decode one raw telemetry payload into a partial state update.
/// On any error nothing is returned, so a failed parse can never leak a
/// half-built update into the cache.
pub fn decode(raw: &[u8]) -> Result<DeviceStateUpdate, DecodeError> {
    let raw: RawTelemetry = serde_json::from_slice(raw)?;
    let mut update = DeviceStateUpdate::default();

    if let Some(values) = raw.humidity {
        let first = values.first().copied().ok_or(DecodeError::EmptyField("H"))?;
        update.current_humidity = Some(int_in_range("H", first.round() as i64, 0, 100)?);
    }

    if let Some(values) = raw.temperature {
        let first = values.first().copied().ok_or(DecodeError::EmptyField("T"))?;
        update.current_temperature = Some(first);
    }

    if let Some(fan) = raw.fan {
        update.fan_speed = Some(int_in_range("FAN", fan, 1, 3)?);
    }

    if let Some(flags) = raw.power {
        let first = flags.first().ok_or(DecodeError::EmptyField("POWER"))?;
        update.is_active = Some(first.as_bool());
    }

    if let Some(target) = raw.target {
        update.target_humidity = Some(int_in_range(
            "HUMIDITY",
            target,
            i64::from(MIN_HUMIDITY),
            i64::from(MAX_HUMIDITY),
        )?);
    }

    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_well_formed_payload() {
        let raw = br#"{"H":[55],"T":[21.5],"FAN":2,"POWER":[1],"HUMIDITY":60}"#;
        let update = decode(raw).unwrap();
        assert_eq!(update.current_humidity, Some(55));
        assert_eq!(update.current_temperature, Some(21.5));
        assert_eq!(update.fan_speed, Some(2));
        assert_eq!(update.is_active, Some(true));
        assert_eq!(update.target_humidity, Some(60));
    }

    #[test]
    fn decodes_boolean_power_flag() {
        let update = decode(br#"{"POWER":[false]}"#).unwrap();
        assert_eq!(update.is_active, Some(false));
        let update = decode(br#"{"POWER":[true]}"#).unwrap();
        assert_eq!(update.is_active, Some(true));
    }

    #[test]
    fn missing_fields_produce_partial_update() {
        let update = decode(br#"{"H":[48.6]}"#).unwrap();
        assert_eq!(update.current_humidity, Some(49));
        assert_eq!(update.current_temperature, None);
        assert_eq!(update.fan_speed, None);
        assert_eq!(update.is_active, None);
        assert_eq!(update.target_humidity, None);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(decode(b"not json"), Err(DecodeError::Json(_))));
        assert!(matches!(decode(b""), Err(DecodeError::Json(_))));
    }

    #[test]
    fn empty_arrays_are_an_error() {
        assert!(matches!(
            decode(br#"{"H":[]}"#),
            Err(DecodeError::EmptyField("H"))
        ));
        assert!(matches!(
            decode(br#"{"POWER":[]}"#),
            Err(DecodeError::EmptyField("POWER"))
        ));
    }

    #[test]
    fn out_of_domain_values_are_an_error() {
        assert!(matches!(
            decode(br#"{"FAN":5}"#),
            Err(DecodeError::OutOfRange { field: "FAN", .. })
        ));
        assert!(matches!(
            decode(br#"{"HUMIDITY":20}"#),
            Err(DecodeError::OutOfRange { field: "HUMIDITY", .. })
        ));
    }
}
