use std::env;

use thiserror::Error;

/// Broker username is fixed by the vendor; only the password varies per account.
const MQTT_USERNAME: &str = "medole";
const DEFAULT_BROKER_HOST: &str = "54.178.141.153";
const TOPIC_PREFIX: &str = "MEDOLE/MEDOLE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MEDOLE_TOKEN environment variable is required and must not be empty")]
    MissingToken,
    #[error("MEDOLE_PASSWORD environment variable is required and must not be empty")]
    MissingPassword,
    #[error("invalid value for {variable}: {value}")]
    InvalidValue { variable: String, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub identity: DeviceIdentity,
    pub broker_host: String,
    pub broker_port: u16,
    pub name: String,
    pub debug: bool,
    pub shows_humidity: bool,
    pub shows_temperature: bool,
    pub publish_timeout_secs: u64,
}

/// Immutable per-device identity. The token determines both MQTT topics;
/// the password authenticates against the vendor broker.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    pub token: String,
    pub username: &'static str,
    pub password: String,
    pub raw_topic: String,
    pub req_topic: String,
}

impl DeviceIdentity {
    pub fn new(token: &str, password: &str) -> Result<Self, ConfigError> {
        if token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if password.is_empty() {
            return Err(ConfigError::MissingPassword);
        }
        Ok(Self {
            token: token.to_string(),
            username: MQTT_USERNAME,
            password: password.to_string(),
            raw_topic: format!("{TOPIC_PREFIX}/{token}/raw"),
            req_topic: format!("{TOPIC_PREFIX}/{token}/req"),
        })
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v.parse().map_err(|_| ConfigError::InvalidValue {
            variable: key.to_string(),
            value: v,
        }),
        _ => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = env_optional("MEDOLE_TOKEN").ok_or(ConfigError::MissingToken)?;
        let password = env_optional("MEDOLE_PASSWORD").ok_or(ConfigError::MissingPassword)?;
        let identity = DeviceIdentity::new(&token, &password)?;

        let config = Self {
            identity,
            broker_host: env_or_default("MEDOLE_BROKER_HOST", DEFAULT_BROKER_HOST.to_string())?,
            broker_port: env_or_default("MEDOLE_BROKER_PORT", 1883)?,
            name: env_or_default("MEDOLE_NAME", "Medole Dehumidifier".to_string())?,
            debug: env_or_default("MEDOLE_DEBUG", false)?,
            shows_humidity: env_or_default("MEDOLE_SHOWS_HUMIDITY", false)?,
            shows_temperature: env_or_default("MEDOLE_SHOWS_TEMPERATURE", false)?,
            publish_timeout_secs: env_or_default("MEDOLE_PUBLISH_TIMEOUT_SECS", 10)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // A zero timeout would make every publish fail instantly.
        if self.publish_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                variable: "MEDOLE_PUBLISH_TIMEOUT_SECS".to_string(),
                value: self.publish_timeout_secs.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_derives_topics_from_token() {
        let identity = DeviceIdentity::new("abc123", "hunter2").unwrap();
        assert_eq!(identity.raw_topic, "MEDOLE/MEDOLE/abc123/raw");
        assert_eq!(identity.req_topic, "MEDOLE/MEDOLE/abc123/req");
        assert_eq!(identity.username, "medole");
    }

    #[test]
    fn identity_rejects_empty_token() {
        assert!(matches!(
            DeviceIdentity::new("", "hunter2"),
            Err(ConfigError::MissingToken)
        ));
    }

    #[test]
    fn zero_publish_timeout_is_rejected() {
        let config = Config {
            identity: DeviceIdentity::new("abc123", "hunter2").unwrap(),
            broker_host: DEFAULT_BROKER_HOST.to_string(),
            broker_port: 1883,
            name: "Medole Dehumidifier".to_string(),
            debug: false,
            shows_humidity: false,
            shows_temperature: false,
            publish_timeout_secs: 0,
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn identity_rejects_empty_password() {
        assert!(matches!(
            DeviceIdentity::new("abc123", ""),
            Err(ConfigError::MissingPassword)
        ));
    }
}
