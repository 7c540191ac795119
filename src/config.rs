//! Bridge configuration loaded from a TOML file.
//!
//! Secrets are never stored in the file itself; the config names
//! environment variables (`password_env`, `username_env`) that are
//! resolved at runtime.

use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main bridge configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    pub device: DeviceSection,
    pub wifi: WifiSection,
    pub mqtt: MqttSection,
    #[serde(default)]
    pub sensor: SensorSection,
    #[serde(default)]
    pub topics: TopicSection,
}

/// Device identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Device identifier (must match [a-zA-Z0-9._-]+), used in the MQTT
    /// client id
    pub id: String,
}

/// Wireless network parameters.
///
/// Association itself is owned by the platform supplicant configured with
/// these credentials; the bridge watches link reachability and sequences
/// startup on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WifiSection {
    /// Network identity (SSID)
    pub ssid: String,
    /// Environment variable containing the network shared secret
    pub password_env: Option<String>,
    /// Interval between reachability probes in milliseconds
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    /// Per-probe connect timeout in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Re-association retry policy
    #[serde(default = "RetryConfig::link_default")]
    pub retry: RetryConfig,
}

/// MQTT broker session parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Broker URL with protocol and port (mqtt:// or mqtts://)
    pub broker_url: String,
    /// Environment variable containing the username
    pub username_env: Option<String>,
    /// Environment variable containing the password
    pub password_env: Option<String>,
    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Reconnection retry policy
    #[serde(default = "RetryConfig::session_default")]
    pub retry: RetryConfig,
}

impl MqttSection {
    /// Resolve the broker username from its environment variable.
    pub fn username(&self) -> Option<String> {
        resolve_env(self.username_env.as_ref())
    }

    /// Resolve the broker password from its environment variable.
    pub fn password(&self) -> Option<String> {
        resolve_env(self.password_env.as_ref())
    }
}

/// Sensor sampling parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorSection {
    /// Sensor driver: "iio" or "sim"
    #[serde(default = "default_sensor_driver")]
    pub driver: String,
    /// IIO device directory (driver = "iio")
    #[serde(default = "default_iio_path")]
    pub iio_path: PathBuf,
    /// Publish period in seconds
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,
    /// QoS level for published readings (0, 1 or 2)
    #[serde(default = "default_publish_qos")]
    pub publish_qos: u8,
}

impl Default for SensorSection {
    fn default() -> Self {
        Self {
            driver: default_sensor_driver(),
            iio_path: default_iio_path(),
            sample_interval_secs: default_sample_interval_secs(),
            publish_qos: default_publish_qos(),
        }
    }
}

/// Topic bindings, constant for the process lifetime
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicSection {
    pub temperature: String,
    pub humidity: String,
}

impl Default for TopicSection {
    fn default() -> Self {
        Self {
            temperature: "graduacao/iot/6/temperatura".to_string(),
            humidity: "graduacao/iot/6/umidade".to_string(),
        }
    }
}

fn default_probe_interval_ms() -> u64 {
    3000
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

fn default_keep_alive_secs() -> u64 {
    60
}

fn default_sensor_driver() -> String {
    "iio".to_string()
}

fn default_iio_path() -> PathBuf {
    PathBuf::from("/sys/bus/iio/devices/iio:device0")
}

fn default_sample_interval_secs() -> u64 {
    15
}

fn default_publish_qos() -> u8 {
    1
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid device ID format: {0}")]
    InvalidDeviceId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BridgeConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: BridgeConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_device_id(&self.device.id)?;

        if self.sensor.publish_qos > 2 {
            return Err(ConfigError::InvalidConfig(format!(
                "publish_qos must be 0, 1 or 2, got {}",
                self.sensor.publish_qos
            )));
        }
        if self.sensor.sample_interval_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "sample_interval_secs must be greater than 0".to_string(),
            ));
        }
        self.wifi
            .retry
            .validate()
            .map_err(|e| ConfigError::InvalidConfig(format!("wifi.retry: {e}")))?;
        self.mqtt
            .retry
            .validate()
            .map_err(|e| ConfigError::InvalidConfig(format!("mqtt.retry: {e}")))?;
        Ok(())
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[device]
id = "test-bridge"

[wifi]
ssid = "lab-network"

[mqtt]
broker_url = "mqtt://localhost:1883"

[sensor]
driver = "sim"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Resolve an optional environment-variable indirection.
fn resolve_env(env_var_name: Option<&String>) -> Option<String> {
    env_var_name.and_then(|name| std::env::var(name).ok())
}

/// Validate device ID format (it ends up in the MQTT client id)
fn validate_device_id(device_id: &str) -> Result<(), ConfigError> {
    let valid_chars = device_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if device_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidDeviceId(format!(
            "Device ID '{device_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[device]
id = "greenhouse-6"

[wifi]
ssid = "hoffnet"
password_env = "WIFI_PASSWORD"
probe_interval_ms = 1000
probe_timeout_ms = 500

[wifi.retry]
sustained_delay_ms = 2000

[mqtt]
broker_url = "mqtt://test.mosquitto.org:1883"
username_env = "MQTT_USERNAME"
password_env = "MQTT_PASSWORD"
keep_alive_secs = 30

[mqtt.retry]
max_attempts = 10
backoff_pattern = [100, 200, 400]
sustained_delay_ms = 400

[sensor]
driver = "iio"
iio_path = "/sys/bus/iio/devices/iio:device2"
sample_interval_secs = 15
publish_qos = 1

[topics]
temperature = "graduacao/iot/6/temperatura"
humidity = "graduacao/iot/6/umidade"
"#;

        let config: BridgeConfig = toml::from_str(toml_content).unwrap();
        config.validate().unwrap();
        assert_eq!(config.device.id, "greenhouse-6");
        assert_eq!(config.wifi.ssid, "hoffnet");
        assert_eq!(config.wifi.retry.sustained_delay_ms, 2000);
        assert_eq!(config.mqtt.retry.max_attempts, Some(10));
        assert_eq!(config.sensor.sample_interval_secs, 15);
        assert_eq!(config.topics.temperature, "graduacao/iot/6/temperatura");
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let toml_content = r#"
[device]
id = "minimal"

[wifi]
ssid = "net"

[mqtt]
broker_url = "mqtt://localhost:1883"
"#;

        let config: BridgeConfig = toml::from_str(toml_content).unwrap();
        config.validate().unwrap();
        assert_eq!(config.sensor.driver, "iio");
        assert_eq!(config.sensor.sample_interval_secs, 15);
        assert_eq!(config.sensor.publish_qos, 1);
        assert_eq!(config.topics.humidity, "graduacao/iot/6/umidade");
        assert_eq!(config.wifi.retry.max_attempts, None);
        assert_eq!(config.mqtt.retry.backoff_pattern, vec![500, 1000, 2000, 5000]);
    }

    #[test]
    fn test_invalid_device_id() {
        assert!(validate_device_id("invalid@device").is_err());
        assert!(validate_device_id("").is_err());
        assert!(validate_device_id("valid-device_123.test").is_ok());
    }

    #[test]
    fn test_invalid_qos_rejected() {
        let mut config = BridgeConfig::test_config();
        config.sensor.publish_qos = 3;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = BridgeConfig::test_config();
        config.sensor.sample_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mqtt_credentials_resolved_from_env() {
        let mut config = BridgeConfig::test_config();
        config.mqtt.username_env = Some("DHT_BRIDGE_TEST_MQTT_USER".to_string());
        config.mqtt.password_env = Some("DHT_BRIDGE_TEST_MQTT_PASS_UNSET".to_string());

        std::env::set_var("DHT_BRIDGE_TEST_MQTT_USER", "iot-user");
        assert_eq!(config.mqtt.username(), Some("iot-user".to_string()));
        // Named but absent variable resolves to nothing
        assert_eq!(config.mqtt.password(), None);

        config.mqtt.username_env = None;
        assert_eq!(config.mqtt.username(), None);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        std::fs::write(
            &path,
            "[device]\nid = \"t1\"\n\n[wifi]\nssid = \"net\"\n\n[mqtt]\nbroker_url = \"mqtt://localhost:1883\"\n",
        )
        .unwrap();

        let config = BridgeConfig::load_from_file(&path).unwrap();
        assert_eq!(config.device.id, "t1");

        let missing = BridgeConfig::load_from_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::FileRead(_))));
    }
}
