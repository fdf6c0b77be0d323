//! JSON configuration of a gripper connection.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::registers::RegisterMap;
use crate::transport::{check_slave_id, ModbusTransport};

/// Serial line settings. The line is always 8N1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial port path, e.g. `/dev/ttyUSB0` or `COM17`.
    pub path: String,
    #[serde(default = "SerialConfig::default_baud_rate")]
    pub baud_rate: u32,
    /// Per-transaction timeout of the port.
    #[serde(default = "SerialConfig::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl SerialConfig {
    fn default_baud_rate() -> u32 {
        115_200
    }

    fn default_timeout_ms() -> u64 {
        500
    }

    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: Self::default_baud_rate(),
            timeout_ms: Self::default_timeout_ms(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Everything needed to open and drive one gripper.
///
/// ```json
/// {
///     "serial": { "path": "/dev/ttyUSB0" },
///     "slave_id": 9,
///     "move_timeout_ms": 5000
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GripperConfig {
    pub serial: SerialConfig,
    #[serde(default = "GripperConfig::default_slave_id")]
    pub slave_id: u8,
    /// Register table, validated on load.
    #[serde(default)]
    pub registers: RegisterMap,
    #[serde(default = "GripperConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "GripperConfig::default_wait_timeout_ms")]
    pub activation_timeout_ms: u64,
    #[serde(default = "GripperConfig::default_wait_timeout_ms")]
    pub move_timeout_ms: u64,
}

impl GripperConfig {
    fn default_slave_id() -> u8 {
        ModbusTransport::DEFAULT_SLAVE_ID
    }

    fn default_poll_interval_ms() -> u64 {
        100
    }

    fn default_wait_timeout_ms() -> u64 {
        5_000
    }

    /// Defaults for the gripper on `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            serial: SerialConfig::new(path),
            slave_id: Self::default_slave_id(),
            registers: RegisterMap::homwing(),
            poll_interval_ms: Self::default_poll_interval_ms(),
            activation_timeout_ms: Self::default_wait_timeout_ms(),
            move_timeout_ms: Self::default_wait_timeout_ms(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check the settings the register map's own validation does not cover.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_slave_id(self.slave_id)?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn activation_timeout(&self) -> Duration {
        Duration::from_millis(self.activation_timeout_ms)
    }

    pub fn move_timeout(&self) -> Duration {
        Duration::from_millis(self.move_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::Register;

    #[test]
    fn minimal_json_uses_defaults() {
        let config = GripperConfig::from_json_str(r#"{ "serial": { "path": "COM17" } }"#).unwrap();
        assert_eq!(config, GripperConfig::new("COM17"));
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.serial.timeout(), Duration::from_millis(500));
        assert_eq!(config.slave_id, 9);
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.activation_timeout(), Duration::from_secs(5));
        assert_eq!(config.move_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn custom_register_table() {
        let mut config = GripperConfig::new("/dev/ttyUSB0");
        config.slave_id = 1;
        let json = serde_json::to_string(&config)
            .unwrap()
            .replace(r#""address":1000"#, r#""address":256"#);
        let config = GripperConfig::from_json_str(&json).unwrap();
        assert_eq!(config.registers.block(Register::Control).address, 0x0100);
        assert_eq!(config.slave_id, 1);
    }

    #[test]
    fn invalid_slave_id_is_rejected() {
        let json = r#"{ "serial": { "path": "COM1" }, "slave_id": 250 }"#;
        let err = GripperConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)), "{:?}", err);
    }

    #[test]
    fn incomplete_register_table_is_rejected() {
        let json = r#"{
            "serial": { "path": "COM1" },
            "registers": [{ "register": "control", "address": 256, "count": 1 }]
        }"#;
        assert!(matches!(
            GripperConfig::from_json_str(json),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            GripperConfig::from_json_file("/nonexistent/gripper.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
