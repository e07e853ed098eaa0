//! Configuration management
//!
//! One JSON document covers the link, relay timing, guidance polling,
//! mode arbitration, camera model and log level. Every section falls back
//! to its defaults when omitted.

use crate::api::GuidanceConfig;
use crate::core::CameraIntrinsics;
use crate::hardware::{LinkAddress, LinkConfig};
use crate::telemetry::RelayConfig;
use crate::utils::logging::LogLevel;
use crate::vehicle::{ModeConfig, SimConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Configuration load and validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {parameter}: {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("config I/O error: {message}")]
    IoError { message: String },

    #[error("config serialization error: {message}")]
    SerializationError { message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Full system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Autopilot link
    pub link: LinkConfig,
    /// Heartbeat and idle timing for the relay loop
    pub relay: RelayConfig,
    /// Polling intervals and arrival tolerances
    pub guidance: GuidanceConfig,
    /// Mode change acknowledgement timing
    pub modes: ModeConfig,
    /// Simulated vehicle dynamics, used when no link is configured
    pub sim: SimConfig,
    /// Downward camera model
    pub camera: CameraIntrinsics,
    pub log_level: LogLevel,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            link: LinkConfig::default(),
            relay: RelayConfig::default(),
            guidance: GuidanceConfig::default(),
            modes: ModeConfig::default(),
            sim: SimConfig::default(),
            camera: CameraIntrinsics::new(800.0, 0.0, (1280, 720)),
            log_level: LogLevel::Info,
        }
    }
}

impl SystemConfig {
    /// Fast polling for running against the simulator
    pub fn simulation() -> Self {
        Self {
            guidance: GuidanceConfig {
                position_poll_ms: 50,
                altitude_poll_ms: 50,
                timeout_ms: Some(120_000),
                ..GuidanceConfig::default()
            },
            modes: ModeConfig {
                ack_timeout_ms: 3000,
                poll_ms: 20,
            },
            relay: RelayConfig {
                idle_poll_ms: 5,
                ..RelayConfig::default()
            },
            ..Self::default()
        }
    }

    /// Load and validate a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            message: format!("Failed to read config file '{}': {}", path_str, e),
        })?;

        Self::from_json(&content)
    }

    /// Parse and validate a JSON document
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(content).map_err(|e| ConfigError::SerializationError {
            message: format!("Failed to parse config: {}", e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializationError {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(&path, content).map_err(|e| ConfigError::IoError {
            message: format!("Failed to write config file '{}': {}", path_str, e),
        })
    }

    /// Reports the first invalid parameter
    pub fn validate(&self) -> ConfigResult<()> {
        if let Err(e) = self.link.connection.parse::<LinkAddress>() {
            return Err(invalid("link.connection", &self.link.connection, &e.to_string()));
        }

        if self.relay.heartbeat_interval_ms == 0 {
            return Err(invalid("relay.heartbeat_interval_ms", &0, "must be greater than 0"));
        }

        let guidance = &self.guidance;
        if guidance.position_poll_ms == 0 {
            return Err(invalid("guidance.position_poll_ms", &0, "must be greater than 0"));
        }
        if guidance.altitude_poll_ms == 0 {
            return Err(invalid("guidance.altitude_poll_ms", &0, "must be greater than 0"));
        }
        if guidance.position_tolerance_m <= 0.0 {
            return Err(invalid(
                "guidance.position_tolerance_m",
                &guidance.position_tolerance_m,
                "must be positive",
            ));
        }
        if guidance.altitude_tolerance_m <= 0.0 {
            return Err(invalid(
                "guidance.altitude_tolerance_m",
                &guidance.altitude_tolerance_m,
                "must be positive",
            ));
        }
        if !(guidance.relative_tolerance_fraction > 0.0 && guidance.relative_tolerance_fraction < 1.0) {
            return Err(invalid(
                "guidance.relative_tolerance_fraction",
                &guidance.relative_tolerance_fraction,
                "must be between 0 and 1",
            ));
        }
        if guidance.timeout_ms == Some(0) {
            return Err(invalid("guidance.timeout_ms", &0, "omit to wait indefinitely"));
        }

        if self.modes.poll_ms == 0 {
            return Err(invalid("modes.poll_ms", &0, "must be greater than 0"));
        }

        let (width, height) = self.camera.resolution();
        if width == 0 || height == 0 {
            return Err(invalid(
                "camera.resolution",
                &format!("{}x{}", width, height),
                "both dimensions must be non-zero",
            ));
        }
        if self.camera.focal_length() <= 0.0 {
            return Err(invalid("camera.focal_length", &self.camera.focal_length(), "must be positive"));
        }

        if self.sim.step_s <= 0.0 {
            return Err(invalid("sim.step_s", &self.sim.step_s, "must be positive"));
        }

        Ok(())
    }
}

fn invalid(parameter: &str, value: &dyn std::fmt::Display, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_parameter(result: ConfigResult<()>) -> String {
        match result {
            Err(ConfigError::InvalidParameter { parameter, .. }) => parameter,
            other => panic!("expected InvalidParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = SystemConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.link.connection, "tcp:127.0.0.1:14550");
        assert_eq!(config.guidance.position_poll_ms, 2000);
        assert_eq!(config.guidance.altitude_poll_ms, 1000);
        assert_eq!(config.relay.heartbeat_interval_ms, 1000);

        assert!(SystemConfig::simulation().validate().is_ok());
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config = SystemConfig::from_json(
            r#"{ "link": { "connection": "tcp:10.0.0.2:5760", "system_id": 255, "component_id": 10 },
                 "log_level": "Debug" }"#,
        )
        .unwrap();

        assert_eq!(config.link.connection, "tcp:10.0.0.2:5760");
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.guidance, GuidanceConfig::default());
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let mut config = SystemConfig::default();
        config.link.connection = "udp:127.0.0.1:14550".to_string();
        assert_eq!(invalid_parameter(config.validate()), "link.connection");

        let mut config = SystemConfig::default();
        config.guidance.position_poll_ms = 0;
        assert_eq!(invalid_parameter(config.validate()), "guidance.position_poll_ms");

        let mut config = SystemConfig::default();
        config.guidance.relative_tolerance_fraction = 1.5;
        assert_eq!(invalid_parameter(config.validate()), "guidance.relative_tolerance_fraction");

        let mut config = SystemConfig::default();
        config.camera = CameraIntrinsics::new(800.0, 0.0, (0, 720));
        assert_eq!(invalid_parameter(config.validate()), "camera.resolution");

        let mut config = SystemConfig::default();
        config.relay.heartbeat_interval_ms = 0;
        assert_eq!(invalid_parameter(config.validate()), "relay.heartbeat_interval_ms");
    }

    #[test]
    fn test_malformed_json() {
        let result = SystemConfig::from_json("{ not json");
        assert!(matches!(result, Err(ConfigError::SerializationError { .. })));
    }

    #[test]
    fn test_config_file_round_trip() {
        let path = std::env::temp_dir().join(format!("shepard_config_{}.json", std::process::id()));

        let mut config = SystemConfig::simulation();
        config.camera = CameraIntrinsics::new(640.0, 0.3, (640, 480));
        config.save_to_file(&path).unwrap();

        let loaded = SystemConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);

        fs::remove_file(&path).unwrap();
        assert!(matches!(SystemConfig::from_file(&path), Err(ConfigError::IoError { .. })));
    }
}
