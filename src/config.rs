// Timeouts, ports, protocol strings and the settings document
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

// Blocking receive timeout for every listener loop
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

// Ports requested at bind time (0 = ephemeral, read back after bind)
pub const CONTROL_PORT: u16 = 0;
pub const STREAM_PORT: u16 = 0;

// Discovery (multicast probe / probe match)
pub const DISCOVERY_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
pub const DISCOVERY_PORT: u16 = 3703;
pub const DISCOVERY_TTL: u32 = 8;
pub const PROBE: &[u8] = b"CAM-ROVER:PROBE";
pub const PROBE_MATCH_PREFIX: &str = "CAM-ROVER:PROBE_MATCH";

// Largest outbound datagram (camera frames are never fragmented)
pub const MAX_DATAGRAM: usize = 64 * 1024 - 128;

// PWM timing for the drive motors
pub const TIMER_RESOLUTION_HZ: u32 = 1_000_000;
pub const PWM_FREQ_HZ: u32 = 10_000;

// Upper bound on duty_tick_max, which sizes the precomputed speed curve
pub const MAX_DUTY_TICKS: u32 = 65_535;

// Settings files larger than this are rejected before parsing
pub const MAX_SETTINGS_BYTES: u64 = 64 * 1024;

/// Runtime settings, loaded from an optional JSON file and overridden from the CLI.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub control_port: u16,
    pub stream_port: u16,
    pub drive: DriveSettings,
    pub discovery: DiscoverySettings,
    pub camera: CameraSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            control_port: CONTROL_PORT,
            stream_port: STREAM_PORT,
            drive: DriveSettings::default(),
            discovery: DiscoverySettings::default(),
            camera: CameraSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DriveSettings {
    pub timer_resolution_hz: u32,
    pub pwm_freq_hz: u32,
    /// Defaults to a third of the duty tick range when unset
    pub deadzone: Option<u32>,
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self {
            timer_resolution_hz: TIMER_RESOLUTION_HZ,
            pwm_freq_hz: PWM_FREQ_HZ,
            deadzone: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiscoverySettings {
    pub enabled: bool,
    pub group: Ipv4Addr,
    pub port: u16,
    pub ttl: u32,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            group: DISCOVERY_GROUP,
            port: DISCOVERY_PORT,
            ttl: DISCOVERY_TTL,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraSettings {
    /// Synthetic frames per second, 0 disables the test pattern
    pub test_pattern_fps: u32,
    pub test_pattern_size: usize,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            test_pattern_fps: 0,
            test_pattern_size: 16 * 1024,
        }
    }
}

impl Settings {
    /// Read settings from a JSON file, refusing oversized files.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let size = std::fs::metadata(path)?.len();
        if size > MAX_SETTINGS_BYTES {
            return Err(ConfigError::TooLarge {
                size,
                max: MAX_SETTINGS_BYTES,
            });
        }

        let raw = std::fs::read(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &[u8]) -> Result<Self, ConfigError> {
        Ok(serde_json::from_slice(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let settings = Settings::from_json(b"{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.discovery.port, 3703);
        assert_eq!(settings.discovery.group, Ipv4Addr::new(239, 255, 255, 250));
        assert!(settings.drive.deadzone.is_none());
    }

    #[test]
    fn test_partial_document_overrides_fields() {
        let json = br#"{
            "control_port": 4100,
            "drive": { "pwm_freq_hz": 20000, "deadzone": 12 },
            "discovery": { "enabled": false }
        }"#;

        let settings = Settings::from_json(json).unwrap();
        assert_eq!(settings.control_port, 4100);
        assert_eq!(settings.stream_port, STREAM_PORT);
        assert_eq!(settings.drive.pwm_freq_hz, 20_000);
        assert_eq!(settings.drive.timer_resolution_hz, TIMER_RESOLUTION_HZ);
        assert_eq!(settings.drive.deadzone, Some(12));
        assert!(!settings.discovery.enabled);
        assert_eq!(settings.discovery.ttl, DISCOVERY_TTL);
    }

    #[test]
    fn test_malformed_document_is_rejected() {
        let err = Settings::from_json(b"{ \"control_port\": \"x\" }").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_oversized_file_is_rejected() {
        let path = std::env::temp_dir().join(format!("cam-rover-big-{}.json", std::process::id()));
        std::fs::write(&path, vec![b' '; MAX_SETTINGS_BYTES as usize + 1]).unwrap();

        let err = Settings::load(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, ConfigError::TooLarge { .. }));
    }

    #[test]
    fn test_oversized_drive_timing_is_rejected() {
        let json = br#"{ "drive": { "timer_resolution_hz": 4294967295, "pwm_freq_hz": 3 } }"#;
        let settings = Settings::from_json(json).unwrap();

        let err = crate::motor::DriveConfig::from_settings(&settings.drive).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDrive { .. }));
    }

    #[test]
    fn test_max_datagram_matches_wire_cap() {
        assert_eq!(MAX_DATAGRAM, 65_408);
    }
}
