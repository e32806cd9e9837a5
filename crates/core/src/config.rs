//! Polling configuration and its range checks.
//!
//! # Ranges
//!
//! - **poll_interval_ms**: 1 – 1000. Controllers report at 125–1000 Hz; a
//!   slower loop only grows the transport backlog.
//! - **heartbeat interval_ms**: 1 – 60000.
//! - **device_index**: 0 – 255, the n-th attached unit of the model in
//!   discovery order.

use crate::device::DeviceModel;
use crate::error::{Error, Result};
use crate::report::ReportPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Minimum loop interval in milliseconds.
pub const POLL_INTERVAL_MIN_MS: u64 = 1;
/// Maximum loop interval in milliseconds.
pub const POLL_INTERVAL_MAX_MS: u64 = 1000;
/// Minimum heartbeat interval in milliseconds.
pub const HEARTBEAT_MIN_MS: u64 = 1;
/// Maximum heartbeat interval in milliseconds.
pub const HEARTBEAT_MAX_MS: u64 = 60_000;
/// Highest selectable unit index.
pub const DEVICE_INDEX_MAX: usize = 255;

/// Which transport a device is polled through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportPreference {
    /// Raw HID reports, falling back to input events where the model allows.
    #[default]
    Auto,
    Hid,
    Event,
}

impl TransportPreference {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "hid" => Some(Self::Hid),
            "event" | "evdev" => Some(Self::Event),
            _ => None,
        }
    }
}

/// Everything needed to attach to and poll one controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub model: DeviceModel,
    /// Overrides the model's default unit selection.
    pub device_index: Option<usize>,
    pub transport: TransportPreference,
    pub report_policy: ReportPolicy,
    pub poll_interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            model: DeviceModel::AimonElite,
            device_index: None,
            transport: TransportPreference::Auto,
            report_policy: ReportPolicy::Changes,
            poll_interval_ms: 10,
        }
    }
}

impl PollConfig {
    /// Parse a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
        let config = Self::from_json_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Unit index to open, after applying the model default.
    pub fn effective_device_index(&self) -> usize {
        self.device_index
            .unwrap_or_else(|| self.model.default_match_index())
    }

    /// Check every field against its accepted range.
    pub fn validate(&self) -> Result<()> {
        check_range(
            "poll_interval_ms",
            self.poll_interval_ms,
            POLL_INTERVAL_MIN_MS,
            POLL_INTERVAL_MAX_MS,
        )?;
        if let ReportPolicy::Heartbeat { interval_ms } = self.report_policy {
            check_range(
                "heartbeat interval_ms",
                interval_ms,
                HEARTBEAT_MIN_MS,
                HEARTBEAT_MAX_MS,
            )?;
        }
        if let Some(index) = self.device_index {
            check_range("device_index", index as u64, 0, DEVICE_INDEX_MAX as u64)?;
        }
        Ok(())
    }
}

fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(Error::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PollConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_device_index(), 0);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = PollConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PollConfig::default());
    }

    #[test]
    fn full_document_parses() {
        let config = PollConfig::from_json_str(
            r#"{
                "model": "lenovo-g120",
                "device_index": 0,
                "transport": "event",
                "report_policy": { "mode": "heartbeat", "interval_ms": 500 },
                "poll_interval_ms": 4
            }"#,
        )
        .unwrap();
        assert_eq!(config.model, DeviceModel::LenovoG120);
        assert_eq!(config.transport, TransportPreference::Event);
        assert_eq!(
            config.report_policy,
            ReportPolicy::Heartbeat { interval_ms: 500 }
        );
        assert_eq!(config.effective_device_index(), 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn g120_defaults_to_second_unit() {
        let config = PollConfig::from_json_str(r#"{"model":"lenovo-g120"}"#).unwrap();
        assert_eq!(config.effective_device_index(), 1);
    }

    #[test]
    fn unknown_model_is_a_config_error() {
        let err = PollConfig::from_json_str(r#"{"model":"g502"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn poll_interval_bounds() {
        let mut config = PollConfig {
            poll_interval_ms: 0,
            ..PollConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::OutOfRange {
                field: "poll_interval_ms",
                ..
            })
        ));
        config.poll_interval_ms = 1000;
        assert!(config.validate().is_ok());
        config.poll_interval_ms = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn heartbeat_bounds() {
        let config = PollConfig {
            report_policy: ReportPolicy::Heartbeat { interval_ms: 0 },
            ..PollConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn device_index_bounds() {
        let config = PollConfig {
            device_index: Some(256),
            ..PollConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn transport_from_name_accepts_variants() {
        assert_eq!(
            TransportPreference::from_name("EVDEV"),
            Some(TransportPreference::Event)
        );
        assert_eq!(
            TransportPreference::from_name("hid"),
            Some(TransportPreference::Hid)
        );
        assert_eq!(TransportPreference::from_name("usb"), None);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = PollConfig::load(Path::new("/nonexistent/padpoll.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
