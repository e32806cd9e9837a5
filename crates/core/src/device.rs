//! Device model table and HID discovery.

use crate::acceptor::{AcceptorExt, DeviceIdentity, HidAcceptor, ProductAcceptor};
use crate::error::{Error, Result};
use crate::layout::{self, ModelLayout};
use crate::{pids, vids};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Supported controller models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceModel {
    AimonElite,
    LenovoG120,
}

impl DeviceModel {
    /// All supported models.
    pub const ALL: &'static [DeviceModel] = &[DeviceModel::AimonElite, DeviceModel::LenovoG120];

    /// Look up a model from its USB identity.
    pub fn from_identity(identity: &DeviceIdentity) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|model| model.identity() == *identity)
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AimonElite => "Aimon PS Elite",
            Self::LenovoG120 => "Lenovo G120",
        }
    }

    /// CLI/config spelling.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::AimonElite => "aimon-elite",
            Self::LenovoG120 => "lenovo-g120",
        }
    }

    /// Parse the CLI/config spelling (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "aimon-elite" | "aimon" | "aimonelite" => Some(Self::AimonElite),
            "lenovo-g120" | "g120" | "lenovog120" => Some(Self::LenovoG120),
            _ => None,
        }
    }

    /// USB vendor/product pair.
    pub fn identity(&self) -> DeviceIdentity {
        match self {
            Self::AimonElite => DeviceIdentity::new(vids::AIMON, pids::AIMON_PS_ELITE),
            Self::LenovoG120 => DeviceIdentity::new(vids::LENOVO, pids::LENOVO_G120),
        }
    }

    /// Fixed report layout for this model.
    pub fn layout(&self) -> &'static ModelLayout {
        match self {
            Self::AimonElite => &layout::AIMON_ELITE,
            Self::LenovoG120 => &layout::LENOVO_G120,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.layout().channels.len()
    }

    pub fn button_count(&self) -> usize {
        self.layout().buttons.len()
    }

    /// Which matching unit to drive when several are attached.
    ///
    /// The G120 enumerates a second interface ahead of the joystick one.
    pub fn default_match_index(&self) -> usize {
        match self {
            Self::AimonElite => 0,
            Self::LenovoG120 => 1,
        }
    }

    /// Acceptor selecting the `index`-th matching unit of this model.
    pub fn acceptor_for_index(&self, index: usize) -> Box<dyn HidAcceptor> {
        let id = self.identity();
        let exact = ProductAcceptor::new(id.vendor_id, id.product_id);
        if index == 0 {
            Box::new(exact)
        } else {
            Box::new(exact.nth(index))
        }
    }

    /// Acceptor used when the caller does not pick a unit.
    pub fn default_acceptor(&self) -> Box<dyn HidAcceptor> {
        self.acceptor_for_index(self.default_match_index())
    }

    /// Whether the Linux input-event stream can stand in for raw HID reports.
    pub fn supports_event_fallback(&self) -> bool {
        matches!(self, Self::LenovoG120)
    }
}

impl std::fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Information about a discovered controller.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub model: DeviceModel,
    pub identity: DeviceIdentity,
    pub path: String,
    pub serial: Option<String>,
    pub interface_number: i32,
}

/// Discover all connected supported controllers.
///
/// Enumerates USB HID devices and returns info for any recognized models.
pub fn discover_devices() -> Result<Vec<DeviceInfo>> {
    debug!("Starting HID device enumeration");
    let api = hidapi::HidApi::new().map_err(|e| Error::Hid(e.to_string()))?;

    let mut devices = Vec::new();
    for info in api.device_list() {
        let identity = DeviceIdentity::new(info.vendor_id(), info.product_id());
        if let Some(model) = DeviceModel::from_identity(&identity) {
            info!(
                model = model.name(),
                vid = format_args!("0x{:04X}", identity.vendor_id),
                pid = format_args!("0x{:04X}", identity.product_id),
                path = %info.path().to_string_lossy(),
                "Found supported controller"
            );
            devices.push(DeviceInfo {
                model,
                identity,
                path: info.path().to_string_lossy().into_owned(),
                serial: info.serial_number().map(|s| s.to_string()),
                interface_number: info.interface_number(),
            });
        }
    }

    debug!(count = devices.len(), "Device enumeration complete");
    Ok(devices)
}

/// Open the first HID device the acceptor selects, in enumeration order.
pub fn open_hid_device(acceptor: &mut dyn HidAcceptor) -> Result<hidapi::HidDevice> {
    let api = hidapi::HidApi::new().map_err(|e| Error::Hid(e.to_string()))?;
    acceptor.reset();

    for info in api.device_list() {
        let identity = DeviceIdentity::new(info.vendor_id(), info.product_id());
        if !acceptor.accept(&identity) {
            continue;
        }
        let device = info.open_device(&api).map_err(|e| {
            Error::Hid(format!(
                "open HID device (VID=0x{:04X} PID=0x{:04X}): {e}",
                identity.vendor_id, identity.product_id
            ))
        })?;
        device
            .set_blocking_mode(false)
            .map_err(|e| Error::Hid(format!("set non-blocking: {e}")))?;
        info!(
            vid = format_args!("0x{:04X}", identity.vendor_id),
            pid = format_args!("0x{:04X}", identity.product_id),
            path = %info.path().to_string_lossy(),
            "Opened HID device"
        );
        return Ok(device);
    }

    Err(Error::DeviceNotFound(
        "no attached HID device matched the acceptor".to_string(),
    ))
}
