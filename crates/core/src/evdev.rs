//! Linux input-event stream, used when raw HID reports are unavailable.
//!
//! Devices are found by probing `/dev/input/event0..255` and asking each
//! node for its identity record. Events arrive as native `struct
//! input_event` records: a `timeval` followed by type, code and value.

use crate::error::Result;
use std::ffi::c_long;

/// Event type and code constants from `linux/input-event-codes.h`.
pub mod codes {
    pub const EV_SYN: u16 = 0x00;
    pub const EV_KEY: u16 = 0x01;
    pub const EV_REL: u16 = 0x02;
    pub const EV_ABS: u16 = 0x03;
    pub const EV_LED: u16 = 0x11;

    pub const LED_MISC: u16 = 0x08;
}

/// Raw axis values are divided by this to produce channel values.
pub const AXIS_DIVISOR: f64 = 400.0;

/// Number of `/dev/input/eventN` nodes probed.
pub const EVENT_NODE_LIMIT: u32 = 256;

/// Size of one `struct input_event` on this platform.
pub const EVENT_SIZE: usize = 2 * std::mem::size_of::<c_long>() + 8;

/// Event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Sync,
    Key,
    Relative,
    Absolute,
    Led,
    Other(u16),
}

impl EventKind {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            codes::EV_SYN => Self::Sync,
            codes::EV_KEY => Self::Key,
            codes::EV_REL => Self::Relative,
            codes::EV_ABS => Self::Absolute,
            codes::EV_LED => Self::Led,
            other => Self::Other(other),
        }
    }

    pub fn as_raw(&self) -> u16 {
        match *self {
            Self::Sync => codes::EV_SYN,
            Self::Key => codes::EV_KEY,
            Self::Relative => codes::EV_REL,
            Self::Absolute => codes::EV_ABS,
            Self::Led => codes::EV_LED,
            Self::Other(raw) => raw,
        }
    }
}

/// One input event, without its kernel timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub kind: EventKind,
    pub code: u16,
    pub value: i32,
}

/// What an event does to device state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventUpdate {
    Button { index: usize, pressed: bool },
    Channel { index: usize, value: f64 },
    Ignored,
}

impl InputEvent {
    pub fn new(kind: EventKind, code: u16, value: i32) -> Self {
        Self { kind, code, value }
    }

    /// Indicator LED on/off request.
    pub fn led(on: bool) -> Self {
        Self::new(EventKind::Led, codes::LED_MISC, i32::from(on))
    }

    /// Parse a native-endian `struct input_event`.
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < EVENT_SIZE {
            return None;
        }
        let tail = &buf[EVENT_SIZE - 8..EVENT_SIZE];
        let kind = u16::from_ne_bytes([tail[0], tail[1]]);
        let code = u16::from_ne_bytes([tail[2], tail[3]]);
        let value = i32::from_ne_bytes([tail[4], tail[5], tail[6], tail[7]]);
        Some(Self::new(EventKind::from_raw(kind), code, value))
    }

    /// Encode as a native-endian `struct input_event` with a zero timestamp.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; EVENT_SIZE - 8];
        buf.extend_from_slice(&self.kind.as_raw().to_ne_bytes());
        buf.extend_from_slice(&self.code.to_ne_bytes());
        buf.extend_from_slice(&self.value.to_ne_bytes());
        buf
    }

    /// Map the event onto a button or channel slot.
    ///
    /// Key events address button `code & 0xff`; relative and absolute axis
    /// events address channel `code`.
    pub fn classify(&self) -> EventUpdate {
        match self.kind {
            EventKind::Key => EventUpdate::Button {
                index: usize::from(self.code & 0x00FF),
                pressed: self.value != 0,
            },
            EventKind::Relative | EventKind::Absolute => EventUpdate::Channel {
                index: usize::from(self.code),
                value: f64::from(self.value) / AXIS_DIVISOR,
            },
            _ => EventUpdate::Ignored,
        }
    }
}

/// Non-blocking source of input events.
pub trait EventSource {
    /// Zero-timeout readiness check.
    fn poll_ready(&mut self) -> Result<bool>;

    /// Read one event. Only call after [`EventSource::poll_ready`] said ready.
    fn read_event(&mut self) -> Result<InputEvent>;

    /// Switch the device's indicator LED.
    fn set_led(&mut self, on: bool) -> Result<()>;
}

#[cfg(target_os = "linux")]
pub use self::linux::EvdevDevice;

#[cfg(target_os = "linux")]
mod linux {
    use super::{EventSource, InputEvent, EVENT_NODE_LIMIT, EVENT_SIZE};
    use crate::acceptor::{DeviceIdentity, HidAcceptor};
    use crate::error::{Error, Result};
    use std::fs::{File, OpenOptions};
    use std::io::{Read, Write};
    use std::os::unix::io::AsRawFd;
    use std::path::{Path, PathBuf};
    use tracing::{debug, trace};

    const IOC_NRSHIFT: u32 = 0;
    const IOC_TYPESHIFT: u32 = 8;
    const IOC_SIZESHIFT: u32 = 16;
    const IOC_DIRSHIFT: u32 = 30;
    const IOC_READ: u32 = 2;

    const EVDEV_IOCTL_TYPE: u8 = b'E';
    const EVIOC_NR_GID: u8 = 0x02;

    /// `struct input_id`.
    #[repr(C)]
    #[derive(Debug, Default, Clone, Copy)]
    struct InputId {
        bustype: u16,
        vendor: u16,
        product: u16,
        version: u16,
    }

    const fn ior_read<T>(kind: u8, nr: u8) -> libc::c_ulong {
        ((IOC_READ << IOC_DIRSHIFT)
            | ((kind as u32) << IOC_TYPESHIFT)
            | ((nr as u32) << IOC_NRSHIFT)
            | ((std::mem::size_of::<T>() as u32) << IOC_SIZESHIFT)) as libc::c_ulong
    }

    const EVIOCGID: libc::c_ulong = ior_read::<InputId>(EVDEV_IOCTL_TYPE, EVIOC_NR_GID);

    fn query_id(file: &File) -> std::io::Result<InputId> {
        let mut id = InputId::default();
        let rc = unsafe { libc::ioctl(file.as_raw_fd(), EVIOCGID, &mut id as *mut InputId) };
        if rc < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(id)
    }

    /// An opened `/dev/input/eventN` node.
    pub struct EvdevDevice {
        file: File,
        path: PathBuf,
        id: InputId,
    }

    impl EvdevDevice {
        /// Probe event nodes in order and open the first one the acceptor takes.
        pub fn open_matching(acceptor: &mut dyn HidAcceptor) -> Result<Self> {
            acceptor.reset();

            for index in 0..EVENT_NODE_LIMIT {
                let path = PathBuf::from(format!("/dev/input/event{index}"));
                let file = match OpenOptions::new().read(true).write(true).open(&path) {
                    Ok(file) => file,
                    Err(_) => continue,
                };
                let id = match query_id(&file) {
                    Ok(id) => id,
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "EVIOCGID failed");
                        continue;
                    }
                };

                let identity = DeviceIdentity::new(id.vendor, id.product);
                if acceptor.accept(&identity) {
                    debug!(path = %path.display(), identity = %identity, "Event node accepted");
                    return Ok(Self { file, path, id });
                }
                trace!(path = %path.display(), identity = %identity, "Event node rejected");
            }

            Err(Error::DeviceNotFound(format!(
                "no /dev/input/event0..{} node matched the acceptor",
                EVENT_NODE_LIMIT - 1
            )))
        }

        pub fn path(&self) -> &Path {
            &self.path
        }

        pub fn identity(&self) -> DeviceIdentity {
            DeviceIdentity::new(self.id.vendor, self.id.product)
        }

        pub fn bus_type(&self) -> u16 {
            self.id.bustype
        }

        pub fn version(&self) -> u16 {
            self.id.version
        }
    }

    impl EventSource for EvdevDevice {
        fn poll_ready(&mut self) -> Result<bool> {
            let mut pfd = libc::pollfd {
                fd: self.file.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            };
            loop {
                let rc = unsafe { libc::poll(&mut pfd, 1, 0) };
                if rc < 0 {
                    let err = std::io::Error::last_os_error();
                    if err.kind() == std::io::ErrorKind::Interrupted {
                        continue;
                    }
                    return Err(Error::EventRead(format!("poll: {err}")));
                }
                // Error and hangup count as ready so the read reports them.
                let ready = libc::POLLIN | libc::POLLERR | libc::POLLHUP;
                return Ok(rc > 0 && pfd.revents & ready != 0);
            }
        }

        fn read_event(&mut self) -> Result<InputEvent> {
            let mut buf = [0u8; EVENT_SIZE];
            self.file
                .read_exact(&mut buf)
                .map_err(|e| Error::EventRead(format!("{}: {e}", self.path.display())))?;
            InputEvent::from_bytes(&buf)
                .ok_or_else(|| Error::EventRead("short input event".to_string()))
        }

        fn set_led(&mut self, on: bool) -> Result<()> {
            self.file
                .write_all(&InputEvent::led(on).to_bytes())
                .map_err(|e| Error::LedWrite(format!("{}: {e}", self.path.display())))
        }
    }

}
