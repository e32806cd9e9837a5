//! padpoll-core: HID report decoding and change-aware state reporting.
//!
//! This crate turns the fixed-layout input reports of supported game
//! controllers into polled analog channel and button state, and decides
//! when that state is reported to subscribers.

pub mod acceptor;
pub mod config;
pub mod device;
pub mod error;
pub mod evdev;
pub mod layout;
pub mod poll;
pub mod report;
pub mod state;
pub mod transport;

/// USB vendor IDs of supported hardware.
pub mod vids {
    /// Aimon.
    pub const AIMON: u16 = 0x0866;
    /// Lenovo (6127).
    pub const LENOVO: u16 = 0x17EF;
}

/// USB product IDs of supported hardware.
pub mod pids {
    /// Aimon PS Elite.
    pub const AIMON_PS_ELITE: u16 = 0x0001;
    /// Lenovo G120 wireless joystick/mouse (24586).
    pub const LENOVO_G120: u16 = 0x600A;
}
