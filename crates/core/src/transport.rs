//! Raw report transport abstraction.
//!
//! Provides a trait-based transport layer so that real HID devices and
//! scripted mock devices share the same interface.

use crate::acceptor::HidAcceptor;
use crate::device::open_hid_device;
use crate::error::{Error, Result};
use tracing::trace;

/// Largest input report read in one call.
pub const MAX_REPORT_LEN: usize = 256;

/// Abstraction over non-blocking raw HID input.
pub trait ReportSource {
    /// Read one pending input report into `buf` without blocking.
    ///
    /// Returns the report length, or 0 when nothing is pending.
    fn read_report(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// [`ReportSource`] backed by an open hidapi device.
pub struct HidapiSource {
    device: hidapi::HidDevice,
}

impl HidapiSource {
    pub fn new(device: hidapi::HidDevice) -> Self {
        Self { device }
    }

    /// Open the first attached device the acceptor selects.
    pub fn open(acceptor: &mut dyn HidAcceptor) -> Result<Self> {
        open_hid_device(acceptor).map(Self::new)
    }
}

impl ReportSource for HidapiSource {
    fn read_report(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self
            .device
            .read_timeout(buf, 0)
            .map_err(|e| Error::Hid(format!("read_timeout: {e}")))?;
        if n > 0 {
            trace!(len = n, report_hex = format_args!("{:02X?}", &buf[..n]), "HID RX");
        }
        Ok(n)
    }
}

/// Scripted transports and a recording sink for testing.
#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::evdev::{EventSource, InputEvent};
    use crate::report::{AnalogReport, ButtonReport, ReportSink, Severity};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::SystemTime;

    enum Scripted<T> {
        Item(T),
        /// Nothing pending for one read.
        Idle,
        Fail(String),
    }

    /// Report source replaying a fixed script.
    #[derive(Default)]
    pub struct MockReportSource {
        script: VecDeque<Scripted<Vec<u8>>>,
    }

    impl MockReportSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_report(&mut self, report: &[u8]) {
            self.script.push_back(Scripted::Item(report.to_vec()));
        }

        /// End the current batch: the next read sees nothing pending.
        pub fn push_idle(&mut self) {
            self.script.push_back(Scripted::Idle);
        }

        pub fn push_failure(&mut self, message: &str) {
            self.script.push_back(Scripted::Fail(message.to_string()));
        }
    }

    impl ReportSource for MockReportSource {
        fn read_report(&mut self, buf: &mut [u8]) -> Result<usize> {
            match self.script.pop_front() {
                Some(Scripted::Item(report)) => {
                    let n = report.len().min(buf.len());
                    buf[..n].copy_from_slice(&report[..n]);
                    Ok(n)
                }
                Some(Scripted::Fail(message)) => Err(Error::Hid(message)),
                Some(Scripted::Idle) | None => Ok(0),
            }
        }
    }

    /// Event source replaying a fixed script and recording LED writes.
    #[derive(Default)]
    pub struct MockEventSource {
        script: VecDeque<Scripted<InputEvent>>,
        leds: Arc<Mutex<Vec<bool>>>,
        fail_led: bool,
    }

    impl MockEventSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_event(&mut self, event: InputEvent) {
            self.script.push_back(Scripted::Item(event));
        }

        pub fn push_idle(&mut self) {
            self.script.push_back(Scripted::Idle);
        }

        pub fn push_failure(&mut self, message: &str) {
            self.script.push_back(Scripted::Fail(message.to_string()));
        }

        /// Make every LED write fail.
        pub fn fail_led_writes(&mut self) {
            self.fail_led = true;
        }

        /// Shared log of LED states written, readable after the source is moved.
        pub fn led_log(&self) -> Arc<Mutex<Vec<bool>>> {
            Arc::clone(&self.leds)
        }
    }

    impl EventSource for MockEventSource {
        fn poll_ready(&mut self) -> Result<bool> {
            match self.script.front() {
                Some(Scripted::Item(_)) | Some(Scripted::Fail(_)) => Ok(true),
                Some(Scripted::Idle) => {
                    self.script.pop_front();
                    Ok(false)
                }
                None => Ok(false),
            }
        }

        fn read_event(&mut self) -> Result<InputEvent> {
            match self.script.pop_front() {
                Some(Scripted::Item(event)) => Ok(event),
                Some(Scripted::Fail(message)) => Err(Error::EventRead(message)),
                Some(Scripted::Idle) | None => {
                    Err(Error::EventRead("read with nothing pending".to_string()))
                }
            }
        }

        fn set_led(&mut self, on: bool) -> Result<()> {
            if self.fail_led {
                return Err(Error::LedWrite("mock: LED write rejected".to_string()));
            }
            self.leds.lock().unwrap().push(on);
            Ok(())
        }
    }

    /// Sink keeping everything it is sent.
    #[derive(Default)]
    pub struct RecordingSink {
        pub analog: Vec<AnalogReport>,
        pub buttons: Vec<ButtonReport>,
        pub texts: Vec<(Severity, String, SystemTime)>,
        pub flushes: usize,
    }

    impl ReportSink for RecordingSink {
        fn send_analog(&mut self, report: &AnalogReport) {
            self.analog.push(report.clone());
        }

        fn send_buttons(&mut self, report: &ButtonReport) {
            self.buttons.push(report.clone());
        }

        fn send_text(&mut self, severity: Severity, message: &str, timestamp: SystemTime) {
            self.texts.push((severity, message.to_string(), timestamp));
        }

        fn flush(&mut self) {
            self.flushes += 1;
        }
    }
}
