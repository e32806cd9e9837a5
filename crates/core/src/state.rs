//! Polled device state and the capability interfaces over it.

use crate::error::{Error, Result};
use crate::report::{AnalogReport, ButtonReport, Report, ReportSink};
use std::time::SystemTime;

/// Something that exposes analog channel values.
pub trait AnalogSource {
    fn channels(&self) -> &[f64];
}

/// Something that exposes button states.
pub trait ButtonSource {
    fn buttons(&self) -> &[bool];
}

/// Something that consumes raw input reports delivered by a transport.
///
/// The report slice is only borrowed for the duration of the call.
pub trait RawReportConsumer {
    fn on_data_received(&mut self, report: &[u8], sink: &mut dyn ReportSink) -> Result<()>;
}

/// Current channel and button values plus the last reported snapshot.
///
/// The snapshot is only updated when a report is actually emitted, which is
/// what makes change detection correct.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    channels: Vec<f64>,
    buttons: Vec<bool>,
    last_channels: Vec<f64>,
    last_buttons: Vec<bool>,
    timestamp: SystemTime,
}

impl DeviceState {
    /// Zeroed state with fixed cardinality.
    pub fn new(channel_count: usize, button_count: usize, timestamp: SystemTime) -> Self {
        Self {
            channels: vec![0.0; channel_count],
            buttons: vec![false; button_count],
            last_channels: vec![0.0; channel_count],
            last_buttons: vec![false; button_count],
            timestamp,
        }
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: SystemTime) {
        self.timestamp = timestamp;
    }

    pub fn channels(&self) -> &[f64] {
        &self.channels
    }

    pub fn buttons(&self) -> &[bool] {
        &self.buttons
    }

    /// Last values that went out in a report.
    pub fn last_reported(&self) -> (&[f64], &[bool]) {
        (&self.last_channels, &self.last_buttons)
    }

    pub fn set_channel(&mut self, index: usize, value: f64) -> Result<()> {
        let len = self.channels.len();
        let slot = self.channels.get_mut(index).ok_or(Error::SlotOutOfRange {
            kind: "channel",
            index,
            len,
        })?;
        *slot = value;
        Ok(())
    }

    pub fn set_button(&mut self, index: usize, pressed: bool) -> Result<()> {
        let len = self.buttons.len();
        let slot = self.buttons.get_mut(index).ok_or(Error::SlotOutOfRange {
            kind: "button",
            index,
            len,
        })?;
        *slot = pressed;
        Ok(())
    }

    /// Fail unless this state has at least the given cardinality.
    pub fn check_shape(&self, channel_count: usize, button_count: usize) -> Result<()> {
        if channel_count > self.channels.len() {
            return Err(Error::SlotOutOfRange {
                kind: "channel",
                index: channel_count - 1,
                len: self.channels.len(),
            });
        }
        if button_count > self.buttons.len() {
            return Err(Error::SlotOutOfRange {
                kind: "button",
                index: button_count - 1,
                len: self.buttons.len(),
            });
        }
        Ok(())
    }

    /// Whether anything differs from the last reported snapshot.
    ///
    /// Channels compare with exact float equality.
    pub fn has_changed(&self) -> bool {
        self.channels != self.last_channels || self.buttons != self.last_buttons
    }

    /// Report the current values unconditionally and take the snapshot.
    pub fn report_always(&mut self, timestamp: SystemTime) -> Report {
        let report = Report {
            analog: AnalogReport {
                channels: self.channels.clone(),
                timestamp,
            },
            buttons: ButtonReport {
                buttons: self.buttons.clone(),
                timestamp,
            },
        };
        self.last_channels.clone_from(&self.channels);
        self.last_buttons.clone_from(&self.buttons);
        report
    }

    /// Report only when something changed since the last report.
    pub fn report_if_changed(&mut self, timestamp: SystemTime) -> Option<Report> {
        if self.has_changed() {
            Some(self.report_always(timestamp))
        } else {
            None
        }
    }
}
