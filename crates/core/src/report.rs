//! Outbound reports and the policy deciding when they are emitted.

use crate::state::DeviceState;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use tracing::trace;

/// Current analog channel values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalogReport {
    pub channels: Vec<f64>,
    pub timestamp: SystemTime,
}

/// Current button states.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ButtonReport {
    pub buttons: Vec<bool>,
    pub timestamp: SystemTime,
}

/// The analog and button reports produced by one reporting call.
///
/// Both halves always carry the same timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub analog: AnalogReport,
    pub buttons: ButtonReport,
}

/// Severity of a diagnostic text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// Outbound side: whatever transmits reports to subscribers.
pub trait ReportSink {
    fn send_analog(&mut self, report: &AnalogReport);

    fn send_buttons(&mut self, report: &ButtonReport);

    fn send_text(&mut self, severity: Severity, message: &str, timestamp: SystemTime);

    /// Push out anything buffered.
    fn flush(&mut self) {}

    fn send_report(&mut self, report: &Report) {
        self.send_analog(&report.analog);
        self.send_buttons(&report.buttons);
    }
}

/// Source of timestamps.
pub trait Clock {
    fn now(&self) -> SystemTime;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// When a reporting step emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum ReportPolicy {
    /// Only when a channel or button differs from the last report.
    #[default]
    Changes,
    /// Every reporting step.
    Always,
    /// Unconditionally once per interval, otherwise only on change.
    Heartbeat { interval_ms: u64 },
}

/// Applies a [`ReportPolicy`] to a device state.
#[derive(Debug, Clone)]
pub struct Reporter {
    policy: ReportPolicy,
    last_full: Option<SystemTime>,
}

impl Reporter {
    pub fn new(policy: ReportPolicy) -> Self {
        Self {
            policy,
            last_full: None,
        }
    }

    pub fn policy(&self) -> ReportPolicy {
        self.policy
    }

    fn full_report_due(&self, timestamp: SystemTime) -> bool {
        match self.policy {
            ReportPolicy::Changes => false,
            ReportPolicy::Always => true,
            ReportPolicy::Heartbeat { interval_ms } => match self.last_full {
                None => true,
                // A clock step backwards re-anchors the heartbeat.
                Some(last) => timestamp
                    .duration_since(last)
                    .map_or(true, |elapsed| elapsed >= Duration::from_millis(interval_ms)),
            },
        }
    }

    /// Run one reporting step against `state`, stamped with its timestamp.
    pub fn report(&mut self, state: &mut DeviceState) -> Option<Report> {
        let timestamp = state.timestamp();
        if self.full_report_due(timestamp) {
            self.last_full = Some(timestamp);
            Some(state.report_always(timestamp))
        } else {
            state.report_if_changed(timestamp)
        }
    }

    /// Run one reporting step and hand any report to `sink`.
    pub fn report_to(&mut self, state: &mut DeviceState, sink: &mut dyn ReportSink) -> bool {
        match self.report(state) {
            Some(report) => {
                trace!(
                    channels = report.analog.channels.len(),
                    buttons = report.buttons.buttons.len(),
                    "Emitting report"
                );
                sink.send_report(&report);
                true
            }
            None => false,
        }
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(ReportPolicy::default())
    }
}
