//! The poll loop: one decode-then-report cycle per call.
//!
//! A [`PollStrategy`] yields whatever input is ready without blocking, raw
//! HID reports on the primary path or input events on the fallback path.
//! [`InputDevice`] owns the state and drives each cycle strictly in order:
//! drain and apply inputs, report, then refresh the timestamp for the next
//! cycle.

use crate::acceptor::HidAcceptor;
use crate::config::{PollConfig, TransportPreference};
use crate::device::DeviceModel;
use crate::error::{Error, Result};
use crate::evdev::{EventSource, EventUpdate, InputEvent};
use crate::layout::ModelLayout;
use crate::report::{Clock, ReportPolicy, ReportSink, Reporter, Severity, SystemClock};
use crate::state::{AnalogSource, ButtonSource, DeviceState, RawReportConsumer};
use crate::transport::{HidapiSource, ReportSource, MAX_REPORT_LEN};
use tracing::{debug, error, info, warn};

/// One unit of ready input.
#[derive(Debug)]
pub enum Input<'a> {
    /// A raw report, borrowed until the next call to the strategy.
    Report(&'a [u8]),
    Event(InputEvent),
}

/// How a device's input is fetched each cycle.
pub trait PollStrategy {
    fn name(&self) -> &'static str;

    /// The next ready input, or `None` once nothing more is ready.
    ///
    /// Never blocks.
    fn next_input(&mut self) -> Result<Option<Input<'_>>>;
}

/// Primary path: raw reports from a HID transport.
pub struct HidReportStrategy<S> {
    source: S,
    buf: [u8; MAX_REPORT_LEN],
}

impl<S: ReportSource> HidReportStrategy<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            buf: [0u8; MAX_REPORT_LEN],
        }
    }
}

impl<S: ReportSource> PollStrategy for HidReportStrategy<S> {
    fn name(&self) -> &'static str {
        "hid"
    }

    fn next_input(&mut self) -> Result<Option<Input<'_>>> {
        let n = self.source.read_report(&mut self.buf)?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(Input::Report(&self.buf[..n])))
    }
}

/// Fallback path: the input event stream.
///
/// The indicator LED is switched on when the strategy is built and off when
/// it is dropped.
pub struct EventStrategy<E: EventSource> {
    source: E,
}

impl<E: EventSource> EventStrategy<E> {
    pub fn new(mut source: E) -> Self {
        if let Err(e) = source.set_led(true) {
            warn!(error = %e, "Setting LED state failed");
        }
        Self { source }
    }
}

impl<E: EventSource> PollStrategy for EventStrategy<E> {
    fn name(&self) -> &'static str {
        "event"
    }

    fn next_input(&mut self) -> Result<Option<Input<'_>>> {
        if !self.source.poll_ready()? {
            return Ok(None);
        }
        self.source.read_event().map(|event| Some(Input::Event(event)))
    }
}

impl<E: EventSource> Drop for EventStrategy<E> {
    fn drop(&mut self) {
        if let Err(e) = self.source.set_led(false) {
            warn!(error = %e, "Setting LED state failed");
        }
    }
}

/// Pick and open the strategy for `model`.
///
/// `Auto` tries the HID transport first and falls back to the event stream
/// for models that support it.
pub fn open_strategy(
    model: DeviceModel,
    acceptor: &mut dyn HidAcceptor,
    preference: TransportPreference,
) -> Result<Box<dyn PollStrategy>> {
    match preference {
        TransportPreference::Hid => {
            let source = HidapiSource::open(acceptor)?;
            Ok(Box::new(HidReportStrategy::new(source)))
        }
        TransportPreference::Event => open_event_strategy(model, acceptor),
        TransportPreference::Auto => match HidapiSource::open(acceptor) {
            Ok(source) => Ok(Box::new(HidReportStrategy::new(source))),
            Err(e) if model.supports_event_fallback() => {
                info!(
                    error = %e,
                    model = model.name(),
                    "HID transport unavailable, using input events"
                );
                open_event_strategy(model, acceptor)
            }
            Err(e) => Err(e),
        },
    }
}

#[cfg(target_os = "linux")]
fn open_event_strategy(
    model: DeviceModel,
    acceptor: &mut dyn HidAcceptor,
) -> Result<Box<dyn PollStrategy>> {
    if !model.supports_event_fallback() {
        return Err(Error::DeviceNotFound(format!(
            "{} has no input event fallback",
            model.name()
        )));
    }
    let device = crate::evdev::EvdevDevice::open_matching(acceptor)?;
    info!(
        identity = %device.identity(),
        bustype = device.bus_type(),
        version = device.version(),
        path = %device.path().display(),
        "Opened input event device"
    );
    Ok(Box::new(EventStrategy::new(device)))
}

#[cfg(not(target_os = "linux"))]
fn open_event_strategy(
    model: DeviceModel,
    _acceptor: &mut dyn HidAcceptor,
) -> Result<Box<dyn PollStrategy>> {
    Err(Error::DeviceNotFound(format!(
        "input event fallback for {} is only available on Linux",
        model.name()
    )))
}

/// One attached controller: its state, reporting policy and input path.
pub struct InputDevice {
    model: DeviceModel,
    state: DeviceState,
    reporter: Reporter,
    strategy: Box<dyn PollStrategy>,
    clock: Box<dyn Clock>,
}

impl InputDevice {
    pub fn new(
        model: DeviceModel,
        strategy: Box<dyn PollStrategy>,
        reporter: Reporter,
        clock: Box<dyn Clock>,
    ) -> Self {
        let state = DeviceState::new(model.channel_count(), model.button_count(), clock.now());
        Self {
            model,
            state,
            reporter,
            strategy,
            clock,
        }
    }

    /// Attach to the device described by `config`.
    pub fn open(config: &PollConfig) -> Result<Self> {
        config.validate()?;
        let model = config.model;
        let mut acceptor = model.acceptor_for_index(config.effective_device_index());
        let strategy = open_strategy(model, acceptor.as_mut(), config.transport)?;
        let device = Self::new(
            model,
            strategy,
            Reporter::new(config.report_policy),
            Box::new(SystemClock),
        );
        info!(
            model = model.name(),
            strategy = device.strategy_name(),
            policy = ?device.policy(),
            "Device attached"
        );
        Ok(device)
    }

    pub fn model(&self) -> DeviceModel {
        self.model
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn policy(&self) -> ReportPolicy {
        self.reporter.policy()
    }

    /// Run one poll cycle.
    ///
    /// Every ready input is applied and followed by a reporting step; with
    /// nothing ready a single reporting step still runs. A read failure
    /// flushes `sink` and aborts the cycle with the error.
    pub fn mainloop(&mut self, sink: &mut dyn ReportSink) -> Result<()> {
        let layout = self.model.layout();
        let strategy_name = self.strategy.name();
        let mut received = 0usize;

        loop {
            let input = match self.strategy.next_input() {
                Ok(Some(input)) => input,
                Ok(None) => break,
                Err(e) => {
                    error!(
                        error = %e,
                        strategy = strategy_name,
                        "Read failed, aborting poll cycle"
                    );
                    sink.send_text(
                        Severity::Error,
                        &format!("Error reading from {}: {e}", self.model.name()),
                        self.state.timestamp(),
                    );
                    sink.flush();
                    return Err(e);
                }
            };
            received += 1;

            match input {
                Input::Report(report) => {
                    // Decode failures are logged and forwarded inside.
                    let clock = self.clock.as_ref();
                    let _ = decode_report(layout, report, &mut self.state, clock, sink);
                }
                Input::Event(event) => apply_event(&event, &mut self.state),
            }
            self.reporter.report_to(&mut self.state, sink);
        }

        if received == 0 {
            self.reporter.report_to(&mut self.state, sink);
        }
        self.state.set_timestamp(self.clock.now());
        Ok(())
    }
}

impl AnalogSource for InputDevice {
    fn channels(&self) -> &[f64] {
        self.state.channels()
    }
}

impl ButtonSource for InputDevice {
    fn buttons(&self) -> &[bool] {
        self.state.buttons()
    }
}

impl RawReportConsumer for InputDevice {
    /// Decode one report and run a reporting step.
    ///
    /// A report that fails to decode leaves the state as it was, timestamp
    /// included.
    fn on_data_received(&mut self, report: &[u8], sink: &mut dyn ReportSink) -> Result<()> {
        let decoded = decode_report(
            self.model.layout(),
            report,
            &mut self.state,
            self.clock.as_ref(),
            sink,
        );
        self.reporter.report_to(&mut self.state, sink);
        decoded
    }
}

fn decode_report(
    layout: &ModelLayout,
    report: &[u8],
    state: &mut DeviceState,
    clock: &dyn Clock,
    sink: &mut dyn ReportSink,
) -> Result<()> {
    let result = layout.decode(report, state);
    match &result {
        Ok(()) => {}
        Err(Error::PacketTooShort { expected, actual }) => {
            warn!(expected, actual, "Bad packet length");
            sink.send_text(
                Severity::Warning,
                &format!("Bad packet length, expected {expected} received {actual}."),
                clock.now(),
            );
        }
        Err(e) => {
            warn!(error = %e, len = report.len(), "Report decode failed");
            sink.send_text(
                Severity::Warning,
                &format!("Report decode failed: {e}"),
                clock.now(),
            );
        }
    }
    result
}

fn apply_event(event: &InputEvent, state: &mut DeviceState) {
    let applied = match event.classify() {
        EventUpdate::Button { index, pressed } => state.set_button(index, pressed),
        EventUpdate::Channel { index, value } => state.set_channel(index, value),
        EventUpdate::Ignored => Ok(()),
    };
    if let Err(e) = applied {
        debug!(error = %e, code = event.code, "Ignoring event outside device slots");
    }
}
