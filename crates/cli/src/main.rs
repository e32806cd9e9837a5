//! padpoll CLI: poll a game controller and stream its reports as JSON lines.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use padpoll_core::config::{PollConfig, TransportPreference};
use padpoll_core::device::DeviceModel;
use padpoll_core::poll::InputDevice;
use padpoll_core::report::{AnalogReport, ButtonReport, ReportPolicy, ReportSink, Severity};
use padpoll_core::state::DeviceState;
use serde::Serialize;
use std::io::{self, BufWriter, Stdout, Write};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// One outbound line.
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Message<'a> {
    Analog {
        channels: &'a [f64],
        timestamp: f64,
    },
    Button {
        buttons: &'a [bool],
        timestamp: f64,
    },
    Text {
        severity: Severity,
        message: &'a str,
        timestamp: f64,
    },
}

fn epoch_seconds(timestamp: SystemTime) -> f64 {
    timestamp
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Writes every report to stdout as one JSON object per line.
struct JsonLinesSink {
    out: BufWriter<Stdout>,
}

impl JsonLinesSink {
    fn new() -> Self {
        Self {
            out: BufWriter::new(io::stdout()),
        }
    }

    fn write(&mut self, message: &Message<'_>) {
        let written = serde_json::to_writer(&mut self.out, message)
            .map_err(io::Error::from)
            .and_then(|()| self.out.write_all(b"\n"));
        if let Err(e) = written {
            tracing::error!(error = %e, "Failed to write report");
        }
    }
}

impl ReportSink for JsonLinesSink {
    fn send_analog(&mut self, report: &AnalogReport) {
        self.write(&Message::Analog {
            channels: &report.channels,
            timestamp: epoch_seconds(report.timestamp),
        });
    }

    fn send_buttons(&mut self, report: &ButtonReport) {
        self.write(&Message::Button {
            buttons: &report.buttons,
            timestamp: epoch_seconds(report.timestamp),
        });
    }

    fn send_text(&mut self, severity: Severity, message: &str, timestamp: SystemTime) {
        self.write(&Message::Text {
            severity,
            message,
            timestamp: epoch_seconds(timestamp),
        });
    }

    fn flush(&mut self) {
        if let Err(e) = self.out.flush() {
            tracing::error!(error = %e, "Failed to flush reports");
        }
    }
}

#[derive(Parser)]
#[command(
    name = "padpoll",
    version,
    about = "Poll USB HID game controllers and stream their state"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List connected supported controllers.
    ListDevices,
    /// Poll a controller and print reports as JSON lines.
    Poll {
        /// JSON configuration file; flags below override it.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Model: aimon-elite or lenovo-g120.
        #[arg(long)]
        model: Option<String>,
        /// Which attached unit of the model to drive (0-based, discovery order).
        #[arg(long)]
        index: Option<usize>,
        /// Transport: auto, hid, or event.
        #[arg(long)]
        transport: Option<String>,
        /// Report every cycle instead of only on change.
        #[arg(long, conflicts_with = "heartbeat_ms")]
        always: bool,
        /// Report unconditionally at this interval, otherwise only on change.
        #[arg(long)]
        heartbeat_ms: Option<u64>,
        /// Sleep between poll cycles.
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Stop after this many cycles.
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Decode one hex-encoded raw report and print the resulting state.
    Decode {
        /// Model: aimon-elite or lenovo-g120.
        model: String,
        /// Report bytes as hex; spaces and colons are ignored.
        hex: String,
    },
}

fn parse_model(name: &str) -> Result<DeviceModel> {
    DeviceModel::from_name(name).ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown model '{}'. Valid models: aimon-elite, lenovo-g120",
            name
        )
    })
}

fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    if !digits.is_ascii() {
        anyhow::bail!("hex report contains non-hex characters");
    }
    if digits.len() % 2 != 0 {
        anyhow::bail!("hex report has an odd number of digits");
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .with_context(|| format!("invalid hex byte '{}'", &digits[i..i + 2]))
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn build_config(
    config: Option<PathBuf>,
    model: Option<String>,
    index: Option<usize>,
    transport: Option<String>,
    always: bool,
    heartbeat_ms: Option<u64>,
    interval_ms: Option<u64>,
) -> Result<PollConfig> {
    let mut cfg = match config {
        Some(path) => PollConfig::load(&path)?,
        None => PollConfig::default(),
    };
    if let Some(name) = model {
        cfg.model = parse_model(&name)?;
    }
    if index.is_some() {
        cfg.device_index = index;
    }
    if let Some(name) = transport {
        cfg.transport = TransportPreference::from_name(&name).ok_or_else(|| {
            anyhow::anyhow!("Unknown transport '{}'. Valid: auto, hid, event", name)
        })?;
    }
    if always {
        cfg.report_policy = ReportPolicy::Always;
    }
    if let Some(interval_ms) = heartbeat_ms {
        cfg.report_policy = ReportPolicy::Heartbeat { interval_ms };
    }
    if let Some(ms) = interval_ms {
        cfg.poll_interval_ms = ms;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn run_poll(cfg: &PollConfig, cycles: Option<u64>) -> Result<()> {
    let mut device = InputDevice::open(cfg)
        .with_context(|| format!("attach {}", cfg.model.name()))?;
    tracing::info!(
        model = device.model().name(),
        strategy = device.strategy_name(),
        "Polling"
    );

    let mut sink = JsonLinesSink::new();
    let interval = Duration::from_millis(cfg.poll_interval_ms);
    let mut done = 0u64;
    while cycles.map_or(true, |limit| done < limit) {
        if let Err(e) = device.mainloop(&mut sink) {
            if e.class().is_fatal() {
                return Err(e.into());
            }
            tracing::warn!(error = %e, class = ?e.class(), "Poll cycle failed");
        }
        sink.flush();
        done += 1;
        std::thread::sleep(interval);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ListDevices => {
            let devices = padpoll_core::device::discover_devices()?;
            if devices.is_empty() {
                println!("No supported controllers found.");
                println!("Ensure the controller is connected and you can access its HID node.");
            } else {
                for dev in &devices {
                    println!(
                        "{} (VID: 0x{:04X}, PID: 0x{:04X}, interface: {}, path: {})",
                        dev.model.name(),
                        dev.identity.vendor_id,
                        dev.identity.product_id,
                        dev.interface_number,
                        dev.path
                    );
                }
            }
        }
        Commands::Poll {
            config,
            model,
            index,
            transport,
            always,
            heartbeat_ms,
            interval_ms,
            cycles,
        } => {
            let cfg = build_config(
                config,
                model,
                index,
                transport,
                always,
                heartbeat_ms,
                interval_ms,
            )?;
            run_poll(&cfg, cycles)?;
        }
        Commands::Decode { model, hex } => {
            let model = parse_model(&model)?;
            let report = parse_hex(&hex)?;
            let mut state =
                DeviceState::new(model.channel_count(), model.button_count(), SystemTime::now());
            model.layout().decode(&report, &mut state)?;
            let out = serde_json::json!({
                "model": model.slug(),
                "channels": state.channels(),
                "buttons": state.buttons(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    Ok(())
}
