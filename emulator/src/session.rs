use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant as HostInstant};

use embassy_futures::block_on;
use embassy_time::Instant;
use gpadc_core::channels::ChannelSpec;
use gpadc_core::regs::{GPADC_CTRL1, GPADC_DATA};
use gpadc_core::variant::{ADC_CHANNEL_COUNT, ChannelSelect, MAX_SENSOR_COUNT};
use gpadc_core::{
    AttachResources, BusError, CalibrationStore, CellError, ClockControl, GpadcConfig,
    GpadcDevice, GpadcError, InterruptLine, IrqMode, PowerResources, RegisterBus, ResetControl,
    ResourceError, ThermalZones, VariantDescriptor, ZoneError,
};

use crate::grammar::{self, Command, FaultCommand};

/// Raw codes reported by the simulated voltage inputs.
const CHANNEL_LEVELS: [u32; ADC_CHANNEL_COUNT as usize] = [0x19a, 0x555, 0xaaa, 0xfff];

/// Die temperature the simulated sensors report at start-up.
const DEFAULT_MILLICELSIUS: i64 = 40_000;

/// Refresh period of the free-running thermal block.
const FREE_RUNNING_PERIOD: Duration = Duration::from_millis(250);

const HARDWARE_TICK: Duration = Duration::from_micros(200);
const AUTOSUSPEND_POLL: Duration = Duration::from_millis(10);

/// Eight bytes of provisioned calibration for revisions that read it.
const CALIBRATION_CELL: [u8; 8] = [0x2a, 0x07, 0x00, 0x00, 0x31, 0x07, 0x00, 0x00];

pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("temp", "temp [sensor]              - read a logical thermal sensor"),
    ("adc", "adc <channel>              - sample a voltage input (0-3)"),
    ("scale", "scale                      - show the voltage scale per code"),
    ("channels", "channels                   - list the exposed channels"),
    ("status", "status                     - show power, session, and interrupt state"),
    ("events", "events [count]             - show recent telemetry"),
    ("suspend", "suspend                    - force a runtime suspend"),
    ("resume", "resume                     - force a runtime resume"),
    ("irq", "irq on|off                 - unmute or mute the simulated interrupt"),
    ("poke", "poke <offset> <value>      - preset a hardware-owned register"),
    ("fault", "fault read|write <offset> | fault clear - inject bus faults"),
    ("help", "help [topic]               - show help for a command"),
];

pub type HostDevice = GpadcDevice<HostBus, HostIrq, HostClock, HostReset, HostZones>;

pub struct Session {
    device: Arc<HostDevice>,
    irq: HostIrq,
    zones: HostZones,
    hardware: Option<HardwareThread>,
    transcript: Option<TranscriptLogger>,
    started_at: HostInstant,
}

impl Session {
    pub fn new(
        variant: &'static VariantDescriptor,
        transcript: Option<&Path>,
    ) -> io::Result<Self> {
        let transcript = transcript
            .map(|path| TranscriptLogger::new(path, variant))
            .transpose()?;

        let irq = HostIrq::default();
        let zones = HostZones::default();
        let resources = AttachResources {
            bus: HostBus::new(variant),
            irq: Some(irq.clone()),
            power: PowerResources::new(
                HostClock::default(),
                HostClock::default(),
                HostReset::default(),
            ),
            zones: zones.clone(),
        };
        let mut store = HostCalibration;
        let device = GpadcDevice::attach(variant, GpadcConfig::new(), resources, &mut store)
            .map_err(|err| io::Error::other(format!("attach failed: {err}")))?;

        let device = Arc::new(device);
        let hardware = HardwareThread::spawn(Arc::clone(&device), irq.clone());

        Ok(Self {
            device,
            irq,
            zones,
            hardware: Some(hardware),
            transcript,
            started_at: HostInstant::now(),
        })
    }

    #[must_use]
    pub fn banner(&self) -> String {
        let variant = self.device.variant();
        format!(
            "GPADC emulator ({}, {}) ready. Type `help` for commands or `exit` to quit.",
            variant.name, variant.compatible
        )
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.started_at.elapsed();
        self.record(elapsed, TranscriptRole::Host, &[trimmed.to_string()])?;

        let lines = match grammar::parse(trimmed) {
            Ok(command) => self.execute(command),
            Err(err) => vec![format!("ERR syntax {err}")],
        };

        self.record(elapsed, TranscriptRole::Emulator, &lines)?;
        Ok(lines)
    }

    fn execute(&mut self, command: Command<'_>) -> Vec<String> {
        match command {
            Command::Temp { sensor } => self.handle_temp(sensor),
            Command::Adc { channel } => self.handle_adc(channel),
            Command::Scale => self.handle_scale(),
            Command::Channels => self.handle_channels(),
            Command::Status => self.handle_status(),
            Command::Events { count } => self.handle_events(count),
            Command::Suspend => match block_on(self.device.runtime_suspend()) {
                Ok(()) => vec![format!("OK power={}", self.device.power_state())],
                Err(err) => vec![describe_error(err)],
            },
            Command::Resume => match block_on(self.device.runtime_resume()) {
                Ok(()) => vec![format!("OK power={}", self.device.power_state())],
                Err(err) => vec![describe_error(err)],
            },
            Command::Irq { enabled } => {
                self.irq.0.muted.store(!enabled, Ordering::SeqCst);
                vec![format!(
                    "OK irq {}",
                    if enabled { "unmuted" } else { "muted" }
                )]
            }
            Command::Poke { offset, value } => {
                self.device.bus().set(offset, value);
                vec![format!("OK poke {offset:#06x}={value:#x}")]
            }
            Command::Fault(fault) => self.handle_fault(fault),
            Command::Help { topic } => handle_help(topic),
        }
    }

    fn handle_temp(&self, sensor: u8) -> Vec<String> {
        let device = &self.device;
        match block_on(device.read_temperature_raw(sensor)) {
            Ok(raw) => vec![format!(
                "OK temp sensor={sensor} raw={raw} millicelsius={}",
                device.variant().temperature_millicelsius(raw)
            )],
            Err(err) => vec![describe_error(err)],
        }
    }

    fn handle_adc(&self, channel: u8) -> Vec<String> {
        match block_on(self.device.read_raw_voltage(channel)) {
            Ok(raw) => vec![format!(
                "OK adc chan={channel} raw={raw} mv={}",
                gpadc_core::channels::millivolts(raw)
            )],
            Err(err) => vec![describe_error(err)],
        }
    }

    fn handle_scale(&self) -> Vec<String> {
        if self.device.channels().is_empty() {
            return vec![describe_error(GpadcError::Unsupported)];
        }
        vec![format!("OK scale {} mV/code", self.device.voltage_scale())]
    }

    fn handle_channels(&self) -> Vec<String> {
        let channels = self.device.channels();
        if channels.is_empty() {
            return vec![format!(
                "OK channels none ({} exposes thermal sensors only)",
                self.device.variant().name
            )];
        }
        let mut lines = vec![format!("OK channels count={}", channels.len())];
        lines.extend(channels.iter().map(describe_channel));
        lines
    }

    fn handle_status(&self) -> Vec<String> {
        let device = &self.device;
        let counters = device.power_counters();
        let stats = block_on(device.session_stats());
        let [low, high] = device.calibration().words();
        let notifications: Vec<String> = (0..device.sensors().len())
            .map(|sensor| self.zones.notifications(sensor).to_string())
            .collect();

        vec![
            format!(
                "OK status variant={} power={} holds={} resumes={} suspends={}",
                device.variant().name,
                device.power_state(),
                device.resume_holds(),
                counters.resumes,
                counters.suspends,
            ),
            format!(
                "sessions completed={} timed-out={} failed={} channel-switches={} mode-switches={}",
                stats.completed,
                stats.timed_out,
                stats.failed,
                stats.channel_switches,
                stats.mode_switches,
            ),
            format!(
                "irq mode={} line={} fresh-samples={} zone-notifications=[{}]",
                irq_mode_label(device.irq_mode()),
                self.irq.describe(),
                device.fresh_samples(),
                notifications.join(","),
            ),
            format!(
                "last raw-voltage={} raw-temperature={} calibration={low:#010x},{high:#010x}",
                device.last_raw_voltage(),
                device.last_raw_temperature(),
            ),
        ]
    }

    fn handle_events(&self, count: Option<usize>) -> Vec<String> {
        self.device.telemetry().with(|recorder| {
            let skip = count.map_or(0, |count| recorder.len().saturating_sub(count));
            let mut lines = vec![format!("OK events count={}", recorder.len() - skip)];
            lines.extend(recorder.oldest_first().skip(skip).map(|record| {
                format!(
                    "  #{} +{}ms {}",
                    record.id,
                    record.timestamp.as_millis(),
                    record.event
                )
            }));
            lines
        })
    }

    fn handle_fault(&self, fault: FaultCommand) -> Vec<String> {
        let bus = self.device.bus();
        match fault {
            FaultCommand::Read(offset) => {
                bus.fail_reads_at(Some(offset));
                vec![format!("OK fault read {offset:#06x}")]
            }
            FaultCommand::Write(offset) => {
                bus.fail_writes_at(Some(offset));
                vec![format!("OK fault write {offset:#06x}")]
            }
            FaultCommand::Clear => {
                bus.fail_reads_at(None);
                bus.fail_writes_at(None);
                vec!["OK fault cleared".to_string()]
            }
        }
    }

    fn record(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        lines: &[String],
    ) -> io::Result<()> {
        if let Some(transcript) = self.transcript.as_mut() {
            for line in lines {
                transcript.append_line(elapsed, &role, line)?;
            }
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(hardware) = self.hardware.take() {
            hardware.stop();
        }
    }
}

fn handle_help(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) => {
            if let Some((_, detail)) = HELP_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(target))
            {
                lines.push((*detail).to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_error(err: GpadcError) -> String {
    let tag = match err {
        GpadcError::Io(_) => "io",
        GpadcError::Timeout => "timeout",
        GpadcError::InvalidChannel(_) => "invalid-channel",
        GpadcError::InvalidSensor(_) => "invalid-sensor",
        GpadcError::Unsupported => "unsupported",
        GpadcError::Busy => "busy",
        GpadcError::Configuration(_) => "configuration",
        GpadcError::Resource(_) => "resource",
        GpadcError::Deferred => "deferred",
    };
    format!("ERR {tag} {err}")
}

fn describe_channel(spec: &ChannelSpec) -> String {
    let info: Vec<String> = spec.info.iter().map(ToString::to_string).collect();
    format!(
        "  {} {:?}({}) info={}",
        spec.datasheet_name,
        spec.kind,
        spec.channel,
        info.join(",")
    )
}

fn irq_mode_label(mode: IrqMode) -> &'static str {
    match mode {
        IrqMode::Polled => "polled",
        IrqMode::OnDemand => "on-demand",
        IrqMode::FreeRunning => "free-running",
    }
}

/// Raw temperature code that converts to `millicelsius` on `variant`.
fn raw_for(variant: &VariantDescriptor, millicelsius: i64) -> u32 {
    let raw = millicelsius / i64::from(variant.temp_scale) - i64::from(variant.temp_offset);
    u32::try_from(raw).unwrap_or(0)
}

/// Plays the hardware side: raises completions while the line is enabled
/// and drives the autosuspend countdown.
struct HardwareThread {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl HardwareThread {
    fn spawn(device: Arc<HostDevice>, irq: HostIrq) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            let mut last_sample = HostInstant::now();
            let mut last_poll = HostInstant::now();
            while !flag.load(Ordering::SeqCst) {
                if irq.fires() {
                    match device.irq_mode() {
                        IrqMode::FreeRunning if last_sample.elapsed() >= FREE_RUNNING_PERIOD => {
                            device.handle_irq();
                            last_sample = HostInstant::now();
                        }
                        IrqMode::OnDemand => {
                            device.handle_irq();
                        }
                        IrqMode::FreeRunning | IrqMode::Polled => {}
                    }
                }
                if last_poll.elapsed() >= AUTOSUSPEND_POLL {
                    if let Some(warning) = autosuspend_tick(&device, Instant::now()) {
                        eprintln!("{warning}");
                    }
                    last_poll = HostInstant::now();
                }
                thread::sleep(HARDWARE_TICK);
            }
        });
        Self { stop, handle }
    }

    fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = self.handle.join();
    }
}

/// One autosuspend check; a failure leaves the block resumed for the next tick.
fn autosuspend_tick(device: &HostDevice, now: Instant) -> Option<String> {
    block_on(device.poll_autosuspend(now))
        .err()
        .map(|err| format!("warn: autosuspend failed, staying resumed: {err}"))
}

#[derive(Default)]
struct HostRegisters {
    regs: BTreeMap<u32, u32>,
    fail_read: Option<u32>,
    fail_write: Option<u32>,
}

/// Register file of the simulated block.
pub struct HostBus {
    variant: &'static VariantDescriptor,
    state: Mutex<HostRegisters>,
}

impl HostBus {
    fn new(variant: &'static VariantDescriptor) -> Self {
        let mut regs = BTreeMap::new();
        let raw = raw_for(variant, DEFAULT_MILLICELSIUS);
        for sensor in 0..variant.sensor_count {
            regs.insert(variant.temp_data_register(sensor), raw);
        }
        Self {
            variant,
            state: Mutex::new(HostRegisters {
                regs,
                ..HostRegisters::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HostRegisters> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, offset: u32, value: u32) {
        self.lock().regs.insert(offset, value);
    }

    pub fn fail_reads_at(&self, offset: Option<u32>) {
        self.lock().fail_read = offset;
    }

    pub fn fail_writes_at(&self, offset: Option<u32>) {
        self.lock().fail_write = offset;
    }

    fn voltage_sample(&self, ctrl1: u32) -> u32 {
        let selected = ctrl1 & self.variant.channel_mask;
        let channel = match self.variant.channel_select {
            ChannelSelect::Binary => selected,
            ChannelSelect::OneHot => selected.trailing_zeros(),
            ChannelSelect::Unavailable => 0,
        };
        usize::try_from(channel)
            .ok()
            .and_then(|channel| CHANNEL_LEVELS.get(channel))
            .copied()
            .unwrap_or(0)
    }
}

impl RegisterBus for HostBus {
    fn read(&self, offset: u32) -> Result<u32, BusError> {
        let state = self.lock();
        if state.fail_read == Some(offset) {
            return Err(BusError { offset });
        }
        if self.variant.has_dedicated_voltage_channel
            && offset == self.variant.ctrl_register(GPADC_DATA)
        {
            let ctrl1 = state
                .regs
                .get(&self.variant.ctrl_register(GPADC_CTRL1))
                .copied()
                .unwrap_or(0);
            return Ok(self.voltage_sample(ctrl1));
        }
        Ok(state.regs.get(&offset).copied().unwrap_or(0))
    }

    fn write(&self, offset: u32, value: u32) -> Result<(), BusError> {
        let mut state = self.lock();
        if state.fail_write == Some(offset) {
            return Err(BusError { offset });
        }
        state.regs.insert(offset, value);
        Ok(())
    }
}

#[derive(Default)]
pub struct IrqState {
    requested: AtomicBool,
    disable_depth: AtomicI32,
    muted: AtomicBool,
}

#[derive(Clone, Default)]
pub struct HostIrq(Arc<IrqState>);

impl HostIrq {
    fn fires(&self) -> bool {
        let state = &self.0;
        state.requested.load(Ordering::SeqCst)
            && state.disable_depth.load(Ordering::SeqCst) <= 0
            && !state.muted.load(Ordering::SeqCst)
    }

    fn describe(&self) -> &'static str {
        let state = &self.0;
        if !state.requested.load(Ordering::SeqCst) {
            "unclaimed"
        } else if state.muted.load(Ordering::SeqCst) {
            "muted"
        } else if state.disable_depth.load(Ordering::SeqCst) > 0 {
            "disabled"
        } else {
            "enabled"
        }
    }
}

impl InterruptLine for HostIrq {
    fn request(&mut self) -> Result<(), ResourceError> {
        self.0.requested.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn free(&mut self) {
        self.0.requested.store(false, Ordering::SeqCst);
    }

    fn enable(&self) {
        self.0.disable_depth.fetch_sub(1, Ordering::SeqCst);
    }

    fn disable(&self) {
        self.0.disable_depth.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct HostClock {
    enabled: bool,
    rate: u32,
}

impl ClockControl for HostClock {
    fn enable(&mut self) -> Result<(), ResourceError> {
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn set_rate(&mut self, hz: u32) -> Result<(), ResourceError> {
        self.rate = hz;
        Ok(())
    }
}

#[derive(Default)]
pub struct HostReset {
    asserted: bool,
}

impl ResetControl for HostReset {
    fn assert(&mut self) -> Result<(), ResourceError> {
        self.asserted = true;
        Ok(())
    }

    fn deassert(&mut self) -> Result<(), ResourceError> {
        self.asserted = false;
        Ok(())
    }
}

/// Thermal framework stand-in that counts fresh-sample notifications.
#[derive(Clone, Default)]
pub struct HostZones(Arc<[AtomicU32; MAX_SENSOR_COUNT]>);

impl HostZones {
    fn notifications(&self, sensor: usize) -> u32 {
        self.0
            .get(sensor)
            .map_or(0, |count| count.load(Ordering::Relaxed))
    }
}

impl ThermalZones for HostZones {
    type Handle = u8;

    fn register(&mut self, sensor: u8) -> Result<u8, ZoneError> {
        Ok(sensor)
    }

    fn unregister(&mut self, _handle: u8) {}

    fn notify_sample(&self, handle: &u8) {
        if let Some(count) = self.0.get(usize::from(*handle)) {
            count.fetch_add(1, Ordering::Relaxed);
        }
    }
}

struct HostCalibration;

impl CalibrationStore for HostCalibration {
    fn read_cell(&mut self, _name: &str, buf: &mut [u8]) -> Result<usize, CellError> {
        let copied = CALIBRATION_CELL.len().min(buf.len());
        buf[..copied].copy_from_slice(&CALIBRATION_CELL[..copied]);
        Ok(CALIBRATION_CELL.len())
    }
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path, variant: &VariantDescriptor) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        writeln!(logger.writer, "# GPADC emulator transcript for {}", variant.name)?;
        writeln!(
            logger.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(logger.writer)?;
        logger.writer.flush()?;
        Ok(logger)
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: &TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

#[cfg(test)]
mod tests {
    use gpadc_core::variant::{SUN4I_A10, SUN6I_A31, SUN8I_A33, SUN8I_H3};

    use super::*;

    fn first(session: &mut Session, line: &str) -> String {
        let lines = session.handle_command(line).expect("command");
        lines.into_iter().next().expect("response line")
    }

    #[test]
    fn default_temperature_is_near_forty_degrees() {
        for variant in [&SUN4I_A10, &SUN6I_A31, &SUN8I_A33, &SUN8I_H3] {
            let raw = raw_for(variant, DEFAULT_MILLICELSIUS);
            let millicelsius = variant.temperature_millicelsius(raw);
            assert!(
                (39_000..=41_000).contains(&millicelsius),
                "{} reports {millicelsius}",
                variant.name
            );
        }
    }

    #[test]
    fn voltage_read_reports_channel_level() {
        let mut session = Session::new(&SUN4I_A10, None).expect("session");
        assert_eq!(first(&mut session, "adc 1"), "OK adc chan=1 raw=1365 mv=999");
    }

    #[test]
    fn muted_interrupt_times_out_then_recovers() {
        let mut session = Session::new(&SUN6I_A31, None).expect("session");
        first(&mut session, "irq off");
        assert!(first(&mut session, "adc 0").starts_with("ERR timeout"));
        first(&mut session, "irq on");
        assert!(first(&mut session, "adc 0").starts_with("OK adc chan=0"));
    }

    #[test]
    fn thermal_only_revision_rejects_voltage_commands() {
        let mut session = Session::new(&SUN8I_H3, None).expect("session");
        assert!(first(&mut session, "adc 0").starts_with("ERR unsupported"));
        assert!(first(&mut session, "scale").starts_with("ERR unsupported"));
        assert!(first(&mut session, "temp").starts_with("OK temp sensor=0"));
    }

    #[test]
    fn bus_fault_surfaces_as_io_error() {
        let mut session = Session::new(&SUN8I_A33, None).expect("session");
        let offset = SUN8I_A33.temp_data_register(0);
        first(&mut session, &format!("fault read {offset:#x}"));
        assert!(first(&mut session, "temp").starts_with("ERR io"));
        first(&mut session, "fault clear");
        assert!(first(&mut session, "temp").starts_with("OK temp"));
    }

    #[test]
    fn failed_autosuspend_produces_a_warning() {
        let mut session = Session::new(&SUN8I_A33, None).expect("session");
        assert!(first(&mut session, "temp").starts_with("OK temp"));
        let ctrl1 = SUN8I_A33.ctrl_register(GPADC_CTRL1);
        first(&mut session, &format!("fault write {ctrl1:#x}"));

        let idle = Instant::now() + embassy_time::Duration::from_secs(5);
        let warning = autosuspend_tick(&session.device, idle).expect("suspend should fail");
        assert!(warning.contains("autosuspend failed"), "{warning}");

        first(&mut session, "fault clear");
        assert_eq!(autosuspend_tick(&session.device, idle), None);
    }

    #[test]
    fn syntax_errors_are_reported() {
        let mut session = Session::new(&SUN4I_A10, None).expect("session");
        assert!(first(&mut session, "adc nine").starts_with("ERR syntax"));
    }
}
