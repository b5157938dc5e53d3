//! Exclusive, interrupt-completed sampling sessions.
//!
//! One conversion pipeline serves both voltage and temperature reads. A
//! session takes the async lock, arms the kind it wants, programs the block,
//! enables the interrupt line, and waits (bounded) for the completion bridge
//! to hand back the sample through a single-slot signal. The armed kind and
//! the signal are only touched under the `armed` critical section, so a late
//! interrupt can never complete a session it was not raised for.

use core::cell::Cell;
use core::fmt;

use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer, with_timeout};
use portable_atomic::{AtomicU32, Ordering};

use crate::bus::RegisterBus;
use crate::config::GpadcConfig;
use crate::error::GpadcError;
use crate::platform::InterruptLine;
use crate::regs::{
    GPADC_CTRL1, GPADC_DATA, GPADC_INT_FIFOC, INT_FIFOC_TEMP_IRQ_EN, INT_FIFOC_TP_DATA_IRQ_EN,
    INT_FIFOC_TP_FIFO_FLUSH, int_fifoc_tp_fifo_trig_level,
};
use crate::telemetry::{GpadcEvent, SharedTelemetry};
use crate::variant::VariantDescriptor;

/// What a session samples.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadKind {
    Voltage(u8),
    /// Logical sensor index; the touchscreen block only has sensor 0.
    Temperature(u8),
}

impl ReadKind {
    #[must_use]
    pub const fn is_voltage(self) -> bool {
        matches!(self, ReadKind::Voltage(_))
    }

    /// Register the completion bridge reads for this kind.
    #[must_use]
    pub const fn data_register(self, variant: &VariantDescriptor) -> u32 {
        match self {
            ReadKind::Voltage(_) => variant.ctrl_register(GPADC_DATA),
            ReadKind::Temperature(sensor) => variant.temp_data_register(sensor),
        }
    }

    /// INT_FIFOC value that routes this kind's completion to the interrupt line.
    #[must_use]
    pub const fn irq_source(self) -> u32 {
        match self {
            ReadKind::Voltage(_) => INT_FIFOC_TP_DATA_IRQ_EN | int_fifoc_tp_fifo_trig_level(1),
            ReadKind::Temperature(_) => INT_FIFOC_TEMP_IRQ_EN,
        }
    }
}

impl fmt::Display for ReadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadKind::Voltage(channel) => write!(f, "voltage({channel})"),
            ReadKind::Temperature(sensor) => write!(f, "temperature({sensor})"),
        }
    }
}

/// Outcome of one pass through the completion bridge.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Completion {
    /// Nothing was armed.
    Idle,
    Completed(ReadKind),
    /// The data register read failed; the session stays armed.
    ReadFailed(ReadKind),
}

/// Counters maintained under the session lock.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SessionStats {
    pub completed: u32,
    pub timed_out: u32,
    pub failed: u32,
    pub channel_switches: u32,
    pub mode_switches: u32,
}

/// Value handed from the completion bridge to the waiting session.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Sample {
    kind: ReadKind,
    value: u32,
}

/// Borrowed collaborators a session needs.
pub struct SessionContext<'a, B, L> {
    pub variant: &'static VariantDescriptor,
    pub config: &'a GpadcConfig,
    pub bus: &'a B,
    pub line: &'a L,
    pub telemetry: &'a SharedTelemetry,
}

pub struct Sampler {
    session: Mutex<CriticalSectionRawMutex, SessionStats>,
    armed: BlockingMutex<CriticalSectionRawMutex, Cell<Option<ReadKind>>>,
    completion: Signal<CriticalSectionRawMutex, Sample>,
    last_voltage: AtomicU32,
    last_temperature: AtomicU32,
}

impl Sampler {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            session: Mutex::new(SessionStats {
                completed: 0,
                timed_out: 0,
                failed: 0,
                channel_switches: 0,
                mode_switches: 0,
            }),
            armed: BlockingMutex::new(Cell::new(None)),
            completion: Signal::new(),
            last_voltage: AtomicU32::new(0),
            last_temperature: AtomicU32::new(0),
        }
    }

    /// Runs one complete session for `kind` and returns the raw sample.
    ///
    /// The caller must already hold a resume reference. The interrupt line is
    /// disabled and the lock released on every exit path.
    ///
    /// # Errors
    ///
    /// [`GpadcError::Io`] when programming the block fails and
    /// [`GpadcError::Timeout`] when no completion arrives in time.
    pub async fn read<B, L>(
        &self,
        ctx: &SessionContext<'_, B, L>,
        kind: ReadKind,
    ) -> Result<u32, GpadcError>
    where
        B: RegisterBus,
        L: InterruptLine,
    {
        let mut stats = self.session.lock().await;
        let mut session = ArmedSession::arm(self, ctx.line, kind);
        ctx.telemetry.record(GpadcEvent::SessionArmed(kind));

        let result = self.run(ctx, &mut session, &mut stats, kind).await;
        match result {
            Ok(_) => {
                stats.completed = stats.completed.wrapping_add(1);
                ctx.telemetry.record(GpadcEvent::SessionCompleted(kind));
            }
            Err(GpadcError::Timeout) => {
                stats.timed_out = stats.timed_out.wrapping_add(1);
                warn!("sample wait timed out");
                ctx.telemetry.record(GpadcEvent::SessionTimedOut(kind));
            }
            Err(_) => {
                stats.failed = stats.failed.wrapping_add(1);
                ctx.telemetry.record(GpadcEvent::SessionFailed(kind));
            }
        }
        drop(session);
        result
    }

    async fn run<B, L>(
        &self,
        ctx: &SessionContext<'_, B, L>,
        session: &mut ArmedSession<'_, L>,
        stats: &mut SessionStats,
        kind: ReadKind,
    ) -> Result<u32, GpadcError>
    where
        B: RegisterBus,
        L: InterruptLine,
    {
        let settle = prepare(ctx, stats, kind)?;
        if settle > Duration::from_ticks(0) {
            Timer::after(settle).await;
        }

        session.enable_line();

        let wait = async {
            loop {
                let sample = self.completion.wait().await;
                if sample.kind == kind {
                    break sample.value;
                }
            }
        };
        with_timeout(ctx.config.read_timeout(), wait)
            .await
            .map_err(|_| GpadcError::Timeout)
    }

    /// Completion bridge for on-demand variants.
    ///
    /// Reads the data register for the armed kind and releases the waiter.
    /// A failed read leaves the session armed and the waiter times out.
    pub fn complete<B: RegisterBus>(&self, variant: &VariantDescriptor, bus: &B) -> Completion {
        self.armed.lock(|armed| {
            let Some(kind) = armed.get() else {
                return Completion::Idle;
            };
            let Ok(value) = bus.read(kind.data_register(variant)) else {
                error!("completion read failed");
                return Completion::ReadFailed(kind);
            };
            if kind.is_voltage() {
                self.last_voltage.store(value, Ordering::Relaxed);
            } else {
                self.last_temperature.store(value, Ordering::Relaxed);
            }
            armed.set(None);
            self.completion.signal(Sample { kind, value });
            Completion::Completed(kind)
        })
    }

    /// Kind currently armed, if a session is waiting.
    #[must_use]
    pub fn armed_kind(&self) -> Option<ReadKind> {
        self.armed.lock(Cell::get)
    }

    #[must_use]
    pub fn last_voltage(&self) -> u32 {
        self.last_voltage.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn last_temperature(&self) -> u32 {
        self.last_temperature.load(Ordering::Relaxed)
    }

    pub(crate) fn note_temperature(&self, raw: u32) {
        self.last_temperature.store(raw, Ordering::Relaxed);
    }

    /// Snapshot of the session counters; waits for any in-flight session.
    pub async fn stats(&self) -> SessionStats {
        *self.session.lock().await
    }

    fn arm(&self, kind: ReadKind) {
        self.armed.lock(|armed| {
            self.completion.reset();
            armed.set(Some(kind));
        });
    }

    fn disarm(&self) {
        self.armed.lock(|armed| armed.set(None));
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Programs the block for `kind` and returns the settle time owed before the
/// first valid sample.
fn prepare<B, L>(
    ctx: &SessionContext<'_, B, L>,
    stats: &mut SessionStats,
    kind: ReadKind,
) -> Result<Duration, GpadcError>
where
    B: RegisterBus,
{
    let variant = ctx.variant;
    let fifoc = variant.ctrl_register(GPADC_INT_FIFOC);
    let ctrl1 = variant.ctrl_register(GPADC_CTRL1);

    ctx.bus
        .write(fifoc, int_fifoc_tp_fifo_trig_level(1) | INT_FIFOC_TP_FIFO_FLUSH)?;
    let previous = ctx.bus.read(ctrl1)?;

    let mut settle = Duration::from_ticks(0);
    match kind {
        ReadKind::Voltage(channel) => {
            let select = variant.encode_channel(channel);
            ctx.bus
                .write(ctrl1, variant.tp_mode_en | variant.tp_adc_select | select)?;
            if previous & variant.channel_mask != select {
                stats.channel_switches = stats.channel_switches.wrapping_add(1);
                settle += ctx.config.channel_settle();
            }
        }
        // Temperature data is only valid while the block runs in touchscreen mode.
        ReadKind::Temperature(_) => ctx.bus.write(ctrl1, variant.tp_mode_en)?,
    }

    // Re-armed on every session, including back-to-back reads of the same kind.
    if variant.supports_interrupt {
        ctx.bus.write(fifoc, kind.irq_source())?;
    }

    let was_adc_mode = previous & variant.tp_adc_select != 0;
    if variant.tp_adc_select != 0 && was_adc_mode != kind.is_voltage() {
        stats.mode_switches = stats.mode_switches.wrapping_add(1);
        settle += ctx.config.mode_settle();
    }

    Ok(settle)
}

/// Armed-kind and interrupt-line guard for one session.
///
/// Dropping it disables the line (if this session enabled it) and disarms,
/// so timeouts and register failures release the hardware the same way a
/// successful completion does.
struct ArmedSession<'a, L: InterruptLine> {
    sampler: &'a Sampler,
    line: &'a L,
    line_enabled: bool,
}

impl<'a, L: InterruptLine> ArmedSession<'a, L> {
    fn arm(sampler: &'a Sampler, line: &'a L, kind: ReadKind) -> Self {
        sampler.arm(kind);
        Self {
            sampler,
            line,
            line_enabled: false,
        }
    }

    fn enable_line(&mut self) {
        if !self.line_enabled {
            self.line.enable();
            self.line_enabled = true;
        }
    }
}

impl<L: InterruptLine> Drop for ArmedSession<'_, L> {
    fn drop(&mut self) {
        if self.line_enabled {
            self.line.disable();
        }
        self.sampler.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::{SUN4I_A10, SUN6I_A31};

    #[test]
    fn data_registers_follow_kind() {
        assert_eq!(ReadKind::Voltage(1).data_register(&SUN4I_A10), GPADC_DATA);
        assert_eq!(ReadKind::Temperature(0).data_register(&SUN4I_A10), 0x20);
    }

    #[test]
    fn irq_sources_differ_per_kind() {
        assert_eq!(ReadKind::Voltage(0).irq_source(), 0x0001_0100);
        assert_eq!(ReadKind::Temperature(0).irq_source(), 0x0004_0000);
    }

    #[test]
    fn completion_without_armed_session_is_ignored() {
        struct Never;
        impl RegisterBus for Never {
            fn read(&self, offset: u32) -> Result<u32, crate::bus::BusError> {
                panic!("unexpected read at {offset:#x}");
            }
            fn write(&self, _offset: u32, _value: u32) -> Result<(), crate::bus::BusError> {
                Ok(())
            }
        }

        let sampler = Sampler::new();
        assert_eq!(sampler.complete(&SUN6I_A31, &Never), Completion::Idle);
        assert_eq!(sampler.armed_kind(), None);
    }
}
