#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration as StdDuration;

use embassy_time::Duration;
use gpadc_core::regs::{GPADC_CTRL1, GPADC_DATA};
use gpadc_core::variant::ChannelSelect;
use gpadc_core::{
    AttachResources, BusError, CalibrationStore, CellError, ClockControl, GpadcConfig,
    GpadcDevice, InterruptLine, PowerResources, ResetControl, ResourceError, ThermalZones,
    VariantDescriptor, ZoneError,
};

/// Value the simulated converter reports for voltage channel `n` is `VOLTAGE_BASE + n`.
pub const VOLTAGE_BASE: u32 = 1_000;

#[derive(Default)]
struct BusState {
    regs: BTreeMap<u32, u32>,
    writes: Vec<(u32, u32)>,
    fail_read: Option<u32>,
    fail_write: Option<u32>,
}

/// Register file that models the data registers of the sampling pipeline.
pub struct SimBus {
    variant: &'static VariantDescriptor,
    state: Mutex<BusState>,
}

impl SimBus {
    pub fn new(variant: &'static VariantDescriptor) -> Self {
        Self {
            variant,
            state: Mutex::new(BusState::default()),
        }
    }

    /// Presets a register the device only reads (temperature data).
    pub fn set(&self, offset: u32, value: u32) {
        self.state.lock().unwrap().regs.insert(offset, value);
    }

    pub fn get(&self, offset: u32) -> u32 {
        self.state.lock().unwrap().regs.get(&offset).copied().unwrap_or(0)
    }

    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().unwrap().writes.clear();
    }

    /// Control-register image, excluding the data registers the hardware owns.
    pub fn snapshot(&self, data_registers: &[u32]) -> BTreeMap<u32, u32> {
        let state = self.state.lock().unwrap();
        state
            .regs
            .iter()
            .filter(|(offset, _)| !data_registers.contains(offset))
            .map(|(offset, value)| (*offset, *value))
            .collect()
    }

    pub fn fail_reads_at(&self, offset: Option<u32>) {
        self.state.lock().unwrap().fail_read = offset;
    }

    pub fn fail_writes_at(&self, offset: Option<u32>) {
        self.state.lock().unwrap().fail_write = offset;
    }

    fn selected_channel(&self, ctrl1: u32) -> u32 {
        match self.variant.channel_select {
            ChannelSelect::Binary => ctrl1 & self.variant.channel_mask,
            ChannelSelect::OneHot => (ctrl1 & self.variant.channel_mask).trailing_zeros(),
            ChannelSelect::Unavailable => 0,
        }
    }
}

impl gpadc_core::RegisterBus for SimBus {
    fn read(&self, offset: u32) -> Result<u32, BusError> {
        let state = self.state.lock().unwrap();
        if state.fail_read == Some(offset) {
            return Err(BusError { offset });
        }
        if offset == GPADC_DATA && self.variant.has_dedicated_voltage_channel {
            let ctrl1 = state.regs.get(&GPADC_CTRL1).copied().unwrap_or(0);
            return Ok(VOLTAGE_BASE + self.selected_channel(ctrl1));
        }
        Ok(state.regs.get(&offset).copied().unwrap_or(0))
    }

    fn write(&self, offset: u32, value: u32) -> Result<(), BusError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_write == Some(offset) {
            return Err(BusError { offset });
        }
        state.writes.push((offset, value));
        state.regs.insert(offset, value);
        Ok(())
    }
}

#[derive(Default)]
pub struct IrqState {
    requested: AtomicBool,
    disable_depth: AtomicI32,
    enables: AtomicU32,
    disables: AtomicU32,
    muted: AtomicBool,
    fail_request: AtomicBool,
}

impl IrqState {
    pub fn is_enabled(&self) -> bool {
        self.requested.load(Ordering::SeqCst) && self.disable_depth.load(Ordering::SeqCst) == 0
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn disable_depth(&self) -> i32 {
        self.disable_depth.load(Ordering::SeqCst)
    }

    pub fn enables(&self) -> u32 {
        self.enables.load(Ordering::SeqCst)
    }

    pub fn disables(&self) -> u32 {
        self.disables.load(Ordering::SeqCst)
    }

    /// While muted the pump never fires, so armed sessions time out.
    pub fn mute(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub struct SimIrq(pub Arc<IrqState>);

impl InterruptLine for SimIrq {
    fn request(&mut self) -> Result<(), ResourceError> {
        if self.0.fail_request.load(Ordering::SeqCst) {
            return Err(ResourceError::Rejected);
        }
        self.0.requested.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn free(&mut self) {
        self.0.requested.store(false, Ordering::SeqCst);
    }

    fn enable(&self) {
        self.0.enables.fetch_add(1, Ordering::SeqCst);
        self.0.disable_depth.fetch_sub(1, Ordering::SeqCst);
    }

    fn disable(&self) {
        self.0.disables.fetch_add(1, Ordering::SeqCst);
        self.0.disable_depth.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct ClockState {
    pub enabled: AtomicBool,
    pub rate: AtomicU32,
    pub enables: AtomicU32,
    pub fail_enable: AtomicBool,
}

#[derive(Clone, Default)]
pub struct SimClock(pub Arc<ClockState>);

impl ClockControl for SimClock {
    fn enable(&mut self) -> Result<(), ResourceError> {
        if self.0.fail_enable.load(Ordering::SeqCst) {
            return Err(ResourceError::Rejected);
        }
        self.0.enabled.store(true, Ordering::SeqCst);
        self.0.enables.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn disable(&mut self) {
        self.0.enabled.store(false, Ordering::SeqCst);
    }

    fn set_rate(&mut self, hz: u32) -> Result<(), ResourceError> {
        self.0.rate.store(hz, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct ResetState {
    pub asserted: AtomicBool,
    pub deasserts: AtomicU32,
}

#[derive(Clone, Default)]
pub struct SimReset(pub Arc<ResetState>);

impl ResetControl for SimReset {
    fn assert(&mut self) -> Result<(), ResourceError> {
        self.0.asserted.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn deassert(&mut self) -> Result<(), ResourceError> {
        self.0.asserted.store(false, Ordering::SeqCst);
        self.0.deasserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct ZoneState {
    pub registered: Mutex<Vec<u8>>,
    pub unregistered: Mutex<Vec<u8>>,
    pub notifications: AtomicU32,
    pub outcome: Mutex<Option<ZoneError>>,
}

#[derive(Clone, Default)]
pub struct SimZones(pub Arc<ZoneState>);

impl ThermalZones for SimZones {
    type Handle = u8;

    fn register(&mut self, sensor: u8) -> Result<u8, ZoneError> {
        if let Some(err) = *self.0.outcome.lock().unwrap() {
            return Err(err);
        }
        self.0.registered.lock().unwrap().push(sensor);
        Ok(sensor)
    }

    fn unregister(&mut self, handle: u8) {
        self.0.unregistered.lock().unwrap().push(handle);
    }

    fn notify_sample(&self, _handle: &u8) {
        self.0.notifications.fetch_add(1, Ordering::SeqCst);
    }
}

/// Calibration cell with a fixed payload.
pub struct SimStore(pub Result<Vec<u8>, CellError>);

impl CalibrationStore for SimStore {
    fn read_cell(&mut self, _name: &str, buf: &mut [u8]) -> Result<usize, CellError> {
        let data = self.0.as_ref().map_err(|err| *err)?;
        let copied = data.len().min(buf.len());
        buf[..copied].copy_from_slice(&data[..copied]);
        Ok(data.len())
    }
}

pub type SimDevice = GpadcDevice<SimBus, SimIrq, SimClock, SimReset, SimZones>;

/// Handles the test keeps after the device takes ownership of the resources.
#[derive(Clone, Default)]
pub struct Handles {
    pub irq: SimIrq,
    pub bus_clock: SimClock,
    pub module_clock: SimClock,
    pub reset: SimReset,
    pub zones: SimZones,
}

impl Handles {
    pub fn resources(
        &self,
        variant: &'static VariantDescriptor,
    ) -> AttachResources<SimBus, SimIrq, SimClock, SimReset, SimZones> {
        AttachResources {
            bus: SimBus::new(variant),
            irq: Some(self.irq.clone()),
            power: PowerResources::new(
                self.bus_clock.clone(),
                self.module_clock.clone(),
                self.reset.clone(),
            ),
            zones: self.zones.clone(),
        }
    }
}

/// Short timeouts and no settle delays so the suite runs quickly.
pub fn fast_config() -> GpadcConfig {
    GpadcConfig::new()
        .with_read_timeout(Duration::from_millis(200))
        .with_autosuspend_delay(Duration::from_millis(20))
        .with_settle(Duration::from_ticks(0), Duration::from_ticks(0))
}

pub fn attach(variant: &'static VariantDescriptor, config: GpadcConfig) -> (SimDevice, Handles) {
    let handles = Handles::default();
    let mut store = SimStore(Ok(vec![0; 8]));
    let device = GpadcDevice::attach(variant, config, handles.resources(variant), &mut store)
        .expect("attach should succeed");
    (device, handles)
}

/// Runs `f` while a background thread plays the hardware: whenever the
/// interrupt line is enabled (and not muted) it invokes the device handler.
pub fn with_irq_pump<T>(device: &SimDevice, irq: &SimIrq, f: impl FnOnce() -> T) -> T {
    let stop = AtomicBool::new(false);
    thread::scope(|scope| {
        scope.spawn(|| {
            while !stop.load(Ordering::SeqCst) {
                if irq.0.is_enabled() && !irq.0.is_muted() {
                    device.handle_irq();
                }
                thread::sleep(StdDuration::from_micros(200));
            }
        });
        let _stop = StopOnDrop(&stop);
        f()
    })
}

struct StopOnDrop<'a>(&'a AtomicBool);

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}
