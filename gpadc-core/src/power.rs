//! Power sequencing: attach-time clock/reset bring-up and the per-revision
//! runtime suspend/resume register programs.

use core::fmt;

use crate::bus::{BusError, RegisterBus};
use crate::error::{ConfigurationError, GpadcError};
use crate::platform::{ClockControl, ResetControl};
use crate::regs::{
    CTRL3_FILTER_EN, GPADC_CTRL0, GPADC_CTRL1, GPADC_CTRL3, GPADC_INT_FIFOC, GPADC_TPR,
    THS_CTRL0, THS_CTRL2, THS_FILTER, THS_INTC, THS_STAT, TPR_TEMP_ENABLE,
    ctrl0_adc_clk_divider, ctrl0_fs_div, ctrl0_t_acq, ctrl3_filter_type, ths_acq1,
    ths_intc_tdata_irq_en, ths_temp_period, ths_temp_sense_en, tpr_temp_period,
};
use crate::variant::{PowerProgram, VariantDescriptor};

/// Runtime power state of the block.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    Suspended,
    Resumed,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Suspended => f.write_str("suspended"),
            PowerState::Resumed => f.write_str("resumed"),
        }
    }
}

/// Clock and reset handles supplied by the platform at attach.
///
/// Entries the variant does not declare are ignored; entries it does declare
/// must be present.
#[derive(Debug)]
pub struct PowerResources<C, R> {
    pub bus_clock: Option<C>,
    pub module_clock: Option<C>,
    pub reset: Option<R>,
}

impl<C, R> PowerResources<C, R> {
    /// No clocks or reset; suitable for the touchscreen-block revisions.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            bus_clock: None,
            module_clock: None,
            reset: None,
        }
    }

    #[must_use]
    pub const fn new(bus_clock: C, module_clock: C, reset: R) -> Self {
        Self {
            bus_clock: Some(bus_clock),
            module_clock: Some(module_clock),
            reset: Some(reset),
        }
    }
}

/// Programs applied on runtime resume, per revision family.
///
/// Idempotent: running it twice leaves the same register image.
///
/// # Errors
///
/// Propagates the first failed register access.
pub fn resume_program<B>(variant: &VariantDescriptor, bus: &B) -> Result<(), BusError>
where
    B: RegisterBus + ?Sized,
{
    let reg = |offset| variant.ctrl_register(offset);
    match variant.power_program {
        PowerProgram::TouchscreenAdc => {
            // clkin = 6 MHz
            bus.write(
                reg(GPADC_CTRL0),
                ctrl0_adc_clk_divider(2) | ctrl0_fs_div(7) | ctrl0_t_acq(63),
            )?;
            bus.write(reg(GPADC_CTRL1), variant.tp_mode_en)?;
            bus.write(reg(GPADC_CTRL3), CTRL3_FILTER_EN | ctrl3_filter_type(1))?;
            // period = 800 * 256 * 16 / clkin, about 0.6 s
            bus.write(reg(GPADC_TPR), TPR_TEMP_ENABLE | tpr_temp_period(800))?;
        }
        PowerProgram::ThermalSensor => {
            let sensors = 0..variant.sensor_count;
            let irq_en = sensors.clone().fold(0, |acc, s| acc | ths_intc_tdata_irq_en(s));
            let sense_en = sensors.fold(0, |acc, s| acc | ths_temp_sense_en(s));

            bus.write(reg(THS_CTRL0), ctrl0_t_acq(0xff))?;
            bus.write(reg(THS_CTRL2), ths_acq1(0x3f))?;
            bus.write(reg(THS_STAT), variant.irq_clear)?;
            bus.write(reg(THS_FILTER), CTRL3_FILTER_EN | ctrl3_filter_type(2))?;
            bus.write(reg(THS_INTC), irq_en | ths_temp_period(0x55))?;
            bus.update_bits(reg(THS_CTRL2), sense_en, sense_en)?;
        }
    }
    Ok(())
}

/// Programs applied on runtime suspend.
///
/// # Errors
///
/// Propagates the first failed register access.
pub fn suspend_program<B>(variant: &VariantDescriptor, bus: &B) -> Result<(), BusError>
where
    B: RegisterBus + ?Sized,
{
    let reg = |offset| variant.ctrl_register(offset);
    match variant.power_program {
        PowerProgram::TouchscreenAdc => {
            bus.write(reg(GPADC_CTRL1), 0)?;
            bus.write(reg(GPADC_TPR), 0)?;
            bus.write(reg(GPADC_INT_FIFOC), 0)?;
        }
        PowerProgram::ThermalSensor => {
            bus.write(reg(THS_INTC), 0)?;
            bus.write(reg(THS_CTRL2), 0)?;
        }
    }
    Ok(())
}

/// Counters exposed for diagnostics and tests.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PowerCounters {
    pub resumes: u32,
    pub suspends: u32,
}

/// Owns the clock/reset handles and the Suspended/Resumed state.
///
/// Transitions are serialized by the caller (see [`crate::pm::RuntimePm`]).
pub struct PowerController<C, R> {
    variant: &'static VariantDescriptor,
    bus_clock: Option<C>,
    module_clock: Option<C>,
    reset: Option<R>,
    state: PowerState,
    clocks_gated: bool,
    counters: PowerCounters,
}

impl<C, R> PowerController<C, R>
where
    C: ClockControl,
    R: ResetControl,
{
    /// Validates `resources` against the variant and brings the block out of reset.
    ///
    /// Order: deassert reset, enable the bus clock, set the module clock rate
    /// and enable it. A failure unwinds what was already done in reverse.
    /// The block starts logically suspended with its clocks running.
    ///
    /// # Errors
    ///
    /// [`GpadcError::Configuration`] for a missing declared capability, or the
    /// clock/reset failure that aborted bring-up.
    pub fn power_on(
        variant: &'static VariantDescriptor,
        resources: PowerResources<C, R>,
        module_clock_hz: u32,
    ) -> Result<Self, GpadcError> {
        let PowerResources {
            bus_clock,
            module_clock,
            reset,
        } = resources;

        let mut reset = require(variant.has_bus_reset, reset, ConfigurationError::MissingReset)?;
        let mut bus_clock = require(
            variant.has_bus_clock,
            bus_clock,
            ConfigurationError::MissingBusClock,
        )?;
        let mut module_clock = require(
            variant.has_module_clock,
            module_clock,
            ConfigurationError::MissingModuleClock,
        )?;

        if let Some(reset) = reset.as_mut() {
            reset.deassert()?;
        }

        if let Err(err) = bus_clock.as_mut().map_or(Ok(()), ClockControl::enable) {
            error!("bus clock enable failed");
            assert_reset(reset.as_mut());
            return Err(err.into());
        }

        if let Some(clock) = module_clock.as_mut() {
            let enabled = clock
                .set_rate(module_clock_hz)
                .and_then(|()| clock.enable());
            if let Err(err) = enabled {
                error!("module clock bring-up failed");
                if let Some(bus) = bus_clock.as_mut() {
                    bus.disable();
                }
                assert_reset(reset.as_mut());
                return Err(err.into());
            }
        }

        Ok(Self {
            variant,
            bus_clock,
            module_clock,
            reset,
            state: PowerState::Suspended,
            clocks_gated: false,
            counters: PowerCounters::default(),
        })
    }

    /// Gates the clocks and puts the block back into reset.
    pub fn power_off(&mut self) {
        if !self.clocks_gated {
            self.gate_clocks();
        }
        assert_reset(self.reset.as_mut());
    }

    /// Suspended → Resumed. Returns `false` when already resumed.
    ///
    /// # Errors
    ///
    /// Clock, reset, or register failures; the state stays `Suspended`.
    pub fn resume<B>(&mut self, bus: &B) -> Result<bool, GpadcError>
    where
        B: RegisterBus + ?Sized,
    {
        if self.state == PowerState::Resumed {
            return Ok(false);
        }

        if self.clocks_gated {
            self.ungate_clocks()?;
        }
        if let Some(reset) = self.reset.as_mut() {
            reset.deassert()?;
        }
        resume_program(self.variant, bus)?;

        self.state = PowerState::Resumed;
        self.counters.resumes = self.counters.resumes.wrapping_add(1);
        debug!("gpadc resumed");
        Ok(true)
    }

    /// Resumed → Suspended. Returns `false` when already suspended.
    ///
    /// # Errors
    ///
    /// Register failures; the state stays `Resumed`.
    pub fn suspend<B>(&mut self, bus: &B) -> Result<bool, GpadcError>
    where
        B: RegisterBus + ?Sized,
    {
        if self.state == PowerState::Suspended {
            return Ok(false);
        }

        suspend_program(self.variant, bus)?;
        self.gate_clocks();

        self.state = PowerState::Suspended;
        self.counters.suspends = self.counters.suspends.wrapping_add(1);
        debug!("gpadc suspended");
        Ok(true)
    }

    #[must_use]
    pub fn state(&self) -> PowerState {
        self.state
    }

    #[must_use]
    pub fn counters(&self) -> PowerCounters {
        self.counters
    }

    #[must_use]
    pub fn clocks_gated(&self) -> bool {
        self.clocks_gated
    }

    fn gate_clocks(&mut self) {
        if let Some(clock) = self.module_clock.as_mut() {
            clock.disable();
        }
        if let Some(clock) = self.bus_clock.as_mut() {
            clock.disable();
        }
        self.clocks_gated = true;
    }

    fn ungate_clocks(&mut self) -> Result<(), GpadcError> {
        if let Some(clock) = self.bus_clock.as_mut() {
            clock.enable()?;
        }
        if let Err(err) = self.module_clock.as_mut().map_or(Ok(()), ClockControl::enable) {
            if let Some(bus) = self.bus_clock.as_mut() {
                bus.disable();
            }
            return Err(err.into());
        }
        self.clocks_gated = false;
        Ok(())
    }
}

fn require<T>(
    declared: bool,
    resource: Option<T>,
    missing: ConfigurationError,
) -> Result<Option<T>, GpadcError> {
    match (declared, resource) {
        (false, _) => Ok(None),
        (true, Some(resource)) => Ok(Some(resource)),
        (true, None) => Err(missing.into()),
    }
}

fn assert_reset<R: ResetControl>(reset: Option<&mut R>) {
    if reset.is_some_and(|reset| reset.assert().is_err()) {
        warn!("reset assert failed");
    }
}
