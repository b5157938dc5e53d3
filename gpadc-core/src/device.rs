//! Device instance: attach/detach plus the voltage and thermal consumer API.

use embassy_time::Instant;
use portable_atomic::{AtomicU32, Ordering};

use crate::bus::RegisterBus;
use crate::calibration::{self, Calibration, CalibrationStore};
use crate::channels::{self, ChannelInfo, ChannelSpec, ChannelType, IioValue, VOLTAGE_SCALE_NANO};
use crate::config::GpadcConfig;
use crate::error::{ConfigurationError, GpadcError};
use crate::platform::{ClockControl, InterruptLine, ResetControl};
use crate::pm::{AutosuspendPoll, RuntimePm};
use crate::power::{PowerController, PowerCounters, PowerResources, PowerState};
use crate::sampling::{ReadKind, Sampler, SessionContext, SessionStats};
use crate::sensor::{self, LogicalSensor, SensorSet, ThermalZones};
use crate::telemetry::{GpadcEvent, SharedTelemetry};
use crate::variant::{ADC_CHANNEL_COUNT, IrqMode, VariantDescriptor};

/// Platform capabilities handed over at attach.
pub struct AttachResources<B, L, C, R, Z> {
    pub bus: B,
    /// Required when the variant reports completions by interrupt.
    pub irq: Option<L>,
    pub power: PowerResources<C, R>,
    pub zones: Z,
}

/// One attached GPADC/THS block.
///
/// Shared by reference between reader tasks, the autosuspend worker, and the
/// interrupt handler.
pub struct GpadcDevice<B, L, C, R, Z>
where
    Z: ThermalZones,
{
    pub(crate) variant: &'static VariantDescriptor,
    config: GpadcConfig,
    pub(crate) bus: B,
    irq: Option<L>,
    pm: RuntimePm<C, R>,
    pub(crate) sampler: Sampler,
    calibration: Calibration,
    pub(crate) zones: Z,
    pub(crate) sensors: SensorSet<Z::Handle>,
    pub(crate) telemetry: SharedTelemetry,
    pub(crate) fresh_samples: AtomicU32,
}

impl<B, L, C, R, Z> GpadcDevice<B, L, C, R, Z>
where
    B: RegisterBus,
    L: InterruptLine,
    C: ClockControl,
    R: ResetControl,
    Z: ThermalZones,
{
    /// Brings up one block.
    ///
    /// Sequence: load calibration, claim the interrupt line (left disabled
    /// for on-demand variants until a session arms it), deassert reset and
    /// start the clocks, then register one logical sensor per hardware
    /// sensor. The block starts runtime-suspended.
    ///
    /// # Errors
    ///
    /// [`GpadcError::Deferred`] when calibration storage is not ready,
    /// [`GpadcError::Configuration`] for a missing declared capability, and
    /// resource failures from the interrupt, clocks, reset, or thermal
    /// framework. Everything acquired before the failure is released.
    pub fn attach<S>(
        variant: &'static VariantDescriptor,
        config: GpadcConfig,
        resources: AttachResources<B, L, C, R, Z>,
        store: &mut S,
    ) -> Result<Self, GpadcError>
    where
        S: CalibrationStore + ?Sized,
    {
        let AttachResources {
            bus,
            mut irq,
            power,
            mut zones,
        } = resources;

        let telemetry = SharedTelemetry::new();
        let loaded = calibration::load(variant, store)?;
        if loaded.warning.is_some() {
            telemetry.record(GpadcEvent::CalibrationDefaulted);
        }

        if variant.supports_interrupt {
            let line = irq.as_mut().ok_or(ConfigurationError::MissingInterrupt)?;
            line.request()?;
            if variant.has_dedicated_voltage_channel {
                line.disable();
            }
        } else {
            irq = None;
        }

        let power = match PowerController::power_on(variant, power, config.module_clock_hz()) {
            Ok(power) => power,
            Err(err) => {
                release_line(irq.as_mut());
                return Err(err);
            }
        };
        let pm = RuntimePm::new(power, config.autosuspend_delay());

        let sensors = match sensor::register_all(&mut zones, variant.sensor_count) {
            Ok(sensors) => sensors,
            Err(err) => {
                if pm.shutdown(&bus).is_err() {
                    warn!("shutdown after failed attach reported an error");
                }
                release_line(irq.as_mut());
                return Err(err);
            }
        };

        info!("gpadc attached");
        Ok(Self {
            variant,
            config,
            bus,
            irq,
            pm,
            sampler: Sampler::new(),
            calibration: loaded.calibration,
            zones,
            sensors,
            telemetry,
            fresh_samples: AtomicU32::new(0),
        })
    }

    /// Tears the device down: thermal zones first, then clocks and reset,
    /// then the interrupt line. Returns the bus and thermal framework.
    ///
    /// # Errors
    ///
    /// The suspend program failure; every resource is still released.
    pub fn detach(self) -> Result<(B, Z), GpadcError> {
        let Self {
            bus,
            mut irq,
            pm,
            mut zones,
            mut sensors,
            ..
        } = self;

        sensor::unregister_all(&mut zones, &mut sensors);
        let shutdown = pm.shutdown(&bus);
        release_line(irq.as_mut());
        info!("gpadc detached");
        shutdown.map(|()| (bus, zones))
    }

    /// Raw 12-bit code of voltage input `channel`.
    ///
    /// # Errors
    ///
    /// [`GpadcError::Unsupported`] on thermal-only revisions,
    /// [`GpadcError::InvalidChannel`], or the session failure.
    pub async fn read_raw_voltage(&self, channel: u8) -> Result<u32, GpadcError> {
        if !self.variant.has_dedicated_voltage_channel {
            return Err(GpadcError::Unsupported);
        }
        if channel >= ADC_CHANNEL_COUNT {
            return Err(GpadcError::InvalidChannel(channel));
        }
        self.sample(ReadKind::Voltage(channel)).await
    }

    /// Voltage input `channel` in millivolts.
    ///
    /// # Errors
    ///
    /// See [`GpadcDevice::read_raw_voltage`].
    pub async fn read_millivolts(&self, channel: u8) -> Result<u32, GpadcError> {
        self.read_raw_voltage(channel).await.map(channels::millivolts)
    }

    /// Millivolts per code as `0 + 732421875e-9`.
    #[must_use]
    pub const fn voltage_scale(&self) -> IioValue {
        IioValue::IntPlusNano(0, VOLTAGE_SCALE_NANO)
    }

    /// Raw temperature sample for logical sensor `sensor`.
    ///
    /// Touchscreen-block revisions run a full sampling session; thermal-only
    /// revisions read the continuously refreshed data register directly.
    ///
    /// # Errors
    ///
    /// [`GpadcError::InvalidSensor`], resume failures, register failures, or
    /// [`GpadcError::Timeout`].
    pub async fn read_temperature_raw(&self, sensor: u8) -> Result<u32, GpadcError> {
        if sensor >= self.variant.sensor_count {
            return Err(GpadcError::InvalidSensor(sensor));
        }
        if self.variant.has_dedicated_voltage_channel {
            return self.sample(ReadKind::Temperature(sensor)).await;
        }

        let mut hold = self.pm.get_sync(&self.bus, &self.telemetry).await?;
        let raw = self.bus.read(self.variant.temp_data_register(sensor))?;
        hold.set_busy();
        self.sampler.note_temperature(raw);
        Ok(raw)
    }

    /// Temperature of logical sensor `sensor` in milli-degrees Celsius.
    ///
    /// # Errors
    ///
    /// See [`GpadcDevice::read_temperature_raw`].
    pub async fn temperature(&self, sensor: u8) -> Result<i32, GpadcError> {
        let raw = self.read_temperature_raw(sensor).await?;
        Ok(self.variant.temperature_millicelsius(raw))
    }

    /// Attribute read for a channel from [`GpadcDevice::channels`].
    ///
    /// # Errors
    ///
    /// [`GpadcError::Unsupported`] for attributes the channel does not carry,
    /// or the underlying read failure.
    pub async fn read_info(
        &self,
        spec: &ChannelSpec,
        info: ChannelInfo,
    ) -> Result<IioValue, GpadcError> {
        if !spec.supports(info) {
            return Err(GpadcError::Unsupported);
        }
        let value = match (spec.kind, info) {
            (ChannelType::Voltage, ChannelInfo::Raw) => {
                IioValue::Int(saturate(self.read_raw_voltage(spec.channel).await?))
            }
            (ChannelType::Voltage, ChannelInfo::Scale) => self.voltage_scale(),
            (ChannelType::Temperature, ChannelInfo::Raw) => {
                IioValue::Int(saturate(self.read_temperature_raw(spec.channel).await?))
            }
            (ChannelType::Temperature, ChannelInfo::Scale) => {
                IioValue::Int(self.variant.temp_scale)
            }
            (ChannelType::Temperature, ChannelInfo::Offset) => {
                IioValue::Int(self.variant.temp_offset)
            }
            (ChannelType::Voltage, ChannelInfo::Offset) => return Err(GpadcError::Unsupported),
        };
        Ok(value)
    }

    /// Platform-initiated runtime suspend.
    ///
    /// # Errors
    ///
    /// [`GpadcError::Busy`] while a reader holds the block resumed.
    pub async fn runtime_suspend(&self) -> Result<(), GpadcError> {
        self.pm.runtime_suspend(&self.bus, &self.telemetry).await
    }

    /// Platform-initiated runtime resume.
    ///
    /// # Errors
    ///
    /// Clock, reset, or register failures.
    pub async fn runtime_resume(&self) -> Result<(), GpadcError> {
        self.pm.runtime_resume(&self.bus, &self.telemetry).await
    }

    /// Suspends the block if it has been idle for the autosuspend delay.
    ///
    /// # Errors
    ///
    /// The suspend program failure.
    pub async fn poll_autosuspend(&self, now: Instant) -> Result<AutosuspendPoll, GpadcError> {
        self.pm.poll_autosuspend(&self.bus, now, &self.telemetry).await
    }

    /// Runs the autosuspend countdown forever; spawn it next to the readers.
    pub async fn autosuspend_worker(&self) -> ! {
        self.pm.run_autosuspend(&self.bus, &self.telemetry).await
    }

    async fn sample(&self, kind: ReadKind) -> Result<u32, GpadcError> {
        let line = self
            .irq
            .as_ref()
            .ok_or(GpadcError::Configuration(ConfigurationError::MissingInterrupt))?;
        let mut hold = self.pm.get_sync(&self.bus, &self.telemetry).await?;
        let ctx = SessionContext {
            variant: self.variant,
            config: &self.config,
            bus: &self.bus,
            line,
            telemetry: &self.telemetry,
        };
        let value = self.sampler.read(&ctx, kind).await?;
        hold.set_busy();
        Ok(value)
    }
}

impl<B, L, C, R, Z> GpadcDevice<B, L, C, R, Z>
where
    C: ClockControl,
    R: ResetControl,
    Z: ThermalZones,
{
    #[must_use]
    pub fn variant(&self) -> &'static VariantDescriptor {
        self.variant
    }

    #[must_use]
    pub fn config(&self) -> &GpadcConfig {
        &self.config
    }

    #[must_use]
    pub fn bus(&self) -> &B {
        &self.bus
    }

    #[must_use]
    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    #[must_use]
    pub fn channels(&self) -> &'static [ChannelSpec] {
        channels::channels_for(self.variant)
    }

    #[must_use]
    pub fn sensors(&self) -> &[LogicalSensor<Z::Handle>] {
        &self.sensors
    }

    #[must_use]
    pub fn power_state(&self) -> PowerState {
        self.pm.state()
    }

    #[must_use]
    pub fn power_counters(&self) -> PowerCounters {
        self.pm.counters()
    }

    /// Outstanding resume references.
    #[must_use]
    pub fn resume_holds(&self) -> u32 {
        self.pm.usage()
    }

    #[must_use]
    pub fn telemetry(&self) -> &SharedTelemetry {
        &self.telemetry
    }

    /// Session counters; waits for an in-flight session to finish.
    pub async fn session_stats(&self) -> SessionStats {
        self.sampler.stats().await
    }

    #[must_use]
    pub fn last_raw_voltage(&self) -> u32 {
        self.sampler.last_voltage()
    }

    #[must_use]
    pub fn last_raw_temperature(&self) -> u32 {
        self.sampler.last_temperature()
    }

    /// Free-running sample interrupts handled since attach.
    #[must_use]
    pub fn fresh_samples(&self) -> u32 {
        self.fresh_samples.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn irq_mode(&self) -> IrqMode {
        self.variant.irq_mode
    }
}

fn release_line<L: InterruptLine>(line: Option<&mut L>) {
    if let Some(line) = line {
        line.free();
    }
}

fn saturate(raw: u32) -> i32 {
    i32::try_from(raw).unwrap_or(i32::MAX)
}
