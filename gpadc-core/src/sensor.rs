//! Logical thermal sensors and their thermal-zone registrations.

use core::fmt;

use heapless::Vec;

use crate::bus::RegisterBus;
use crate::device::GpadcDevice;
use crate::error::GpadcError;
use crate::platform::{ClockControl, InterruptLine, ResetControl, ResourceError};
use crate::variant::MAX_SENSOR_COUNT;

/// Why a thermal zone could not be registered.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ZoneError {
    /// No zone is described for this sensor; the sensor stays readable.
    NotConfigured,
    /// The thermal framework failed; attach is aborted.
    Resource(ResourceError),
}

impl fmt::Display for ZoneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneError::NotConfigured => f.write_str("no thermal zone configured"),
            ZoneError::Resource(err) => write!(f, "thermal zone registration failed: {err}"),
        }
    }
}

/// External thermal-management collaborator.
///
/// Registration happens once per logical sensor at attach; the framework then
/// pulls temperatures through [`crate::GpadcDevice::temperature`] and is
/// nudged with [`ThermalZones::notify_sample`] when free-running hardware
/// publishes a fresh sample.
pub trait ThermalZones {
    type Handle;

    /// # Errors
    ///
    /// [`ZoneError::NotConfigured`] when the sensor has no zone, or
    /// [`ZoneError::Resource`] when registration itself failed.
    fn register(&mut self, sensor: u8) -> Result<Self::Handle, ZoneError>;

    fn unregister(&mut self, handle: Self::Handle);

    /// Called from interrupt context; must not block.
    fn notify_sample(&self, handle: &Self::Handle);
}

/// Thermal framework stand-in for boards without thermal zones.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoThermalZones;

impl ThermalZones for NoThermalZones {
    type Handle = ();

    fn register(&mut self, _sensor: u8) -> Result<(), ZoneError> {
        Err(ZoneError::NotConfigured)
    }

    fn unregister(&mut self, _handle: ()) {}

    fn notify_sample(&self, _handle: &()) {}
}

/// One externally addressable temperature endpoint.
#[derive(Debug)]
pub struct LogicalSensor<H> {
    index: u8,
    zone: Option<H>,
}

impl<H> LogicalSensor<H> {
    #[must_use]
    pub const fn index(&self) -> u8 {
        self.index
    }

    /// Zone handle, when the thermal framework accepted this sensor.
    #[must_use]
    pub const fn zone(&self) -> Option<&H> {
        self.zone.as_ref()
    }

    /// Temperature of this sensor in milli-degrees Celsius.
    ///
    /// # Errors
    ///
    /// See [`GpadcDevice::temperature`].
    pub async fn read<B, L, C, R, Z>(
        &self,
        device: &GpadcDevice<B, L, C, R, Z>,
    ) -> Result<i32, GpadcError>
    where
        B: RegisterBus,
        L: InterruptLine,
        C: ClockControl,
        R: ResetControl,
        Z: ThermalZones<Handle = H>,
    {
        device.temperature(self.index).await
    }
}

pub(crate) type SensorSet<H> = Vec<LogicalSensor<H>, MAX_SENSOR_COUNT>;

/// Registers `count` sensors. Unconfigured zones are skipped; a resource
/// failure unregisters everything registered so far.
pub(crate) fn register_all<Z>(zones: &mut Z, count: u8) -> Result<SensorSet<Z::Handle>, GpadcError>
where
    Z: ThermalZones,
{
    let mut sensors = SensorSet::new();
    for index in 0..count {
        let zone = match zones.register(index) {
            Ok(handle) => Some(handle),
            Err(ZoneError::NotConfigured) => {
                debug!("no thermal zone for sensor {}", index);
                None
            }
            Err(ZoneError::Resource(err)) => {
                error!("could not register thermal sensor {}", index);
                unregister_all(zones, &mut sensors);
                return Err(err.into());
            }
        };
        if sensors.push(LogicalSensor { index, zone }).is_err() {
            unregister_all(zones, &mut sensors);
            return Err(GpadcError::InvalidSensor(index));
        }
    }
    Ok(sensors)
}

pub(crate) fn unregister_all<Z>(zones: &mut Z, sensors: &mut SensorSet<Z::Handle>)
where
    Z: ThermalZones,
{
    while let Some(sensor) = sensors.pop() {
        if let Some(handle) = sensor.zone {
            zones.unregister(handle);
        }
    }
}
