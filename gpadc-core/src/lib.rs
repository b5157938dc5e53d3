#![cfg_attr(not(test), no_std)]

// Sampling core for the sunxi general purpose ADC and its thermal sensor.
//
// The crate owns the sampling protocol, the per-revision constants, and the
// runtime power sequencing. Register access, interrupt delivery, clocks, and
// thermal-zone plumbing are injected by the platform so the same logic runs on
// the SoC and inside the host emulator.

#[macro_use]
mod fmt;

pub mod bus;
pub mod calibration;
pub mod channels;
pub mod config;
pub mod device;
pub mod error;
pub mod irq;
pub mod platform;
pub mod pm;
pub mod power;
pub mod regs;
pub mod sampling;
pub mod sensor;
pub mod telemetry;
pub mod variant;

pub use bus::{BusError, MmioBus, RegisterBus};
pub use calibration::{
    Calibration, CalibrationError, CalibrationStore, CellError, NoCalibrationStore,
};
pub use channels::{ChannelInfo, ChannelSpec, ChannelType, IioValue};
pub use config::GpadcConfig;
pub use device::{AttachResources, GpadcDevice};
pub use error::{ConfigurationError, GpadcError};
pub use irq::IrqReturn;
pub use platform::{
    ClockControl, InterruptLine, NoClock, NoInterrupt, NoReset, ResetControl, ResourceError,
};
pub use pm::AutosuspendPoll;
pub use power::{PowerCounters, PowerResources, PowerState};
pub use sampling::{Completion, ReadKind, SessionStats};
pub use sensor::{LogicalSensor, NoThermalZones, ThermalZones, ZoneError};
pub use telemetry::{GpadcEvent, TelemetryRecord};
pub use variant::{IrqMode, VariantDescriptor};
