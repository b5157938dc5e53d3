//! Error taxonomy surfaced by the device.

use core::fmt;

use crate::bus::BusError;
use crate::platform::ResourceError;

/// A required capability the variant declares but the platform did not supply.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigurationError {
    MissingBusClock,
    MissingModuleClock,
    MissingReset,
    MissingInterrupt,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::MissingBusClock => f.write_str("bus clock not provided"),
            ConfigurationError::MissingModuleClock => f.write_str("module clock not provided"),
            ConfigurationError::MissingReset => f.write_str("reset line not provided"),
            ConfigurationError::MissingInterrupt => f.write_str("interrupt line not provided"),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpadcError {
    /// A register access failed; the read was aborted.
    Io(BusError),
    /// No completion arrived within the configured bound.
    Timeout,
    /// The voltage channel index is outside the multiplexer range.
    InvalidChannel(u8),
    /// The logical sensor index is outside the variant's sensor count.
    InvalidSensor(u8),
    /// The operation is not available on this revision.
    Unsupported,
    /// A runtime suspend was requested while resume holds are outstanding.
    Busy,
    Configuration(ConfigurationError),
    Resource(ResourceError),
    /// A dependency (calibration storage, clock provider) is not ready yet.
    Deferred,
}

impl fmt::Display for GpadcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpadcError::Io(err) => write!(f, "i/o error: {err}"),
            GpadcError::Timeout => f.write_str("timed out waiting for sample"),
            GpadcError::InvalidChannel(channel) => write!(f, "invalid channel {channel}"),
            GpadcError::InvalidSensor(sensor) => write!(f, "invalid sensor {sensor}"),
            GpadcError::Unsupported => f.write_str("not supported by this variant"),
            GpadcError::Busy => f.write_str("device busy"),
            GpadcError::Configuration(err) => write!(f, "configuration error: {err}"),
            GpadcError::Resource(err) => write!(f, "{err}"),
            GpadcError::Deferred => f.write_str("probe deferred"),
        }
    }
}

impl From<BusError> for GpadcError {
    fn from(err: BusError) -> Self {
        GpadcError::Io(err)
    }
}

impl From<ResourceError> for GpadcError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::Deferred => GpadcError::Deferred,
            other => GpadcError::Resource(other),
        }
    }
}

impl From<ConfigurationError> for GpadcError {
    fn from(err: ConfigurationError) -> Self {
        GpadcError::Configuration(err)
    }
}
