//! Interrupt, clock, and reset capabilities injected by the platform.

use core::fmt;

/// Failure reported by a platform resource.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResourceError {
    /// The resource does not exist on this board.
    Unavailable,
    /// The provider is not ready yet; attach should be retried later.
    Deferred,
    /// The provider refused the request.
    Rejected,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Unavailable => f.write_str("resource unavailable"),
            ResourceError::Deferred => f.write_str("resource deferred"),
            ResourceError::Rejected => f.write_str("resource rejected request"),
        }
    }
}

/// Top-level interrupt line feeding [`crate::GpadcDevice::handle_irq`].
///
/// `enable`/`disable` nest the way a kernel `enable_irq`/`disable_irq` pair
/// does; the device keeps them balanced.
pub trait InterruptLine {
    /// Routes the line to the device handler.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError`] when the line cannot be claimed.
    fn request(&mut self) -> Result<(), ResourceError>;

    /// Releases the line claimed by [`InterruptLine::request`].
    fn free(&mut self);

    fn enable(&self);

    fn disable(&self);
}

/// Gateable clock with an adjustable rate.
pub trait ClockControl {
    /// # Errors
    ///
    /// Returns [`ResourceError`] when the clock cannot be ungated.
    fn enable(&mut self) -> Result<(), ResourceError>;

    fn disable(&mut self);

    /// # Errors
    ///
    /// Returns [`ResourceError`] when the rate is not achievable.
    fn set_rate(&mut self, hz: u32) -> Result<(), ResourceError>;
}

/// Block reset line.
pub trait ResetControl {
    /// # Errors
    ///
    /// Returns [`ResourceError`] when the reset controller rejects the request.
    fn assert(&mut self) -> Result<(), ResourceError>;

    /// # Errors
    ///
    /// Returns [`ResourceError`] when the reset controller rejects the request.
    fn deassert(&mut self) -> Result<(), ResourceError>;
}

/// Placeholder clock for revisions clocked by the parent bus.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct NoClock;

impl ClockControl for NoClock {
    fn enable(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }

    fn disable(&mut self) {}

    fn set_rate(&mut self, _hz: u32) -> Result<(), ResourceError> {
        Ok(())
    }
}

/// Placeholder reset for revisions without a dedicated reset line.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct NoReset;

impl ResetControl for NoReset {
    fn assert(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }

    fn deassert(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }
}

/// Placeholder line for revisions without an interrupt.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct NoInterrupt;

impl InterruptLine for NoInterrupt {
    fn request(&mut self) -> Result<(), ResourceError> {
        Err(ResourceError::Unavailable)
    }

    fn free(&mut self) {}

    fn enable(&self) {}

    fn disable(&self) {}
}
