//! Interrupt completion bridge.
//!
//! The platform calls [`GpadcDevice::handle_irq`] from its interrupt handler
//! (or threaded handler). On-demand revisions complete the armed session;
//! free-running thermal revisions acknowledge the sample and fan out to every
//! logical sensor without touching the session lock.

use core::fmt;

use portable_atomic::Ordering;

use crate::bus::RegisterBus;
use crate::device::GpadcDevice;
use crate::platform::{ClockControl, ResetControl};
use crate::regs::THS_STAT;
use crate::sampling::Completion;
use crate::sensor::ThermalZones;
use crate::telemetry::GpadcEvent;
use crate::variant::IrqMode;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqReturn {
    /// Not ours, or nothing was waiting.
    None,
    Handled,
}

impl fmt::Display for IrqReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrqReturn::None => f.write_str("none"),
            IrqReturn::Handled => f.write_str("handled"),
        }
    }
}

impl<B, L, C, R, Z> GpadcDevice<B, L, C, R, Z>
where
    B: RegisterBus,
    C: ClockControl,
    R: ResetControl,
    Z: ThermalZones,
{
    pub fn handle_irq(&self) -> IrqReturn {
        match self.variant.irq_mode {
            IrqMode::OnDemand => match self.sampler.complete(self.variant, &self.bus) {
                Completion::Idle => IrqReturn::None,
                Completion::Completed(_) | Completion::ReadFailed(_) => IrqReturn::Handled,
            },
            IrqMode::FreeRunning => {
                self.fresh_sample();
                IrqReturn::Handled
            }
            IrqMode::Polled => IrqReturn::None,
        }
    }

    fn fresh_sample(&self) {
        let stat = self.variant.ctrl_register(THS_STAT);
        if self.bus.write(stat, self.variant.irq_clear).is_err() {
            warn!("failed to acknowledge sample interrupt");
        }
        for sensor in &self.sensors {
            if let Some(zone) = sensor.zone() {
                self.zones.notify_sample(zone);
            }
        }
        self.fresh_samples.fetch_add(1, Ordering::Relaxed);
        self.telemetry.record(GpadcEvent::SampleFresh);
    }
}
