//! Runtime power management with autosuspend.
//!
//! Readers take a [`ResumeHold`] before touching registers. The first hold
//! resumes the block; dropping the last one starts the idle countdown, and the
//! block is only suspended once it has stayed idle for the autosuspend delay.
//! Suspending between every read would restart the periodic temperature timer
//! and cost most of a second per sample.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};

use crate::bus::RegisterBus;
use crate::error::GpadcError;
use crate::platform::{ClockControl, ResetControl};
use crate::power::{PowerController, PowerCounters, PowerState};
use crate::telemetry::{GpadcEvent, SharedTelemetry};

/// Result of one autosuspend check.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AutosuspendPoll {
    /// The block was suspended by this call.
    Suspended,
    /// Idle, but the delay has not elapsed yet.
    Pending(Instant),
    /// Holds are outstanding or the block is already suspended.
    NotIdle,
}

/// Reference count plus the last published power snapshot.
#[derive(Copy, Clone)]
struct Usage {
    holds: u32,
    last_busy: Instant,
    state: PowerState,
    counters: PowerCounters,
}

/// Runtime PM for one block.
///
/// Transitions run under an async lock; the critical section only guards
/// the hold count and state snapshot. Holds are only taken under the
/// transition lock, so a transition that sees zero holds cannot race a new
/// reader.
pub struct RuntimePm<C, R> {
    power: Mutex<CriticalSectionRawMutex, PowerController<C, R>>,
    usage: BlockingMutex<CriticalSectionRawMutex, Cell<Usage>>,
    idle: Signal<CriticalSectionRawMutex, ()>,
    autosuspend_delay: Duration,
}

impl<C, R> RuntimePm<C, R>
where
    C: ClockControl,
    R: ResetControl,
{
    #[must_use]
    pub fn new(power: PowerController<C, R>, autosuspend_delay: Duration) -> Self {
        let usage = Usage {
            holds: 0,
            last_busy: Instant::now(),
            state: power.state(),
            counters: power.counters(),
        };
        Self {
            power: Mutex::new(power),
            usage: BlockingMutex::new(Cell::new(usage)),
            idle: Signal::new(),
            autosuspend_delay,
        }
    }

    /// Takes a resume reference, resuming the block if it is suspended.
    ///
    /// # Errors
    ///
    /// The resume failure; no reference is held in that case.
    pub async fn get_sync<B>(
        &self,
        bus: &B,
        telemetry: &SharedTelemetry,
    ) -> Result<ResumeHold<'_, C, R>, GpadcError>
    where
        B: RegisterBus + ?Sized,
    {
        let mut power = self.power.lock().await;
        self.update(|usage| usage.holds = usage.holds.saturating_add(1));
        let resumed = power.resume(bus);
        self.publish(&power);
        match resumed {
            Ok(resumed) => {
                if resumed {
                    telemetry.record(GpadcEvent::Resumed);
                }
                Ok(ResumeHold {
                    pm: self,
                    busy: false,
                })
            }
            Err(err) => {
                self.update(|usage| usage.holds = usage.holds.saturating_sub(1));
                Err(err)
            }
        }
    }

    fn put(&self, mark_busy: bool) {
        let now = Instant::now();
        let idle = self.update(|usage| {
            if mark_busy {
                usage.last_busy = now;
            }
            usage.holds = usage.holds.saturating_sub(1);
            usage.holds == 0
        });
        if idle {
            self.idle.signal(());
        }
    }

    /// Suspends the block when it has been idle for the autosuspend delay.
    ///
    /// # Errors
    ///
    /// The suspend program failure; the block stays resumed.
    pub async fn poll_autosuspend<B>(
        &self,
        bus: &B,
        now: Instant,
        telemetry: &SharedTelemetry,
    ) -> Result<AutosuspendPoll, GpadcError>
    where
        B: RegisterBus + ?Sized,
    {
        let mut power = self.power.lock().await;
        let usage = self.snapshot();
        if usage.holds > 0 || power.state() == PowerState::Suspended {
            return Ok(AutosuspendPoll::NotIdle);
        }
        let deadline = usage.last_busy + self.autosuspend_delay;
        if now < deadline {
            return Ok(AutosuspendPoll::Pending(deadline));
        }
        self.suspend_locked(&mut power, bus, telemetry)?;
        Ok(AutosuspendPoll::Suspended)
    }

    /// Autosuspend worker; never returns.
    ///
    /// Sleeps until the last hold is dropped, then until the idle deadline,
    /// re-checking in case a reader came and went in between.
    pub async fn run_autosuspend<B>(&self, bus: &B, telemetry: &SharedTelemetry) -> !
    where
        B: RegisterBus + ?Sized,
    {
        loop {
            self.idle.wait().await;
            loop {
                match self.poll_autosuspend(bus, Instant::now(), telemetry).await {
                    Ok(AutosuspendPoll::Pending(deadline)) => Timer::at(deadline).await,
                    Ok(AutosuspendPoll::Suspended | AutosuspendPoll::NotIdle) => break,
                    Err(_) => {
                        warn!("autosuspend failed, staying resumed");
                        break;
                    }
                }
            }
        }
    }

    /// Forced suspend from the platform power manager.
    ///
    /// # Errors
    ///
    /// [`GpadcError::Busy`] while holds are outstanding, or the suspend
    /// program failure.
    pub async fn runtime_suspend<B>(
        &self,
        bus: &B,
        telemetry: &SharedTelemetry,
    ) -> Result<(), GpadcError>
    where
        B: RegisterBus + ?Sized,
    {
        let mut power = self.power.lock().await;
        if self.snapshot().holds > 0 {
            return Err(GpadcError::Busy);
        }
        self.suspend_locked(&mut power, bus, telemetry)
    }

    /// Forced resume from the platform power manager. The block then idles
    /// into autosuspend like after any read.
    ///
    /// # Errors
    ///
    /// The resume failure.
    pub async fn runtime_resume<B>(
        &self,
        bus: &B,
        telemetry: &SharedTelemetry,
    ) -> Result<(), GpadcError>
    where
        B: RegisterBus + ?Sized,
    {
        let hold = self.get_sync(bus, telemetry).await?;
        hold.mark_busy();
        Ok(())
    }

    /// Suspends if needed, then gates clocks and asserts reset.
    ///
    /// # Errors
    ///
    /// The suspend program failure; clocks are released regardless.
    pub fn shutdown<B>(self, bus: &B) -> Result<(), GpadcError>
    where
        B: RegisterBus + ?Sized,
    {
        let mut power = self.power.into_inner();
        let suspended = power.suspend(bus);
        power.power_off();
        suspended.map(|_| ())
    }

    #[must_use]
    pub fn state(&self) -> PowerState {
        self.snapshot().state
    }

    #[must_use]
    pub fn usage(&self) -> u32 {
        self.snapshot().holds
    }

    #[must_use]
    pub fn counters(&self) -> PowerCounters {
        self.snapshot().counters
    }

    #[must_use]
    pub fn autosuspend_delay(&self) -> Duration {
        self.autosuspend_delay
    }

    fn suspend_locked<B>(
        &self,
        power: &mut PowerController<C, R>,
        bus: &B,
        telemetry: &SharedTelemetry,
    ) -> Result<(), GpadcError>
    where
        B: RegisterBus + ?Sized,
    {
        let suspended = power.suspend(bus);
        self.publish(power);
        if suspended? {
            telemetry.record(GpadcEvent::Suspended);
        }
        Ok(())
    }

    fn publish(&self, power: &PowerController<C, R>) {
        let (state, counters) = (power.state(), power.counters());
        self.update(|usage| {
            usage.state = state;
            usage.counters = counters;
        });
    }

    fn snapshot(&self) -> Usage {
        self.usage.lock(Cell::get)
    }

    fn update<T>(&self, f: impl FnOnce(&mut Usage) -> T) -> T {
        self.usage.lock(|cell| {
            let mut usage = cell.get();
            let out = f(&mut usage);
            cell.set(usage);
            out
        })
    }
}

/// Resume reference; released with autosuspend when dropped.
#[must_use = "dropping the hold releases the resume reference immediately"]
pub struct ResumeHold<'a, C, R>
where
    C: ClockControl,
    R: ResetControl,
{
    pm: &'a RuntimePm<C, R>,
    busy: bool,
}

impl<C, R> ResumeHold<'_, C, R>
where
    C: ClockControl,
    R: ResetControl,
{
    /// Restarts the idle countdown from now when the hold is released.
    pub fn mark_busy(mut self) {
        self.busy = true;
    }

    pub fn set_busy(&mut self) {
        self.busy = true;
    }
}

impl<C, R> Drop for ResumeHold<'_, C, R>
where
    C: ClockControl,
    R: ResetControl,
{
    fn drop(&mut self) {
        self.pm.put(self.busy);
    }
}
